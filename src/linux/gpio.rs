use std::fs;
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{
	Path,
	PathBuf,
};

use crate::eeprom::Gpio;

const SYSFS_GPIO: &str = "/sys/class/gpio";

fn write_attribute(path: &Path, value: &str) -> std::io::Result<()> {
	// sysfs attributes need to be written in one syscall
	fs::OpenOptions::new().write(true).open(path)?.write_all(value.as_bytes())
}

#[derive(Debug)]
struct OutputLine {
	number: u32,
	value: fs::File,
	// unexport again on drop
	exported: bool,
}

impl Drop for OutputLine {
	fn drop(&mut self) {
		if self.exported {
			let unexport = Path::new(SYSFS_GPIO).join("unexport");
			if let Err(e) = write_attribute(&unexport, &self.number.to_string()) {
				warn!("GPIO {}: failed to unexport: {}", self.number, e);
			}
		}
	}
}

/// GPIO output lines through the (legacy) sysfs interface.
#[derive(Debug, Default)]
pub struct SysfsGpio {
	lines: Vec<OutputLine>,
}

impl SysfsGpio {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set up a single output line, driven to `initial_high` right away.
	pub fn open(line: u32, initial_high: bool) -> crate::AResult<Self> {
		let mut gpio = Self::new();
		gpio.add_output(line, initial_high)?;
		Ok(gpio)
	}

	pub fn add_output(&mut self, line: u32, initial_high: bool) -> crate::AResult<()> {
		ensure!(!self.lines.iter().any(|l| l.number == line), "GPIO {} already set up", line);

		let dir = PathBuf::from(format!("{}/gpio{}", SYSFS_GPIO, line));
		let lines = &mut self.lines;

		with_context!(("couldn't set up GPIO {} as output", line), {
			let exported = if !dir.exists() {
				write_attribute(&Path::new(SYSFS_GPIO).join("export"), &line.to_string())?;
				true
			} else {
				false
			};

			// "high"/"low" set direction and level without a glitch
			let direction = if initial_high { "high" } else { "low" };
			let value = match write_attribute(&dir.join("direction"), direction)
				.and_then(|()| fs::OpenOptions::new().write(true).open(dir.join("value")))
			{
				Ok(v) => v,
				Err(e) => {
					if exported {
						let _ = write_attribute(&Path::new(SYSFS_GPIO).join("unexport"), &line.to_string());
					}
					return Err(failure::Error::from(e));
				},
			};

			debug!("GPIO {}: output, initially {}", line, direction);
			lines.push(OutputLine {
				number: line,
				value,
				exported,
			});

			Ok(())
		})
	}
}

impl Gpio for SysfsGpio {
	fn set_line(&mut self, line: u32, high: bool) {
		let output = match self.lines.iter().find(|l| l.number == line) {
			Some(l) => l,
			None => panic!("GPIO {} was not set up as output", line),
		};
		let level: &[u8] = if high { b"1" } else { b"0" };
		if let Err(e) = output.value.write_at(level, 0) {
			panic!("GPIO {}: failed to set level: {}", line, e);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	#[should_panic(expected = "GPIO 7 was not set up as output")]
	fn unknown_line_panics() {
		SysfsGpio::new().set_line(7, true);
	}

	#[test]
	fn open_missing_line_fails() {
		// way above any real GPIO number; export is refused (or sysfs is missing)
		let err = SysfsGpio::open(999_999, true).unwrap_err();
		assert!(err.to_string().starts_with("couldn't set up GPIO 999999 as output"));
	}
}
