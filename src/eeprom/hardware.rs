use std::thread;
use std::time::{
	Duration,
	Instant,
};

/// Full-duplex byte exchange on an already started bus.
pub trait Bus {
	/// Clocks out `data` and returns the byte received at the same time.
	fn exchange(&mut self, data: u8) -> u8;
}

/// Discrete output lines; chip select is one of them.
pub trait Gpio {
	fn set_line(&mut self, line: u32, high: bool);
}

pub trait Delay {
	/// Wait for (at least) `us` microseconds.
	fn delay_us(&mut self, us: u32);
}

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Which GPIO line selects the device, and its active level.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ChipSelect {
	pub line: u32,
	pub active_high: bool,
}

impl ChipSelect {
	/// chip select lines are usually active low
	pub fn active_low(line: u32) -> Self {
		ChipSelect {
			line,
			active_high: false,
		}
	}

	pub fn level(&self, active: bool) -> bool {
		active == self.active_high
	}

	pub fn idle_level(&self) -> bool {
		self.level(false)
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Config {
	pub chip_select: ChipSelect,
	/// delay between two status polls while the device is busy
	pub poll_interval_us: u32,
}

impl Config {
	pub fn new(chip_select: ChipSelect) -> Self {
		Config {
			chip_select,
			poll_interval_us: 1,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chip_select_levels() {
		let low = ChipSelect::active_low(5);
		assert!(!low.level(true));
		assert!(low.idle_level());

		let high = ChipSelect { line: 5, active_high: true };
		assert!(high.level(true));
		assert!(!high.idle_level());
	}

	#[test]
	fn default_poll_interval() {
		let config = Config::new(ChipSelect::active_low(17));
		assert_eq!(config.poll_interval_us, 1);
		assert_eq!(config.chip_select.line, 17);
	}

	#[test]
	fn reliable_sleep_waits_full_duration() {
		let duration = Duration::from_millis(2);
		let now = Instant::now();
		reliable_sleep(duration);
		assert!(now.elapsed() >= duration);
	}
}
