#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate spi_eeprom;
use spi_eeprom::*;

use std::fs;
use std::io::{
	self,
	Write,
};
use std::process::exit;

use spi_eeprom::eeprom::{
	block_protection,
	program,
	set_block_protection,
	verify,
};
use spi_eeprom::linux::{
	SpiConfig,
	Spidev,
	StdDelay,
	SysfsGpio,
};

type LinuxEeprom = Eeprom<Spidev, SysfsGpio, StdDelay>;

struct Device {
	eeprom: LinuxEeprom,
	size: usize,
	page_size: usize,
}

fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<u64> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	parse_number(param).map_err(|e| {
		let msg = format!("invalid parameter {}", name);
		e.context(msg).into()
	})
}

/// Like `get_number`, but rejects values above `max` instead of truncating
/// them later.
fn get_bounded(matches: &clap::ArgMatches, name: &str, max: u64) -> AResult<u64> {
	let value = get_number(matches, name)?;
	ensure!(value <= max, "invalid parameter {}: {} exceeds maximum {}", name, value, max);
	Ok(value)
}

fn get_u32(matches: &clap::ArgMatches, name: &str) -> AResult<u32> {
	Ok(get_bounded(matches, name, u32::max_value() as u64)? as u32)
}

fn get_usize(matches: &clap::ArgMatches, name: &str) -> AResult<usize> {
	Ok(get_bounded(matches, name, usize::max_value() as u64)? as usize)
}

fn get_address(matches: &clap::ArgMatches, name: &str, size: usize) -> AResult<u16> {
	let address = get_number(matches, name)?;
	ensure!(address < size as u64, "{} 0x{:x} outside of EEPROM (size 0x{:x})", name, address, size);
	Ok(address as u16)
}

fn open_device(matches: &clap::ArgMatches) -> AResult<Device> {
	let size = get_usize(matches, "size")?;
	let page_size = get_usize(matches, "page_size")?;
	ensure!(size > 0 && size <= 0x1_0000, "EEPROM size must be within 1..=0x10000");
	ensure!(page_size > 0, "page size must not be zero");

	let mode = get_bounded(matches, "mode", 3)?;

	let mut spi_config = SpiConfig::new(matches.value_of("device").unwrap_or("/dev/spidev0.0"));
	spi_config.speed_hz = get_u32(matches, "speed")?;
	spi_config.mode = mode as u8;

	let chip_select = ChipSelect {
		line: get_u32(matches, "cs_gpio")?,
		active_high: matches.is_present("cs_active_high"),
	};

	let gpio = SysfsGpio::open(chip_select.line, chip_select.idle_level())?;
	let spi = Spidev::start(&spi_config)?;

	Ok(Device {
		eeprom: Eeprom::new(spi, gpio, StdDelay, Config::new(chip_select)),
		size,
		page_size,
	})
}

fn close_device(device: Device) {
	let (spi, _gpio, _delay) = device.eeprom.release();
	spi.stop();
}

fn print_hex_dump(base: usize, data: &[u8]) -> AResult<()> {
	let stdout = io::stdout();
	let mut out = stdout.lock();
	for (i, &b) in data.iter().enumerate() {
		if 0 == i % 16 {
			write!(out, "{:04x} ", base + i)?;
		} else if 0 == i % 8 {
			write!(out, " ")?;
		}
		write!(out, " {:02x}", b)?;
		if 15 == i % 16 {
			writeln!(out)?;
		}
	}
	if 0 != data.len() % 16 {
		writeln!(out)?;
	}
	Ok(())
}

fn show_status(device: &mut Device) -> AResult<()> {
	let status = device.eeprom.read_status();
	println!("Status: {:?}", status);
	match status.block_protection().protected_range(device.size) {
		None => println!("No block protection"),
		Some(range) => println!("Protected: {:04x}..{:04x}", range.start, range.end),
	}
	Ok(())
}

fn read(device: &mut Device, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS", device.size)?;
	let length = get_usize(sub_m, "LENGTH")?;
	ensure!(address as usize + length <= device.size,
		"{} bytes at 0x{:04x} exceed EEPROM size 0x{:x}", length, address, device.size
	);

	let mut data = vec![0u8; length];
	device.eeprom.read_range(address, &mut data);
	print_hex_dump(address as usize, &data)
}

fn dump(device: &mut Device) -> AResult<()> {
	let mut data = vec![0u8; device.size];
	device.eeprom.read_range(0, &mut data);
	io::stdout().write_all(&data)?;
	Ok(())
}

fn write(device: &mut Device, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS", device.size)?;
	let path = sub_m.value_of("FILE").unwrap_or_default();
	let data = fs::read(path).map_err(|e| {
		let msg = format!("couldn't read {:?}", path);
		failure::Error::from(e).context(msg)
	})?;
	ensure!(address as usize + data.len() <= device.size,
		"{} bytes at 0x{:04x} exceed EEPROM size 0x{:x}", data.len(), address, device.size
	);

	let protection = block_protection(&mut device.eeprom);
	if let Some(range) = protection.protected_range(device.size) {
		let end = address as usize + data.len();
		if range.start < end && (address as usize) < range.end {
			warn!("Range {:04x}..{:04x} overlaps protected area {:04x}..{:04x}; those bytes won't be written",
				address, end, range.start, range.end
			);
		}
	}

	info!("Writing {} bytes at 0x{:04x}", data.len(), address);
	program(&mut device.eeprom, address, &data, device.page_size)?;
	verify(&mut device.eeprom, address, &data)?;
	info!("Image verified successfully");
	Ok(())
}

fn protect(device: &mut Device, sub_m: &clap::ArgMatches) -> AResult<()> {
	let level: BlockProtection = sub_m.value_of("LEVEL").unwrap_or_default().parse()?;
	set_block_protection(&mut device.eeprom, level)?;
	show_status(device)
}

fn wait(device: &mut Device, sub_m: &clap::ArgMatches) -> AResult<()> {
	if sub_m.is_present("max_polls") {
		let max_polls = get_usize(sub_m, "max_polls")?;
		device.eeprom.wait_ready_bounded(max_polls)?;
	} else {
		device.eeprom.wait_ready();
	}
	println!("EEPROM ready");
	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg device: -d --device +takes_value default_value("/dev/spidev0.0") "spidev device")
		(@arg cs_gpio: -c long("cs-gpio") +takes_value +required "GPIO line used as chip select")
		(@arg cs_active_high: long("cs-active-high") "chip select is active high (default: active low)")
		(@arg speed: -s --speed +takes_value default_value("1000000") "SPI clock in Hz")
		(@arg mode: -m --mode +takes_value default_value("0") "SPI mode (0..3)")
		(@arg size: --size +takes_value default_value("4096") "EEPROM size in bytes")
		(@arg page_size: long("page-size") +takes_value default_value("32") "EEPROM write page size in bytes")
		(@subcommand status =>
			(about: "show status register and block protection")
		)
		(@subcommand read =>
			(about: "hex dump EEPROM range")
			(@arg ADDRESS: +required "start address")
			(@arg LENGTH: +required "number of bytes")
		)
		(@subcommand dump =>
			(about: "dump whole EEPROM as binary to stdout")
		)
		(@subcommand write =>
			(about: "write file contents to EEPROM and verify")
			(@arg ADDRESS: +required "start address")
			(@arg FILE: +required "file to write")
		)
		(@subcommand protect =>
			(about: "set block protection")
			(@arg LEVEL: +required possible_value[none quarter half all] "protected part of the memory")
		)
		(@subcommand wren =>
			(about: "set write enable latch")
		)
		(@subcommand wrdi =>
			(about: "reset write enable latch")
		)
		(@subcommand wait =>
			(about: "wait until the EEPROM is ready")
			(@arg max_polls: long("max-polls") +takes_value "give up after this many status reads")
		)
	).get_matches();

	let mut device = open_device(&matches)?;

	let result = match matches.subcommand() {
		("status", _) => {
			show_status(&mut device)
		},
		("read", Some(sub_m)) => {
			read(&mut device, sub_m)
		},
		("dump", _) => {
			dump(&mut device)
		},
		("write", Some(sub_m)) => {
			write(&mut device, sub_m)
		},
		("protect", Some(sub_m)) => {
			protect(&mut device, sub_m)
		},
		("wren", _) => {
			device.eeprom.enable_write();
			Ok(())
		},
		("wrdi", _) => {
			device.eeprom.disable_write();
			Ok(())
		},
		("wait", Some(sub_m)) => {
			wait(&mut device, sub_m)
		},
		("", _) => Err(format_err!("no subcommand")),
		(cmd, _) => Err(format_err!("not implemented subcommand {:?}", cmd)),
	};

	close_device(device);
	result
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
