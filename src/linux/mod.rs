// OS-specific backend: spidev for the bus, sysfs GPIO for chip select.

mod gpio;
mod spidev;

pub use self::gpio::SysfsGpio;

pub use self::spidev::{
	SpiConfig,
	Spidev,
};

use crate::eeprom::{
	Delay,
	reliable_sleep,
};

use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
	fn delay_us(&mut self, us: u32) {
		reliable_sleep(Duration::from_micros(us as u64));
	}
}
