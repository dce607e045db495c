use super::consts::DUMMY_BYTE;
use super::hardware::{
	Bus,
	ChipSelect,
	Gpio,
};

/// One frame on the bus: chip select is active for the lifetime of the
/// transaction and released on drop.
pub struct Transaction<'a, B: ?Sized+Bus+'a, G: ?Sized+Gpio+'a> {
	bus: &'a mut B,
	gpio: &'a mut G,
	chip_select: ChipSelect,
}

impl<'a, B: ?Sized+Bus, G: ?Sized+Gpio> Transaction<'a, B, G> {
	pub fn start(bus: &'a mut B, gpio: &'a mut G, chip_select: ChipSelect) -> Self {
		gpio.set_line(chip_select.line, chip_select.level(true));
		Transaction {
			bus,
			gpio,
			chip_select,
		}
	}

	pub fn exchange(&mut self, data: u8) -> u8 {
		self.bus.exchange(data)
	}

	// received bytes are "don't care" while sending
	pub fn send(&mut self, data: &[u8]) {
		for &b in data {
			self.bus.exchange(b);
		}
	}

	pub fn receive_byte(&mut self) -> u8 {
		self.bus.exchange(DUMMY_BYTE)
	}

	pub fn receive(&mut self, target: &mut [u8]) {
		for t in target.iter_mut() {
			*t = self.bus.exchange(DUMMY_BYTE);
		}
	}
}

impl<'a, B: ?Sized + Bus, G: ?Sized + Gpio> Drop for Transaction<'a, B, G> {
	fn drop(&mut self) {
		self.gpio.set_line(self.chip_select.line, self.chip_select.level(false));
	}
}
