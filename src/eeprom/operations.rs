use super::consts::*;
use super::hardware::{
	Bus,
	Config,
	Delay,
	Gpio,
};
use super::status::StatusRegister;
use super::transaction::Transaction;

/// Driver for one EEPROM; owns the bus, the chip select GPIO and the delay
/// provider for as long as it lives.
///
/// None of the operations check WEN or block protection; the device simply
/// ignores writes it doesn't accept.
pub struct Eeprom<B: Bus, G: Gpio, D: Delay> {
	bus: B,
	gpio: G,
	delay: D,
	config: Config,
}

impl<B: Bus, G: Gpio, D: Delay> Eeprom<B, G, D> {
	/// Takes over the bus; drives chip select to its idle level.
	pub fn new(bus: B, mut gpio: G, delay: D, config: Config) -> Self {
		let cs = config.chip_select;
		gpio.set_line(cs.line, cs.idle_level());
		Eeprom {
			bus,
			gpio,
			delay,
			config,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Hand back bus, GPIO and delay (e.g. to stop the bus).
	pub fn release(self) -> (B, G, D) {
		(self.bus, self.gpio, self.delay)
	}

	pub fn start_transaction(&mut self) -> Transaction<'_, B, G> {
		Transaction::start(&mut self.bus, &mut self.gpio, self.config.chip_select)
	}

	/// Run `body` within a single chip select frame.
	pub fn transaction<'a, F, R>(&'a mut self, body: F) -> R
	where
		F: FnOnce(&mut Transaction<'a, B, G>) -> R,
	{
		let mut tx = self.start_transaction();
		body(&mut tx)
	}

	fn command(&mut self, opcode: u8) {
		trace!("EEPROM command 0x{:02x}", opcode);
		self.transaction(|tx| tx.send(&[opcode]));
	}

	pub fn enable_write(&mut self) {
		self.command(WREN_OPCODE);
	}

	pub fn disable_write(&mut self) {
		self.command(WRDI_OPCODE);
	}

	pub fn read_status_register(&mut self) -> u8 {
		let status = self.transaction(|tx| {
			tx.send(&[READ_STATUS_OPCODE]);
			tx.receive_byte()
		});
		trace!("EEPROM status 0x{:02x}", status);
		status
	}

	pub fn read_status(&mut self) -> StatusRegister {
		StatusRegister(self.read_status_register())
	}

	pub fn write_status_register(&mut self, value: u8) {
		debug!("EEPROM write status register 0x{:02x}", value);
		self.transaction(|tx| tx.send(&[WRITE_STATUS_OPCODE, value]));
	}

	pub fn read_byte(&mut self, address: u16) -> u8 {
		let [high, low] = split_address(address);
		self.transaction(|tx| {
			tx.send(&[READ_OPCODE, high, low]);
			tx.receive_byte()
		})
	}

	pub fn write_byte(&mut self, address: u16, data: u8) {
		debug!("EEPROM write 0x{:02x} at 0x{:04x}", data, address);
		let [high, low] = split_address(address);
		self.transaction(|tx| tx.send(&[WRITE_OPCODE, high, low, data]));
	}

	/// Sequential read; the device increments the address per byte.
	pub fn read_range(&mut self, address: u16, target: &mut [u8]) {
		trace!("EEPROM read {} bytes from 0x{:04x}", target.len(), address);
		let [high, low] = split_address(address);
		self.transaction(|tx| {
			tx.send(&[READ_OPCODE, high, low]);
			tx.receive(target);
		});
	}

	/// Sequential write in one frame.
	///
	/// Most devices only buffer one page per write cycle and wrap around
	/// within that page; `eeprom::program` splits writes at page boundaries.
	pub fn write_range(&mut self, address: u16, data: &[u8]) {
		debug!("EEPROM write {} bytes at 0x{:04x}", data.len(), address);
		let [high, low] = split_address(address);
		self.transaction(|tx| {
			tx.send(&[WRITE_OPCODE, high, low]);
			tx.send(data);
		});
	}

	/// Wait until the device finished its internal write cycle.
	///
	/// Blocks forever if the device never clears RDY.
	pub fn wait_ready(&mut self) {
		let mut polls = 0usize;
		while self.read_status().is_busy() {
			polls += 1;
			self.delay.delay_us(self.config.poll_interval_us);
		}
		trace!("EEPROM ready after {} busy polls", polls);
	}

	/// Like [`wait_ready`](Self::wait_ready), but gives up after
	/// `max_polls` status reads that all reported busy.
	///
	/// The status is read at least once, even for `max_polls == 0`.
	pub fn wait_ready_bounded(&mut self, max_polls: usize) -> crate::AResult<()> {
		let max_polls = max_polls.max(1);
		for poll in 0..max_polls {
			if !self.read_status().is_busy() {
				trace!("EEPROM ready after {} busy polls", poll);
				return Ok(());
			}
			if poll + 1 < max_polls {
				self.delay.delay_us(self.config.poll_interval_us);
			}
		}
		bail!("EEPROM still busy after {} status polls", max_polls);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::eeprom::hardware::ChipSelect;
	use crate::eeprom::status::BlockProtection;
	use crate::sim::{
		Frame,
		SimulatedEeprom,
	};

	const CS: u32 = 8;

	fn make_eeprom(sim: &SimulatedEeprom) -> Eeprom<SimulatedEeprom, SimulatedEeprom, SimulatedEeprom> {
		Eeprom::new(sim.clone(), sim.clone(), sim.clone(), Config::new(ChipSelect::active_low(CS)))
	}

	fn single_frame(sim: &SimulatedEeprom) -> Frame {
		let frames = sim.frames();
		assert_eq!(frames.len(), 1, "expected exactly one frame: {:?}", frames);
		assert_eq!(sim.chip_select_cycles(), 1);
		frames.into_iter().next().unwrap()
	}

	#[test]
	fn new_drives_chip_select_idle() {
		let sim = SimulatedEeprom::new(0x1000);
		let ee = make_eeprom(&sim);
		assert_eq!(ee.config().chip_select, ChipSelect::active_low(CS));
		assert_eq!(ee.config().poll_interval_us, 1);
		assert_eq!(sim.line_level(CS), Some(true));
		assert!(sim.frames().is_empty());
	}

	#[test]
	fn each_operation_is_one_frame() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.enable_write();
		ee.write_status_register(0x0c);
		sim.clear_frames();
		assert_eq!(sim.chip_select_cycles(), 0);

		ee.read_byte(0x0123);
		assert_eq!(single_frame(&sim).sent, vec![0x03, 0x01, 0x23, 0x00]);
		sim.clear_frames();
		ee.read_status_register();
		assert_eq!(single_frame(&sim).sent, vec![0x05, 0x00]);
	}

	#[test]
	fn enable_write_single_opcode() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.enable_write();
		assert_eq!(single_frame(&sim).sent, vec![0x06]);
		assert!(ee.read_status().is_write_enabled());
	}

	#[test]
	fn disable_write_single_opcode() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.disable_write();
		assert_eq!(single_frame(&sim).sent, vec![0x04]);

		ee.enable_write();
		ee.disable_write();
		assert!(!ee.read_status().is_write_enabled());
	}

	#[test]
	fn read_status_frame() {
		let sim = SimulatedEeprom::new(0x1000);
		sim.set_status(0b1000_1000);
		let mut ee = make_eeprom(&sim);
		assert_eq!(ee.read_status_register(), 0b1000_1000);
		assert_eq!(single_frame(&sim).sent, vec![0x05, 0x00]);
	}

	#[test]
	fn write_status_frame() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.write_status_register(0x8c);
		assert_eq!(single_frame(&sim).sent, vec![0x01, 0x8c]);
		// without WREN the device ignores it
		assert_eq!(sim.status().bits(), 0x00);
	}

	#[test]
	fn write_status_after_enable() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.enable_write();
		ee.write_status_register(0x88);
		ee.wait_ready();
		let status = ee.read_status();
		assert_eq!(status.block_protection(), BlockProtection::Half);
		assert!(status.is_write_protect_enabled());
		assert!(!status.is_write_enabled());
	}

	#[test]
	fn read_byte_frame() {
		let sim = SimulatedEeprom::new(0x1000);
		sim.load(0x0a5c, &[0x42]);
		let mut ee = make_eeprom(&sim);
		assert_eq!(ee.read_byte(0x0a5c), 0x42);
		assert_eq!(single_frame(&sim).sent, vec![0x03, 0x0a, 0x5c, 0x00]);
	}

	#[test]
	fn write_byte_frame() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.write_byte(0x0123, 0xbe);
		assert_eq!(single_frame(&sim).sent, vec![0x02, 0x01, 0x23, 0xbe]);
		// not write enabled: ignored
		assert_eq!(sim.memory()[0x0123], 0xff);
	}

	#[test]
	fn range_frames() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.write_range(0x0200, &[1, 2, 3]);
		let mut buf = [0u8; 2];
		ee.read_range(0x0200, &mut buf);

		let frames = sim.frames();
		assert_eq!(frames.len(), 2);
		assert_eq!(sim.chip_select_cycles(), 2);
		assert_eq!(frames[0].sent, vec![0x02, 0x02, 0x00, 1, 2, 3]);
		assert_eq!(frames[1].sent, vec![0x03, 0x02, 0x00, 0x00, 0x00]);
	}

	#[test]
	fn empty_ranges_send_opcode_and_address() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.read_range(0x0010, &mut []);
		ee.write_range(0x0020, &[]);
		let frames = sim.frames();
		assert_eq!(frames.len(), 2);
		assert_eq!(frames[0].sent, vec![0x03, 0x00, 0x10]);
		assert_eq!(frames[1].sent, vec![0x02, 0x00, 0x20]);
	}

	#[test]
	fn byte_roundtrip() {
		let sim = SimulatedEeprom::new(0x1000).with_busy_polls(2);
		let mut ee = make_eeprom(&sim);
		for &(address, value) in &[(0x0000u16, 0xaau8), (0x0001, 0x00), (0x0fff, 0x5a), (0x0800, 0x7f)] {
			ee.enable_write();
			ee.write_byte(address, value);
			ee.wait_ready();
			assert_eq!(ee.read_byte(address), value, "mismatch at 0x{:04x}", address);
		}
	}

	#[test]
	fn range_roundtrip() {
		for &len in &[0usize, 1, 16, 256] {
			let sim = SimulatedEeprom::new(0x1000).with_busy_polls(1);
			let mut ee = make_eeprom(&sim);
			let data: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
			ee.enable_write();
			ee.write_range(0x0300, &data);
			ee.wait_ready();
			let mut back = vec![0u8; len];
			ee.read_range(0x0300, &mut back);
			assert_eq!(back, data, "length {}", len);
		}
	}

	#[test]
	fn wait_ready_polls_until_ready() {
		for &k in &[0usize, 3, 50] {
			let sim = SimulatedEeprom::new(0x1000);
			sim.set_busy_for(k);
			let mut ee = make_eeprom(&sim);
			ee.wait_ready();
			assert_eq!(sim.status_reads(), k + 1, "busy for {} polls", k);
			assert_eq!(sim.delays(), k);
			assert!(sim.frames().iter().all(|f| f.sent == vec![0x05, 0x00]));
		}
	}

	#[test]
	fn wait_ready_uses_configured_interval() {
		let sim = SimulatedEeprom::new(0x1000);
		sim.set_busy_for(2);
		let mut config = Config::new(ChipSelect::active_low(CS));
		config.poll_interval_us = 25;
		let mut ee = Eeprom::new(sim.clone(), sim.clone(), sim.clone(), config);
		ee.wait_ready();
		assert_eq!(sim.delayed_us(), 50);
	}

	#[test]
	fn wait_ready_bounded_succeeds() {
		let sim = SimulatedEeprom::new(0x1000);
		sim.set_busy_for(3);
		let mut ee = make_eeprom(&sim);
		ee.wait_ready_bounded(4).unwrap();
		assert_eq!(sim.status_reads(), 4);
	}

	#[test]
	fn wait_ready_bounded_gives_up() {
		let sim = SimulatedEeprom::new(0x1000);
		sim.set_busy_for(10);
		let mut ee = make_eeprom(&sim);
		let err = ee.wait_ready_bounded(5).unwrap_err();
		assert_eq!(err.to_string(), "EEPROM still busy after 5 status polls");
		assert_eq!(sim.status_reads(), 5);
		assert_eq!(sim.delays(), 4);
	}

	#[test]
	fn wait_ready_bounded_zero_polls_once() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.wait_ready_bounded(0).unwrap();
		assert_eq!(sim.status_reads(), 1);

		sim.set_busy_for(2);
		let err = ee.wait_ready_bounded(0).unwrap_err();
		assert_eq!(err.to_string(), "EEPROM still busy after 1 status polls");
		assert_eq!(sim.status_reads(), 2);
		assert_eq!(sim.delays(), 0);
	}

	#[test]
	fn busy_device_ignores_commands() {
		let sim = SimulatedEeprom::new(0x1000).with_busy_polls(3);
		let mut ee = make_eeprom(&sim);
		ee.enable_write();
		ee.write_byte(0x10, 0x01);
		// still busy: the second write is dropped
		ee.enable_write();
		ee.write_byte(0x11, 0x02);
		ee.wait_ready();
		assert_eq!(ee.read_byte(0x10), 0x01);
		assert_eq!(ee.read_byte(0x11), 0xff);
	}

	#[test]
	fn write_clears_write_enable() {
		let sim = SimulatedEeprom::new(0x1000);
		let mut ee = make_eeprom(&sim);
		ee.enable_write();
		ee.write_byte(0x10, 0x01);
		ee.wait_ready();
		assert!(!ee.read_status().is_write_enabled());
		ee.write_byte(0x10, 0x02);
		ee.wait_ready();
		assert_eq!(ee.read_byte(0x10), 0x01);
	}

	#[test]
	fn transaction_closure_frames_body() {
		let sim = SimulatedEeprom::new(0x1000);
		sim.load(0, &[0x11, 0x22]);
		let mut ee = make_eeprom(&sim);
		let (a, b) = ee.transaction(|tx| {
			tx.send(&[0x03, 0x00, 0x00]);
			(tx.receive_byte(), tx.receive_byte())
		});
		assert_eq!((a, b), (0x11, 0x22));
		assert_eq!(sim.chip_select_cycles(), 1);
	}

	#[test]
	fn release_returns_parts() {
		let sim = SimulatedEeprom::new(0x100);
		let ee = make_eeprom(&sim);
		let (bus, _gpio, _delay) = ee.release();
		bus.load(0, &[1]);
		assert_eq!(sim.memory()[0], 1);
	}
}
