//! In-memory model of a 25xx SPI EEPROM.
//!
//! `SimulatedEeprom` is a cheap handle to a shared device; clones of it are
//! used as bus, GPIO and delay provider at the same time and the test keeps
//! another clone to look at what happened on the wire.
//!
//! Commands are latched when chip select gets released. Writes and status
//! writes need WEN, clear it once the write cycle is done and keep the device
//! busy for a configurable number of status polls. While busy, only RDSR is
//! answered.

use std::cell::RefCell;
use std::rc::Rc;

use crate::eeprom::consts::*;
use crate::eeprom::{
	Bus,
	ChipSelect,
	Delay,
	Gpio,
	StatusRegister,
};

// MISO is pulled up when the device doesn't drive it
const IDLE_LINE: u8 = 0xff;

/// Bytes exchanged within one chip select frame.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Frame {
	pub sent: Vec<u8>,
	pub received: Vec<u8>,
}

#[derive(Debug)]
struct Device {
	memory: Vec<u8>,
	page_size: Option<usize>,
	// RDY is derived from `busy_remaining`
	status: u8,
	write_protect_pin: bool,
	busy_polls: usize,
	busy_remaining: usize,
	chip_select: Option<ChipSelect>,
	selected: bool,
	// device was busy when the current frame started
	frame_busy: bool,
	current: Frame,
	frames: Vec<Frame>,
	lines: Vec<(u32, bool)>,
	status_reads: usize,
	delays: usize,
	delayed_us: u64,
}

impl Device {
	fn status_register(&self) -> StatusRegister {
		let mut status = StatusRegister(self.status);
		status.set_busy(self.busy_remaining > 0);
		status
	}

	fn frame_address(&self) -> usize {
		let sent = &self.current.sent;
		combine_address(sent[1], sent[2]) as usize % self.memory.len()
	}

	fn set_line(&mut self, line: u32, high: bool) {
		match self.lines.iter_mut().find(|(l, _)| *l == line) {
			Some(entry) => entry.1 = high,
			None => self.lines.push((line, high)),
		}

		let active = match self.chip_select {
			Some(cs) if cs.line != line => return,
			Some(cs) => cs.level(true) == high,
			None => !high,
		};

		if active && !self.selected {
			self.selected = true;
			self.frame_busy = self.busy_remaining > 0;
			self.current = Frame::default();
		} else if !active && self.selected {
			self.selected = false;
			self.finish_frame();
		}
	}

	fn exchange(&mut self, data: u8) -> u8 {
		if !self.selected {
			trace!("simulated EEPROM: exchange 0x{:02x} without chip select", data);
			return IDLE_LINE;
		}

		let index = self.current.sent.len();
		self.current.sent.push(data);
		let opcode = self.current.sent[0];

		let response = if index == 0 {
			IDLE_LINE
		} else if opcode == READ_STATUS_OPCODE {
			self.status_register().bits()
		} else if self.frame_busy {
			IDLE_LINE
		} else if opcode == READ_OPCODE && index >= 3 {
			let address = (self.frame_address() + index - 3) % self.memory.len();
			self.memory[address]
		} else {
			IDLE_LINE
		};

		self.current.received.push(response);
		response
	}

	fn finish_frame(&mut self) {
		trace!("simulated EEPROM frame: {:02x?}", self.current.sent);
		self.frames.push(self.current.clone());

		let opcode = match self.current.sent.first() {
			None => return,
			Some(&opcode) => opcode,
		};

		if opcode == READ_STATUS_OPCODE {
			self.status_reads += 1;
			if self.frame_busy {
				self.busy_remaining -= 1;
				if self.busy_remaining == 0 {
					self.complete_write_cycle();
				}
			}
			return;
		}

		if self.frame_busy {
			return;
		}

		let write_enabled = 0 != self.status & STATUS_WEN;
		match opcode {
			WREN_OPCODE => self.status |= STATUS_WEN,
			WRDI_OPCODE => self.status &= !STATUS_WEN,
			WRITE_OPCODE if write_enabled && self.current.sent.len() > 3 => {
				self.write_memory();
				self.start_write_cycle();
			},
			WRITE_STATUS_OPCODE if write_enabled && self.current.sent.len() > 1 => {
				let locked = self.write_protect_pin && 0 != self.status & STATUS_WPEN;
				if !locked {
					let value = StatusRegister(self.current.sent[1]).writable_bits();
					self.status = (self.status & !(STATUS_BP_MASK | STATUS_WPEN)) | value;
				}
				self.start_write_cycle();
			},
			_ => (),
		}
	}

	fn write_memory(&mut self) {
		let size = self.memory.len();
		let start = self.frame_address();
		let protection = StatusRegister(self.status).block_protection();
		let data = self.current.sent[3..].to_vec();

		for (i, byte) in data.into_iter().enumerate() {
			let address = match self.page_size {
				Some(page) => {
					let page_start = start - start % page;
					(page_start + (start % page + i) % page) % size
				},
				None => (start + i) % size,
			};
			if protection.is_protected(size, address) {
				continue;
			}
			self.memory[address] = byte;
		}
	}

	fn start_write_cycle(&mut self) {
		self.busy_remaining = self.busy_polls;
		if self.busy_remaining == 0 {
			self.complete_write_cycle();
		}
	}

	fn complete_write_cycle(&mut self) {
		self.status &= !STATUS_WEN;
	}
}

#[derive(Clone, Debug)]
pub struct SimulatedEeprom(Rc<RefCell<Device>>);

impl SimulatedEeprom {
	/// Erased (all 0xff) device with `size` bytes, no paging and writes
	/// finishing instantly.
	pub fn new(size: usize) -> Self {
		assert!(size > 0 && size <= 0x1_0000);
		SimulatedEeprom(Rc::new(RefCell::new(Device {
			memory: vec![0xff; size],
			page_size: None,
			status: 0,
			write_protect_pin: false,
			busy_polls: 0,
			busy_remaining: 0,
			chip_select: None,
			selected: false,
			frame_busy: false,
			current: Frame::default(),
			frames: Vec::new(),
			lines: Vec::new(),
			status_reads: 0,
			delays: 0,
			delayed_us: 0,
		})))
	}

	/// Writes wrap around within pages of `page_size` bytes.
	pub fn with_page_size(self, page_size: usize) -> Self {
		assert!(page_size > 0 && self.size() % page_size == 0);
		self.0.borrow_mut().page_size = Some(page_size);
		self
	}

	/// Number of status polls reporting busy after each write cycle starts.
	pub fn with_busy_polls(self, polls: usize) -> Self {
		self.0.borrow_mut().busy_polls = polls;
		self
	}

	/// Only react to `chip_select`; by default any line driven low selects.
	pub fn with_chip_select(self, chip_select: ChipSelect) -> Self {
		self.0.borrow_mut().chip_select = Some(chip_select);
		self
	}

	pub fn size(&self) -> usize {
		self.0.borrow().memory.len()
	}

	pub fn load(&self, address: usize, data: &[u8]) {
		self.0.borrow_mut().memory[address..address + data.len()].copy_from_slice(data);
	}

	pub fn memory(&self) -> Vec<u8> {
		self.0.borrow().memory.clone()
	}

	pub fn status(&self) -> StatusRegister {
		self.0.borrow().status_register()
	}

	/// Set the status register; RDY is ignored, use `set_busy_for`.
	pub fn set_status(&self, status: u8) {
		self.0.borrow_mut().status = status & !STATUS_RDY;
	}

	/// Report busy for the next `polls` status reads.
	pub fn set_busy_for(&self, polls: usize) {
		self.0.borrow_mut().busy_remaining = polls;
	}

	/// Hardware write protect pin; with WPEN set it locks the status register.
	pub fn set_write_protect_pin(&self, active: bool) {
		self.0.borrow_mut().write_protect_pin = active;
	}

	pub fn frames(&self) -> Vec<Frame> {
		self.0.borrow().frames.clone()
	}

	pub fn clear_frames(&self) {
		self.0.borrow_mut().frames.clear();
	}

	/// Completed select/deselect pairs.
	pub fn chip_select_cycles(&self) -> usize {
		self.0.borrow().frames.len()
	}

	pub fn is_selected(&self) -> bool {
		self.0.borrow().selected
	}

	pub fn line_level(&self, line: u32) -> Option<bool> {
		self.0.borrow().lines.iter().find(|(l, _)| *l == line).map(|&(_, high)| high)
	}

	pub fn status_reads(&self) -> usize {
		self.0.borrow().status_reads
	}

	pub fn delays(&self) -> usize {
		self.0.borrow().delays
	}

	pub fn delayed_us(&self) -> u64 {
		self.0.borrow().delayed_us
	}
}

impl Bus for SimulatedEeprom {
	fn exchange(&mut self, data: u8) -> u8 {
		self.0.borrow_mut().exchange(data)
	}
}

impl Gpio for SimulatedEeprom {
	fn set_line(&mut self, line: u32, high: bool) {
		self.0.borrow_mut().set_line(line, high)
	}
}

impl Delay for SimulatedEeprom {
	fn delay_us(&mut self, us: u32) {
		let mut device = self.0.borrow_mut();
		device.delays += 1;
		device.delayed_us += us as u64;
	}
}
