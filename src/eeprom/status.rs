use std::fmt;
use std::ops::Range;

use super::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockProtection {
	None,
	Quarter,
	Half,
	WholeMemory,
}

impl BlockProtection {
	pub fn from_bits(v: u8) -> Self {
		match v & 0x3 {
			0b00 => BlockProtection::None,
			0b01 => BlockProtection::Quarter,
			0b10 => BlockProtection::Half,
			0b11 => BlockProtection::WholeMemory,
			_ => unreachable!(),
		}
	}

	pub fn bits(self) -> u8 {
		match self {
			BlockProtection::None => 0b00,
			BlockProtection::Quarter => 0b01,
			BlockProtection::Half => 0b10,
			BlockProtection::WholeMemory => 0b11,
		}
	}

	/// Read-only address range on a device with `size` bytes; always
	/// the upper part of the array.
	pub fn protected_range(self, size: usize) -> Option<Range<usize>> {
		match self {
			BlockProtection::None => None,
			BlockProtection::Quarter => Some(size - size / 4..size),
			BlockProtection::Half => Some(size / 2..size),
			BlockProtection::WholeMemory => Some(0..size),
		}
	}

	pub fn is_protected(self, size: usize, address: usize) -> bool {
		match self.protected_range(size) {
			None => false,
			Some(range) => range.contains(&address),
		}
	}
}

impl std::str::FromStr for BlockProtection {
	type Err = failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"none" => Ok(BlockProtection::None),
			"quarter" => Ok(BlockProtection::Quarter),
			"half" => Ok(BlockProtection::Half),
			"all" | "whole" => Ok(BlockProtection::WholeMemory),
			_ => bail!("invalid block protection {:?} (expected none, quarter, half or all)", s),
		}
	}
}

/// Status register value; bits not covered by an accessor are kept as they
/// are.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StatusRegister(pub u8);

impl StatusRegister {
	pub fn bits(&self) -> u8 {
		self.0
	}

	/// RDY: internal write cycle in progress
	pub fn is_busy(&self) -> bool {
		0 != self.0 & STATUS_RDY
	}

	pub fn is_write_enabled(&self) -> bool {
		0 != self.0 & STATUS_WEN
	}

	pub fn block_protection(&self) -> BlockProtection {
		BlockProtection::from_bits((self.0 & STATUS_BP_MASK) >> STATUS_BP_SHIFT)
	}

	pub fn is_write_protect_enabled(&self) -> bool {
		0 != self.0 & STATUS_WPEN
	}

	// RDY and WEN are read only; writing the register only changes BP and WPEN
	pub fn writable_bits(&self) -> u8 {
		self.0 & (STATUS_BP_MASK | STATUS_WPEN)
	}

	pub fn set_busy(&mut self, busy: bool) -> &mut Self {
		self.set_flag(STATUS_RDY, busy)
	}

	pub fn set_write_enabled(&mut self, enabled: bool) -> &mut Self {
		self.set_flag(STATUS_WEN, enabled)
	}

	pub fn set_block_protection(&mut self, level: BlockProtection) -> &mut Self {
		self.0 = (self.0 & !STATUS_BP_MASK) | (level.bits() << STATUS_BP_SHIFT);
		self
	}

	pub fn set_write_protect_enabled(&mut self, enabled: bool) -> &mut Self {
		self.set_flag(STATUS_WPEN, enabled)
	}

	fn set_flag(&mut self, mask: u8, value: bool) -> &mut Self {
		if value {
			self.0 |= mask;
		} else {
			self.0 &= !mask;
		}
		self
	}
}

impl From<u8> for StatusRegister {
	fn from(v: u8) -> Self {
		StatusRegister(v)
	}
}

impl fmt::Display for StatusRegister {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for StatusRegister {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f,
			"0x{:02x} (block protection: {:?}",
			self.0,
			self.block_protection(),
		)?;
		if self.is_busy() { write!(f, " [BUSY]")?; }
		if self.is_write_enabled() { write!(f, " [WEN]")?; }
		if self.is_write_protect_enabled() { write!(f, " [WPEN]")?; }
		write!(f, ")")
	}
}
