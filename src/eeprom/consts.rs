// EEPROM commands:
pub const WRITE_STATUS_OPCODE: u8 = 0x01; // "WRSR"; needs WEL, clears it when the cycle finished
pub const WRITE_OPCODE:        u8 = 0x02; // write data; clears WEL when CS gets disabled
pub const READ_OPCODE:         u8 = 0x03; // read data
pub const WRDI_OPCODE:         u8 = 0x04; // write disable (clears WEL)
pub const READ_STATUS_OPCODE:  u8 = 0x05; // "RDSR"
pub const WREN_OPCODE:         u8 = 0x06; // write enable (sets WEL)

// clocked out while receiving
pub const DUMMY_BYTE: u8 = 0x00;

// status register bits
pub const STATUS_RDY:        u8 = 0x01;
pub const STATUS_WEN:        u8 = 0x02;
pub const STATUS_BP_MASK:    u8 = 0x0c;
pub const STATUS_BP_SHIFT:   u8 = 2;
pub const STATUS_WPEN:       u8 = 0x80;

/// Address bytes as sent on the wire: high byte first.
pub fn split_address(address: u16) -> [u8; 2] {
	[(address >> 8) as u8, (address & 0xff) as u8]
}

pub fn combine_address(high: u8, low: u8) -> u16 {
	(high as u16) << 8 | low as u16
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn address_split_combine_all() {
		for address in 0..=u16::max_value() {
			let [high, low] = split_address(address);
			assert_eq!(high as u16, address >> 8);
			assert_eq!(low as u16, address & 0xff);
			assert_eq!(combine_address(high, low), address);
		}
	}

	#[test]
	fn address_high_byte_first() {
		assert_eq!(split_address(0x0c01), [0x0c, 0x01]);
		assert_eq!(split_address(0x00ff), [0x00, 0xff]);
		assert_eq!(split_address(0xff00), [0xff, 0x00]);
	}
}
