//! Protocol for 25xx-style SPI EEPROMs with 16-bit addressing (e.g. a 4 KiB
//! 25xx320 / M95320).
//!
//! Every instruction is one frame: chip select goes active, the opcode is
//! clocked out followed by address and data bytes, and chip select goes
//! inactive again. The device only acts on a command when chip select is
//! released.
//!
//! Instructions:
//! - 0x06: WREN (write enable, sets WEN), no address/data
//! - 0x04: WRDI (write disable, clears WEN), no address/data
//! - 0x05: RDSR (read status register), recv 1 byte
//! - 0x01: WRSR (write status register), send 1 byte
//! - 0x03: READ from address (2 bytes, high first), recv data; the address
//!   increments for each further byte clocked in the same frame
//! - 0x02: WRITE to address (2 bytes, high first), send data
//!
//! WRITE and WRSR need WEN; WEN is cleared once the internal write cycle
//! finished. While that cycle runs RDY in the status register is set and the
//! device ignores everything but RDSR.

pub(crate) mod consts;
mod hardware;
mod operations;
mod program;
mod status;
mod transaction;

pub use self::consts::{
	combine_address,
	split_address,
};

pub use self::hardware::{
	Bus,
	ChipSelect,
	Config,
	Delay,
	Gpio,
	reliable_sleep,
};

pub use self::operations::Eeprom;

pub use self::program::{
	block_protection,
	program,
	set_block_protection,
	verify,
};

pub use self::status::{
	BlockProtection,
	StatusRegister,
};

pub use self::transaction::Transaction;
