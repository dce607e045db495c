use super::hardware::{
	Bus,
	Delay,
	Gpio,
};
use super::operations::Eeprom;
use super::status::{
	BlockProtection,
	StatusRegister,
};

/// Write `data` starting at `address`, one write cycle per page.
///
/// A write frame must not cross a page boundary (the device would wrap
/// around within the page), so `data` is split at multiples of
/// `page_size`. Each page gets its own WREN and completion wait.
pub fn program<B, G, D>(eeprom: &mut Eeprom<B, G, D>, address: u16, data: &[u8], page_size: usize) -> crate::AResult<()>
where
	B: Bus,
	G: Gpio,
	D: Delay,
{
	ensure!(page_size > 0, "page size must not be zero");
	ensure!(address as usize + data.len() <= 0x1_0000,
		"{} bytes at 0x{:04x} exceed the 16-bit address space", data.len(), address
	);

	let mut offset = 0usize;
	while offset < data.len() {
		let page_address = address as usize + offset;
		let chunk = (page_size - page_address % page_size).min(data.len() - offset);
		debug!("EEPROM program page at 0x{:04x} ({} bytes)", page_address, chunk);

		eeprom.enable_write();
		eeprom.write_range(page_address as u16, &data[offset..offset + chunk]);
		eeprom.wait_ready();

		offset += chunk;
	}

	Ok(())
}

/// Read back and compare; errors at the first differing byte.
pub fn verify<B, G, D>(eeprom: &mut Eeprom<B, G, D>, address: u16, data: &[u8]) -> crate::AResult<()>
where
	B: Bus,
	G: Gpio,
	D: Delay,
{
	ensure!(address as usize + data.len() <= 0x1_0000,
		"{} bytes at 0x{:04x} exceed the 16-bit address space", data.len(), address
	);

	let mut flash = vec![0u8; data.len()];
	eeprom.read_range(address, &mut flash);
	for (i, (&expected, &found)) in data.iter().zip(flash.iter()).enumerate() {
		ensure!(expected == found,
			"Verify failed at {:04x}: expected {:02x}, EEPROM has {:02x}", address as usize + i, expected, found
		);
	}

	Ok(())
}

pub fn block_protection<B, G, D>(eeprom: &mut Eeprom<B, G, D>) -> BlockProtection
where
	B: Bus,
	G: Gpio,
	D: Delay,
{
	eeprom.read_status().block_protection()
}

/// Change the BP bits, keeping WPEN as it is.
///
/// With WPEN set and the hardware WP pin active the device ignores the
/// status write; this returns an error if the level didn't change.
pub fn set_block_protection<B, G, D>(eeprom: &mut Eeprom<B, G, D>, level: BlockProtection) -> crate::AResult<()>
where
	B: Bus,
	G: Gpio,
	D: Delay,
{
	eeprom.wait_ready();
	let current = eeprom.read_status();
	let mut status = StatusRegister(current.writable_bits());
	status.set_block_protection(level);

	eeprom.enable_write();
	eeprom.write_status_register(status.bits());
	eeprom.wait_ready();

	let result = eeprom.read_status();
	ensure!(result.block_protection() == level,
		"Block protection still {:?} after setting {:?} (status {:?})", result.block_protection(), level, result
	);
	info!("EEPROM block protection set to {:?}", level);

	Ok(())
}
