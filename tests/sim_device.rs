extern crate spi_eeprom;

use spi_eeprom::eeprom::{
	program,
	set_block_protection,
	verify,
};
use spi_eeprom::sim::SimulatedEeprom;
use spi_eeprom::*;

type SimEeprom = Eeprom<SimulatedEeprom, SimulatedEeprom, SimulatedEeprom>;

fn open(sim: &SimulatedEeprom, chip_select: ChipSelect) -> SimEeprom {
	let mut config = Config::new(chip_select);
	config.poll_interval_us = 100;
	Eeprom::new(sim.clone(), sim.clone(), sim.clone(), config)
}

#[test]
fn active_high_chip_select_on_other_line() {
	let cs = ChipSelect { line: 17, active_high: true };
	let sim = SimulatedEeprom::new(0x1000).with_chip_select(cs).with_busy_polls(3);
	let mut ee = open(&sim, cs);
	assert_eq!(sim.line_level(17), Some(false));

	ee.enable_write();
	ee.write_byte(0x0abc, 0x5a);
	ee.wait_ready();
	assert_eq!(ee.read_byte(0x0abc), 0x5a);
	assert!(!sim.is_selected());
	assert_eq!(sim.line_level(17), Some(false));

	// 3 busy polls, one ready poll; a delay between polls only
	assert_eq!(sim.status_reads(), 4);
	assert_eq!(sim.delays(), 3);
	assert_eq!(sim.delayed_us(), 300);
}

#[test]
fn program_whole_device_and_dump() {
	let sim = SimulatedEeprom::new(0x200).with_page_size(32).with_busy_polls(5);
	let mut ee = open(&sim, ChipSelect::active_low(4));
	let image: Vec<u8> = (0..0x200usize).map(|i| (i * 7 + 3) as u8).collect();

	program(&mut ee, 0, &image, 32).unwrap();
	verify(&mut ee, 0, &image).unwrap();

	let mut dump = vec![0u8; 0x200];
	ee.read_range(0, &mut dump);
	assert_eq!(dump, image);
	assert!(!ee.read_status().is_write_enabled());
}

#[test]
fn write_without_enable_is_ignored() {
	let sim = SimulatedEeprom::new(0x100);
	let mut ee = open(&sim, ChipSelect::active_low(0));
	ee.write_range(0x10, &[1, 2, 3]);
	ee.wait_ready();
	assert!(verify(&mut ee, 0x10, &[1, 2, 3]).is_err());
	assert_eq!(&sim.memory()[0x10..0x13], &[0xff, 0xff, 0xff]);
}

#[test]
fn protection_blocks_upper_half() {
	let sim = SimulatedEeprom::new(0x1000).with_page_size(32);
	let mut ee = open(&sim, ChipSelect::active_low(0));
	set_block_protection(&mut ee, BlockProtection::Half).unwrap();

	let status = ee.read_status();
	assert_eq!(status.block_protection(), BlockProtection::Half);
	assert_eq!(status.block_protection().protected_range(0x1000), Some(0x800..0x1000));

	program(&mut ee, 0x07f0, &[0u8; 32], 32).unwrap();
	assert!(sim.memory()[0x07f0..0x0800].iter().all(|&b| b == 0));
	assert!(sim.memory()[0x0800..0x0810].iter().all(|&b| b == 0xff));

	set_block_protection(&mut ee, BlockProtection::None).unwrap();
	program(&mut ee, 0x0800, &[0u8; 16], 32).unwrap();
	verify(&mut ee, 0x07f0, &[0u8; 32]).unwrap();
}

#[test]
fn bounded_wait_gives_up() {
	let sim = SimulatedEeprom::new(0x100);
	let mut ee = open(&sim, ChipSelect::active_low(0));
	sim.set_busy_for(10);
	assert!(ee.wait_ready_bounded(4).is_err());
	assert_eq!(sim.status_reads(), 4);
	ee.wait_ready_bounded(7).unwrap();
	assert_eq!(sim.status_reads(), 10 + 1);
}
