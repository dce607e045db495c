use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use libc::{
	c_ulong,
	c_void,
	ioctl,
};

use crate::eeprom::Bus;

// linux/spi/spidev.h: _IOW(SPI_IOC_MAGIC, nr, type) with SPI_IOC_MAGIC = 'k'
const SPI_IOC_WR_MODE:          c_ulong = 0x4001_6b01;
const SPI_IOC_WR_BITS_PER_WORD: c_ulong = 0x4001_6b03;
const SPI_IOC_WR_MAX_SPEED_HZ:  c_ulong = 0x4004_6b04;
// SPI_IOC_MESSAGE(1)
const SPI_IOC_MESSAGE_1:        c_ulong = 0x4020_6b00;

const SPI_MODE_MASK: u8 = 0x03; // CPOL | CPHA
const SPI_NO_CS:     u8 = 0x40;

// struct spi_ioc_transfer
#[repr(C)]
#[derive(Default, Debug)]
struct SpiIocTransfer {
	tx_buf: u64,
	rx_buf: u64,
	len: u32,
	speed_hz: u32,
	delay_usecs: u16,
	bits_per_word: u8,
	cs_change: u8,
	tx_nbits: u8,
	rx_nbits: u8,
	word_delay_usecs: u8,
	pad: u8,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SpiConfig {
	pub path: PathBuf,
	/// SPI mode 0..3
	pub mode: u8,
	pub speed_hz: u32,
	/// leave chip select alone; it is driven through GPIO instead
	pub no_chip_select: bool,
}

impl SpiConfig {
	pub fn new<P: Into<PathBuf>>(path: P) -> Self {
		SpiConfig {
			path: path.into(),
			mode: 0,
			speed_hz: 1_000_000,
			no_chip_select: true,
		}
	}

	fn mode_bits(&self) -> u8 {
		let mut bits = self.mode & SPI_MODE_MASK;
		if self.no_chip_select {
			bits |= SPI_NO_CS;
		}
		bits
	}
}

fn spi_ioctl<T>(file: &fs::File, request: c_ulong, arg: &T) -> io::Result<()> {
	let res = unsafe {
		ioctl(file.as_raw_fd(), request as _, arg as *const T as *const c_void)
	};
	if res < 0 {
		return Err(io::Error::last_os_error());
	}
	Ok(())
}

/// Linux spidev bus; one `ioctl` per exchanged byte.
#[derive(Debug)]
pub struct Spidev {
	file: fs::File,
	config: SpiConfig,
}

impl Spidev {
	/// Opens and configures the SPI device.
	pub fn start(config: &SpiConfig) -> crate::AResult<Self> {
		ensure!(config.mode <= SPI_MODE_MASK, "invalid SPI mode {} (expected 0..3)", config.mode);
		ensure!(config.speed_hz > 0, "SPI speed must not be zero");

		with_context!(("couldn't start SPI device {}", config.path.display()), {
			let file = fs::OpenOptions::new().read(true).write(true).open(&config.path)?;

			spi_ioctl(&file, SPI_IOC_WR_MODE, &config.mode_bits())?;
			spi_ioctl(&file, SPI_IOC_WR_BITS_PER_WORD, &8u8)?;
			spi_ioctl(&file, SPI_IOC_WR_MAX_SPEED_HZ, &config.speed_hz)?;

			info!("SPI {}: mode {}, {} Hz", config.path.display(), config.mode, config.speed_hz);

			Ok(Spidev {
				file,
				config: config.clone(),
			})
		})
	}

	pub fn config(&self) -> &SpiConfig {
		&self.config
	}

	pub fn stop(self) {
		debug!("SPI {}: stopped", self.config.path.display());
	}
}

impl Bus for Spidev {
	fn exchange(&mut self, data: u8) -> u8 {
		let tx = [data];
		let mut rx = [0u8];
		let transfer = SpiIocTransfer {
			tx_buf: tx.as_ptr() as u64,
			rx_buf: rx.as_mut_ptr() as u64,
			len: 1,
			speed_hz: self.config.speed_hz,
			bits_per_word: 8,
			..Default::default()
		};
		if let Err(e) = spi_ioctl(&self.file, SPI_IOC_MESSAGE_1, &transfer) {
			panic!("SPI exchange on {} failed: {}", self.config.path.display(), e);
		}
		rx[0]
	}
}
