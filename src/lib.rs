#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod eeprom;
pub mod linux;
pub mod sim;

pub use self::eeprom::{
	BlockProtection,
	Bus,
	ChipSelect,
	Config,
	Delay,
	Eeprom,
	Gpio,
	StatusRegister,
};

/// Parse an unsigned number, decimal or `0x` prefixed hex.
pub fn parse_number(s: &str) -> AResult<u64> {
	let s = s.trim();
	with_context!(("invalid number {:?}", s), {
		if s.starts_with("0x") || s.starts_with("0X") {
			Ok(u64::from_str_radix(&s[2..], 16)?)
		} else {
			Ok(s.parse::<u64>()?)
		}
	})
}

#[cfg(test)]
mod tests {
	use super::parse_number;

	#[test]
	fn parse_decimal_and_hex() {
		assert_eq!(parse_number("4096").unwrap(), 4096);
		assert_eq!(parse_number("0x1000").unwrap(), 0x1000);
		assert_eq!(parse_number("0XfF").unwrap(), 0xff);
		assert_eq!(parse_number(" 12 ").unwrap(), 12);
	}

	#[test]
	fn parse_rejects_garbage() {
		assert!(parse_number("").is_err());
		assert!(parse_number("0x").is_err());
		assert!(parse_number("12k").is_err());
	}
}
