use byteorder::{ReadBytesExt, WriteBytesExt};
use checked::Checked;
use std::io;
use std::io::prelude::*;

pub trait ReadNumber: Read {
  /// Reads a UPS variable-length integer.
  ///
  /// Each octet carries 7 bits, least significant group first. The last
  /// octet of a number is the one with its high bit set. Every other octet
  /// was decremented by the encoder, so it is added back with the high bit
  /// forced on.
  ///
  /// # Errors
  /// If the value overflows, this function returns an
  /// [InvalidData](io::ErrorKind::InvalidData) error. Read errors are
  /// returned as is.
  fn read_number(&mut self) -> io::Result<u64> {
    let mut value: u64 = 0;
    // `shift` holds `1 << (7 * n)`. Multiplication checks for overflow.
    let mut shift = Checked::<u64>::new(1);
    loop {
      let octet = self.read_u8()?;
      if is_msb_set(octet) {
        return (u64::from(octet & 0x7F) * shift + value).ok_or_else(overflow_err);
      }
      value = (u64::from(octet | 0x80) * shift + value).ok_or_else(overflow_err)?;
      shift = shift * 128;
    }
  }
}

impl<R> ReadNumber for R where R: Read + ?Sized {}

pub trait WriteNumber: Write {
  /// Writes `value` in the encoding understood by [`ReadNumber::read_number`].
  fn write_number(&mut self, mut value: u64) -> io::Result<()> {
    loop {
      let octet = (value & 0x7F) as u8;
      value >>= 7;
      if value == 0 {
        return self.write_u8(octet | 0x80);
      }
      self.write_u8(octet)?;
      value -= 1;
    }
  }
}

impl<W> WriteNumber for W where W: Write + ?Sized {}

pub fn overflow_err() -> io::Error {
  io::Error::from(io::ErrorKind::InvalidData)
}

fn is_msb_set(byte: u8) -> bool {
  byte & 0x80 == 0x80
}
