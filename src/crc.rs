use std::fmt;
use std::io;
use std::io::prelude::*;

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Crc32(u32);

impl Crc32 {
  pub fn new(value: u32) -> Self {
    Self(value)
  }

  pub fn value(&self) -> u32 {
    self.0
  }

  pub fn of(bytes: &[u8]) -> Self {
    Self(crc32fast::hash(bytes))
  }

  /// Hashes everything `reader` yields until EOF.
  pub fn read_and_hash(reader: &mut impl Read) -> io::Result<Self> {
    let mut hasher = CRC32Hasher::new();
    io::copy(reader, &mut hasher)?;
    Ok(hasher.crc32())
  }
}

impl fmt::Display for Crc32 {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:08X}", self.0)
  }
}

/// [`crc32fast::Hasher`] as a [`Write`] sink, so it can be fed by [`io::copy`].
#[derive(Clone, Default)]
pub struct CRC32Hasher(crc32fast::Hasher);

impl CRC32Hasher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn crc32(&self) -> Crc32 {
    Crc32(self.0.clone().finalize())
  }
}

impl Write for CRC32Hasher {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.update(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
