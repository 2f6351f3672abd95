//! The in-memory ROM image that patches are applied to.

use crate::error::prelude::*;
use read_write_utils::prelude::*;
use std::io;
use std::io::Read;

/// The largest image a GBA cartridge bus can address.
pub const MAX_ROM_SIZE: usize = 32 * 1024 * 1024;

/// The value of bytes in the buffer that were never loaded or patched,
/// matching what an empty cartridge slot reads as.
pub const OPEN_BUS: u8 = 0xFF;

/// A byte buffer with a fixed capacity and a logical size.
///
/// The whole capacity is addressable by the patch engines, but only the first
/// [`len`](Self::len) bytes make up the image. Only UPS growth changes the
/// logical size, and it never shrinks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rom {
  buf: Box<[u8]>,
  len: usize,
}

impl Rom {
  /// Allocates an empty image.
  ///
  /// # Errors
  /// [`Error::TooLarge`] if `capacity > MAX_ROM_SIZE`, or an
  /// [`OutOfMemory`](io::ErrorKind::OutOfMemory) I/O error.
  pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
    if capacity > MAX_ROM_SIZE {
      return Err(Error::TooLarge);
    }
    let mut buf: Vec<u8> = Vec::new();
    buf
      .try_reserve_exact(capacity)
      .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
    buf.resize(capacity, OPEN_BUS);
    Ok(Self { buf: buf.into_boxed_slice(), len: 0 })
  }

  pub fn from_bytes(bytes: &[u8], capacity: usize) -> Result<Self, Error> {
    let mut rom = Self::with_capacity(capacity)?;
    rom
      .buf
      .get_mut(..bytes.len())
      .ok_or(Error::TooLarge)?
      .copy_from_slice(bytes);
    rom.len = bytes.len();
    Ok(rom)
  }

  /// Reads an image from `reader` until EOF.
  ///
  /// # Errors
  /// [`Error::TooLarge`] if `reader` has more than `capacity` bytes.
  pub fn load(reader: &mut impl Read, capacity: usize) -> Result<Self, Error> {
    let mut rom = Self::with_capacity(capacity)?;
    rom.len = reader.copy_to_slice(&mut rom.buf[..])?;
    if rom.len == capacity && reader.read(&mut [0u8])? != 0 {
      return Err(Error::TooLarge);
    }
    Ok(rom)
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn capacity(&self) -> usize {
    self.buf.len()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.buf[..self.len]
  }

  pub fn as_mut_bytes(&mut self) -> &mut [u8] {
    &mut self.buf[..self.len]
  }

  /// A window of `len` bytes at `offset`, which may extend past
  /// [`Self::len`] but not past [`Self::capacity`].
  pub fn region_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
    let end = offset.checked_add(len)?;
    self.buf.get_mut(offset..end)
  }

  /// Raises the logical size to `len`. Smaller values are ignored.
  pub(crate) fn grow_to(&mut self, len: usize) {
    debug_assert!(len <= self.capacity());
    self.len = self.len.max(len);
  }
}

#[non_exhaustive]
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
  #[error("The ROM doesn't fit in {} MiB.", MAX_ROM_SIZE / 1024 / 1024)]
  TooLarge,
  #[error(transparent)]
  IO(#[from] io::Error),
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn load_pads_with_open_bus() {
    let mut rom = Rom::load(&mut Cursor::new(vec![1u8, 2, 3]), 8).unwrap();
    assert_eq!(rom.len(), 3);
    assert_eq!(rom.as_bytes(), &[1, 2, 3]);
    assert_eq!(rom.region_mut(3, 5).unwrap(), &[OPEN_BUS; 5]);
  }

  #[test]
  fn load_accepts_exact_fit() {
    let rom = Rom::load(&mut Cursor::new(vec![7u8; 16]), 16).unwrap();
    assert_eq!(rom.len(), 16);
  }

  #[test]
  fn load_rejects_oversized_image() {
    let err = Rom::load(&mut Cursor::new(vec![7u8; 17]), 16).unwrap_err();
    assert!(matches!(err, Error::TooLarge));
  }

  #[test]
  fn capacity_is_capped() {
    assert!(matches!(Rom::with_capacity(MAX_ROM_SIZE + 1), Err(Error::TooLarge)));
  }

  #[test]
  fn region_is_bounded_by_capacity() {
    let mut rom = Rom::from_bytes(&[0u8; 4], 8).unwrap();
    assert!(rom.region_mut(4, 4).is_some());
    assert!(rom.region_mut(5, 4).is_none());
    assert!(rom.region_mut(usize::MAX, 2).is_none());
  }

  #[test]
  fn grow_never_shrinks() {
    let mut rom = Rom::from_bytes(&[0u8; 6], 8).unwrap();
    rom.grow_to(4);
    assert_eq!(rom.len(), 6);
    rom.grow_to(8);
    assert_eq!(rom.len(), 8);
  }
}
