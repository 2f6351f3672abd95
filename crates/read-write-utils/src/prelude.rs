pub use crate::read_ahead::ReadAhead;
use std::io;
use std::io::ErrorKind::{Interrupted, UnexpectedEof};
use std::io::{Read, Seek, SeekFrom};

pub trait ReadExt: Read {
  /// Calls [`Self::read`] repeatedly until `slice` is full or EOF is reached.
  /// Returns the number of bytes copied.
  ///
  /// # Errors
  /// Like [`std::io::copy`], if `read` fails due to an [`Interrupted`] error,
  /// this function will retry the operation. If `read` returns any other error
  /// kind, this function returns it immediately.
  fn copy_to_slice(&mut self, mut slice: &mut [u8]) -> io::Result<usize> {
    let mut total: usize = 0;
    while !slice.is_empty() {
      match self.read(slice) {
        Ok(0) => break,
        Ok(read_amount) => {
          total += read_amount;
          slice = &mut slice[read_amount..];
        }
        Err(e) if e.kind() == Interrupted => {}
        Err(e) => return Err(e),
      }
    }
    Ok(total)
  }

  /// Uses [`Self::copy_to_slice`] to fill and return an array.
  ///
  /// # Errors
  /// Returns [`UnexpectedEof`] if the array couldn't be filled.
  fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
    let mut arr = [0u8; N];
    if self.copy_to_slice(&mut arr[..])? < N {
      return Err(io::Error::from(UnexpectedEof));
    }
    Ok(arr)
  }
}
impl<R: Read + ?Sized> ReadExt for R {}

/// The `size` half of a file handle: total length without disturbing the
/// current read position.
pub trait StreamLen: Seek {
  fn total_len(&mut self) -> io::Result<u64> {
    let position = self.stream_position()?;
    let len = self.seek(SeekFrom::End(0))?;
    if position != len {
      self.seek(SeekFrom::Start(position))?;
    }
    Ok(len)
  }
}
impl<S: Seek + ?Sized> StreamLen for S {}
