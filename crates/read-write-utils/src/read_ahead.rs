use crate::prelude::ReadExt;
use std::io;
use std::io::ErrorKind::{OutOfMemory, UnexpectedEof};
use std::io::{BufRead, Read};

/// A forward-only reader with a fixed-capacity read-ahead window.
///
/// Unlike [`BufReader`](std::io::BufReader), the capacity is allocated
/// fallibly, the window can be loaded explicitly with [`fill`](Self::fill),
/// and the logical [`position`](Self::position) counts the bytes handed out
/// rather than the bytes pulled from the inner reader. The latter runs ahead
/// by up to one window.
///
/// There is no way to seek backwards. Callers that need to restart seek the
/// underlying stream and create a new `ReadAhead`.
pub struct ReadAhead<R> {
  inner: R,
  buf: Box<[u8]>,
  window: usize,
  cursor: usize,
  position: u64,
}

impl<R> ReadAhead<R> {
  /// Equivalent to [`ReadAhead::with_known_position(capacity, 0, inner)`][1].
  ///
  /// [1]: Self::with_known_position
  pub fn with_capacity(capacity: usize, inner: R) -> io::Result<Self> {
    Self::with_known_position(capacity, 0, inner)
  }

  /// Creates an empty reader. It's the caller's responsibility to ensure
  /// `position` matches `inner`'s seek position.
  ///
  /// # Errors
  /// Returns [`OutOfMemory`] if the window can't be allocated.
  pub fn with_known_position(capacity: usize, position: u64, inner: R) -> io::Result<Self> {
    let mut buf: Vec<u8> = Vec::new();
    buf
      .try_reserve_exact(capacity)
      .map_err(|_| io::Error::from(OutOfMemory))?;
    buf.resize(capacity, 0);
    Ok(Self {
      inner,
      buf: buf.into_boxed_slice(),
      window: 0,
      cursor: 0,
      position,
    })
  }

  /// The offset of the next unread byte in the underlying stream.
  pub fn position(&self) -> u64 {
    self.position
  }

  pub fn capacity(&self) -> usize {
    self.buf.len()
  }

  /// The bytes loaded but not yet consumed.
  pub fn buffer(&self) -> &[u8] {
    &self.buf[self.cursor..self.window]
  }

  pub fn get_ref(&self) -> &R {
    &self.inner
  }

  /// Unwraps this `ReadAhead`, discarding any unread bytes in the window.
  pub fn into_inner(self) -> R {
    self.inner
  }
}

impl<R: Read> ReadAhead<R> {
  /// Replaces the window with up to [`capacity`](Self::capacity) bytes from
  /// the inner reader. Any unread bytes in the window are dropped.
  ///
  /// After this call the window holds `min(capacity, remaining)` bytes, so an
  /// empty window means the inner reader is exhausted.
  pub fn fill(&mut self) -> io::Result<()> {
    self.window = 0;
    self.cursor = 0;
    self.window = self.inner.copy_to_slice(&mut self.buf[..])?;
    Ok(())
  }

  /// Returns the next byte, refilling the window if it has been used up.
  ///
  /// # Errors
  /// Returns [`UnexpectedEof`] if the inner reader has no more bytes, or any
  /// error raised by the inner reader while refilling.
  pub fn read_byte(&mut self) -> io::Result<u8> {
    let byte = match self.fill_buf()?.first() {
      Some(&byte) => byte,
      None => return Err(io::Error::from(UnexpectedEof)),
    };
    self.consume(1);
    Ok(byte)
  }
}

impl<R: Read> Read for ReadAhead<R> {
  fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
    if out.is_empty() {
      return Ok(0);
    }
    let available = self.fill_buf()?;
    let amt = available.len().min(out.len());
    out[..amt].copy_from_slice(&available[..amt]);
    self.consume(amt);
    Ok(amt)
  }
}

impl<R: Read> BufRead for ReadAhead<R> {
  fn fill_buf(&mut self) -> io::Result<&[u8]> {
    if self.cursor == self.window {
      self.fill()?;
    }
    Ok(self.buffer())
  }

  fn consume(&mut self, amt: usize) {
    let amt = amt.min(self.window - self.cursor);
    self.cursor += amt;
    self.position += amt as u64;
  }
}
