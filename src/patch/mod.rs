use crate::rom::Rom;
use read_write_utils::prelude::*;
use std::fmt;
use std::io;
use std::io::{Read, Seek};

pub mod ips;
pub mod ups;
pub mod varint;

pub use self::err::*;

/// The outcome of a successfully applied patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchReport {
  pub kind: Kind,
  /// The number of hunks or records applied.
  pub records: u64,
  /// The ROM's logical size after patching.
  pub rom_size: usize,
  /// The sizes recorded in the patch header, for formats that have them.
  pub declared_sizes: Option<DeclaredSizes>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeclaredSizes {
  pub source: u64,
  pub target: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Kind {
  IPS,
  UPS,
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Kind::IPS => write!(f, "IPS"),
      Kind::UPS => write!(f, "UPS"),
    }
  }
}

#[derive(Clone, Copy, Debug)]
pub struct Patcher(Kind);

impl Patcher {
  /// The order in which [`apply`] tries each format.
  pub const PRIORITY: [Patcher; 2] = [Patcher(Kind::IPS), Patcher(Kind::UPS)];

  pub fn from_patch_kind(patch_kind: Kind) -> Self {
    Self(patch_kind)
  }

  pub fn kind(&self) -> Kind {
    self.0
  }

  /// Rewinds `patch` and applies it to `rom` as this patcher's format.
  pub fn patch<P>(&self, patch: &mut P, rom: &mut Rom) -> Result<PatchReport, Error>
  where
    P: Read + Seek,
  {
    patch.rewind()?;
    match self.0 {
      Kind::IPS => ips::patch(patch, rom),
      Kind::UPS => ups::patch(patch, rom),
    }
  }
}

/// Applies `patch` to `rom` in place with the first format in
/// [`Patcher::PRIORITY`] that recognizes it.
///
/// Only [`Error::NotThisFormat`] moves on to the next format. Any other error
/// is returned immediately, and `rom` may have been partially patched.
pub fn apply<P>(patch: &mut P, rom: &mut Rom) -> Result<PatchReport, Error>
where
  P: Read + Seek,
{
  for patcher in Patcher::PRIORITY {
    match patcher.patch(patch, rom) {
      Err(Error::NotThisFormat) => log::debug!("Not a {} patch.", patcher.kind()),
      result => return result,
    }
  }
  Err(Error::NotThisFormat)
}

/// Consumes `magic.len()` bytes and compares them with `magic`. A stream that
/// ends early doesn't match.
fn has_magic(patch: &mut impl Read, magic: &[u8]) -> io::Result<bool> {
  let mut buf = [0u8; 8];
  let buf = &mut buf[..magic.len()];
  let read = patch.copy_to_slice(buf)?;
  Ok(read == magic.len() && buf == magic)
}

mod err {
  use crate::error::prelude::*;
  use crate::rom::MAX_ROM_SIZE;
  use std::io;

  #[non_exhaustive]
  #[derive(Debug, Error, Diagnostic)]
  pub enum Error {
    #[error("The file isn't a patch of this format.")]
    NotThisFormat,
    #[error("The patch file is corrupt.")]
    #[diagnostic(help("The ROM may have been partially patched. Continuing is NOT recommended."))]
    Malformed,
    #[error("The patched ROM would be larger than {} MiB.", MAX_ROM_SIZE / 1024 / 1024)]
    OutOfCapacity,
    #[error("Not enough memory to apply the patch.")]
    OutOfMemory,
    #[error("The patch is not intended for the input file.")]
    WrongInputFile,
    #[error(transparent)]
    #[diagnostic(help("The ROM may have been partially patched. Continuing is NOT recommended."))]
    IO(io::Error),
  }

  impl Error {
    /// Whether the ROM may have been modified before the error occurred.
    pub fn is_fatal(&self) -> bool {
      !matches!(self, Error::NotThisFormat | Error::OutOfMemory)
    }
  }

  impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
      use io::ErrorKind::*;
      // These errors arise from violated expectations.
      match err.kind() {
        InvalidData => Error::Malformed,
        UnexpectedEof => Error::Malformed,
        OutOfMemory => Error::OutOfMemory,
        _ => Error::IO(err),
      }
    }
  }
}
