//! Format documentation: https://www.romhacking.net/documents/392/

use super::varint::ReadNumber;
use super::{DeclaredSizes, Error, Kind, PatchReport, has_magic};
use crate::crc::Crc32;
use crate::rom::{MAX_ROM_SIZE, OPEN_BUS, Rom};
use byteorder::{LE, ReadBytesExt};
use read_write_utils::PATCH_BUF_SIZE;
use read_write_utils::prelude::*;
use std::io;
use std::io::prelude::*;

pub const MAGIC: &[u8; 4] = b"UPS1";

/// Source, target and patch CRC32s.
pub const FOOTER_LEN: usize = 3 * size_of::<u32>();

/// Applies a UPS patch to `rom` in place, reading `patch` from its current
/// position.
///
/// If the patch declares a target larger than its source, `rom` first grows to
/// the next power of two of the target size. The bytes past the source size
/// are zeroed up to the target size and set to [`OPEN_BUS`] after that.
///
/// The footer checksums aren't checked here; see [`verify`].
///
/// # Errors
/// * [`Error::NotThisFormat`] if the patch doesn't start with `UPS1`. `rom` is
///   untouched.
/// * [`Error::OutOfCapacity`] if the grown ROM would exceed [`MAX_ROM_SIZE`]
///   or `rom`'s capacity. `rom` is untouched.
/// * [`Error::Malformed`] if the patch is too short to hold a footer or ends
///   in the middle of a record.
///
/// Records applied before an error stay applied.
pub fn patch(patch: &mut (impl Read + Seek), rom: &mut Rom) -> Result<PatchReport, Error> {
  let patch_len = patch.total_len()?;
  let start = patch.stream_position()?;
  let mut patch = ReadAhead::with_known_position(PATCH_BUF_SIZE, start, patch)?;
  patch.fill()?;

  if !has_magic(&mut patch, MAGIC)? {
    return Err(Error::NotThisFormat);
  }
  log::info!("UPS patch found! Patching...");

  let end_of_records = patch_len
    .checked_sub(FOOTER_LEN as u64)
    .ok_or(Error::Malformed)?;

  let source_size: u64 = patch.read_number()?;
  let target_size: u64 = patch.read_number()?;
  log::debug!("Base size: {source_size:#X}, patched size: {target_size:#X}");

  if target_size > source_size {
    grow(rom, source_size, target_size)?;
  }

  let mut cursor: u64 = 0;
  let mut records: u64 = 0;
  while patch.position() < end_of_records {
    let relative_offset: u64 = patch.read_number()?;
    cursor = cursor
      .checked_add(relative_offset)
      .ok_or(Error::Malformed)?;
    cursor = apply_hunk(&mut patch, rom, cursor)?;
    records += 1;
  }

  log::debug!("Applied {records} UPS records.");
  Ok(PatchReport {
    kind: Kind::UPS,
    records,
    rom_size: rom.len(),
    declared_sizes: Some(DeclaredSizes {
      source: source_size,
      target: target_size,
    }),
  })
}

/// Makes room for a target that is larger than the source.
fn grow(rom: &mut Rom, source_size: u64, target_size: u64) -> Result<(), Error> {
  let new_size = match target_size.checked_next_power_of_two() {
    Some(size) if size <= MAX_ROM_SIZE as u64 && size <= rom.capacity() as u64 => size as usize,
    _ => {
      log::warn!("Patched ROM exceeds {:#X} bytes! Skipping patching...", rom.capacity());
      return Err(Error::OutOfCapacity);
    }
  };
  // Both sizes are below `new_size`, which fits in a usize.
  let (source_size, target_size) = (source_size as usize, target_size as usize);

  let extension = rom
    .region_mut(source_size, new_size - source_size)
    .ok_or(Error::OutOfCapacity)?;
  extension.fill(OPEN_BUS);
  extension[..target_size - source_size].fill(0);
  rom.grow_to(new_size);
  log::debug!("ROM grown to {:#X} bytes.", rom.len());
  Ok(())
}

/// XORs one record's bytes into `rom` starting at `cursor`. Returns the
/// position after the record's terminating NUL byte, or `rom.len()` if the
/// record reaches the end of the ROM first.
fn apply_hunk<R: Read>(
  patch: &mut ReadAhead<R>,
  rom: &mut Rom,
  mut cursor: u64,
) -> Result<u64, Error> {
  let rom_len = rom.len() as u64;
  while cursor < rom_len {
    let start = cursor as usize;
    let (data_len, is_end_of_hunk) = {
      // Running out of patch before the terminator means the patch is corrupt.
      let patch_buf: &[u8] = patch.fill_buf()?;
      if patch_buf.is_empty() {
        return Err(Error::Malformed);
      }
      let patch_buf = &patch_buf[..patch_buf.len().min((rom_len - cursor) as usize)];

      // memchr uses SIMD to find the NUL byte that terminates the record.
      let (data_len, is_end_of_hunk) = ::memchr::memchr(0, patch_buf)
        .map(|i| (i, true))
        .unwrap_or((patch_buf.len(), false));
      xor_hunk(&patch_buf[..data_len], &mut rom.as_mut_bytes()[start..start + data_len]);
      (data_len, is_end_of_hunk)
    };

    // If the delimiter was found, add 1 so it gets consumed too.
    let consumed = data_len + usize::from(is_end_of_hunk);
    patch.consume(consumed);
    cursor += consumed as u64;
    if is_end_of_hunk {
      break;
    }
  }
  Ok(cursor)
}

fn xor_hunk(patch_hunk: &[u8], rom_hunk: &mut [u8]) {
  debug_assert_eq!(patch_hunk.len(), rom_hunk.len());
  for (rom_byte, patch_byte) in rom_hunk.iter_mut().zip(patch_hunk) {
    *rom_byte ^= patch_byte;
  }
}

/// The checksums stored in the last [`FOOTER_LEN`] bytes of a UPS patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footer {
  pub source_crc32: Crc32,
  pub target_crc32: Crc32,
  /// The CRC32 of every byte of the patch before this one.
  pub patch_crc32: Crc32,
}

impl Footer {
  /// Reads the footer. Leaves `patch` at EOF.
  pub fn read(patch: &mut (impl Read + Seek)) -> Result<Self, Error> {
    let patch_len = patch.total_len()?;
    let start_of_footer = patch_len
      .checked_sub(FOOTER_LEN as u64)
      .ok_or(Error::Malformed)?;
    patch.seek(io::SeekFrom::Start(start_of_footer))?;
    Ok(Self {
      source_crc32: Crc32::new(patch.read_u32::<LE>()?),
      target_crc32: Crc32::new(patch.read_u32::<LE>()?),
      patch_crc32: Crc32::new(patch.read_u32::<LE>()?),
    })
  }
}

/// Checks a UPS patch's footer against the patch itself, the CRC32 of the ROM
/// it was applied to, and the patched ROM truncated to the declared target
/// size.
///
/// # Errors
/// [`Error::Malformed`] if the patch's own checksum doesn't match, and
/// [`Error::WrongInputFile`] if either ROM checksum doesn't.
pub fn verify(
  patch: &mut (impl Read + Seek),
  source_crc32: Crc32,
  target: &[u8],
) -> Result<Footer, Error> {
  let footer = Footer::read(patch)?;
  let hashed_len = patch.total_len()? - size_of::<u32>() as u64;
  patch.rewind()?;
  let patch_crc32 = Crc32::read_and_hash(&mut patch.by_ref().take(hashed_len))?;

  if patch_crc32 != footer.patch_crc32 {
    log::error!("Patch CRC32 is {patch_crc32}, expected {}.", footer.patch_crc32);
    return Err(Error::Malformed);
  }
  if source_crc32 != footer.source_crc32 {
    log::error!("Source CRC32 is {source_crc32}, expected {}.", footer.source_crc32);
    return Err(Error::WrongInputFile);
  }
  let target_crc32 = Crc32::of(target);
  if target_crc32 != footer.target_crc32 {
    // A matching source with a mismatched target is more likely a source
    // checksum collision than a corrupt patch that passed every other check.
    log::error!("Target CRC32 is {target_crc32}, expected {}.", footer.target_crc32);
    return Err(Error::WrongInputFile);
  }
  Ok(footer)
}
