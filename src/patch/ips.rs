//! Documentation: https://zerosoft.zophar.net/ips.php

use super::{Error, Kind, PatchReport, has_magic};
use crate::rom::Rom;
use byteorder::{BE, BigEndian, ByteOrder, ReadBytesExt};
use read_write_utils::PATCH_BUF_SIZE;
use read_write_utils::prelude::*;
use std::io::prelude::*;
use std::num;

pub const MAGIC: &[u8; 5] = b"PATCH";

/// Takes the place of a hunk offset at the end of the patch.
const EOF_MARKER: &[u8; 3] = b"EOF";

/// Applies an IPS patch to `rom` in place, reading `patch` from its current
/// position.
///
/// IPS has no notion of the target size, so `rom`'s logical size never
/// changes. Hunks may land past it as long as they fit in its capacity.
///
/// # Errors
/// * [`Error::NotThisFormat`] if the patch doesn't start with `PATCH`. `rom`
///   is untouched.
/// * [`Error::Malformed`] if the patch ends in the middle of a hunk or before
///   the `EOF` marker.
/// * [`Error::OutOfCapacity`] if a hunk doesn't fit in `rom`'s buffer.
///
/// Hunks applied before an error stay applied.
pub fn patch(patch: &mut impl Read, rom: &mut Rom) -> Result<PatchReport, Error> {
  let mut patch = ReadAhead::with_capacity(PATCH_BUF_SIZE, patch)?;
  patch.fill()?;

  if !has_magic(&mut patch, MAGIC)? {
    return Err(Error::NotThisFormat);
  }
  log::info!("IPS patch found! Patching...");

  let mut hunks: u64 = 0;
  loop {
    let offset = ReadExt::read_array::<3>(&mut patch)?;
    if &offset == EOF_MARKER {
      break;
    }
    let offset = BigEndian::read_u24(&offset[..]) as usize;

    match num::NonZeroU16::new(patch.read_u16::<BE>()?) {
      Some(hunk_size) => {
        // The patch contains the bytes to write verbatim.
        let hunk = hunk_region(rom, offset, hunk_size.get())?;
        patch.read_exact(hunk)?;
      }
      None => {
        // The patch contains a 1 byte repeating sequence.
        let run_len = patch.read_u16::<BE>()?;
        let value = patch.read_u8()?;
        hunk_region(rom, offset, run_len)?.fill(value);
      }
    }
    hunks += 1;
  }

  log::debug!("Applied {hunks} IPS hunks.");
  Ok(PatchReport {
    kind: Kind::IPS,
    records: hunks,
    rom_size: rom.len(),
    declared_sizes: None,
  })
}

fn hunk_region(rom: &mut Rom, offset: usize, len: u16) -> Result<&mut [u8], Error> {
  let len = usize::from(len);
  if offset + len > rom.len() {
    log::warn!(
      "IPS hunk at {offset:#08X} writes past the end of the {:#X} byte ROM.",
      rom.len()
    );
  }
  rom.region_mut(offset, len).ok_or(Error::OutOfCapacity)
}
