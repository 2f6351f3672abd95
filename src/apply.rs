use fs_err as fs;
use miette::Diagnostic;
use rompatch::crc::Crc32;
use rompatch::patch::{self, Kind, PatchReport, Patcher};
use rompatch::rom::{self, MAX_ROM_SIZE, Rom};
use std::io::prelude::*;
use std::{ffi, io, path};
use thiserror::Error;
use ulid::Ulid;

#[derive(Clone, Debug, clap::Args)]
pub struct Args {
  #[arg(short, long)]
  pub rom: path::PathBuf,
  #[arg(short, long)]
  pub patch: path::PathBuf,
  /// Where to write the patched ROM. Defaults to "<rom> (patched).<ext>"
  /// next to the ROM.
  #[arg(short, long)]
  pub output: Option<path::PathBuf>,
  /// Only try this patch format instead of detecting it.
  #[arg(short, long, value_enum)]
  pub format: Option<Kind>,
  /// Check the UPS footer checksums after patching.
  #[arg(long)]
  pub verify: bool,
  /// Write the ROM even if patching failed partway through.
  #[arg(long)]
  pub force: bool,
}

impl Args {
  pub fn call(self) -> Result<(), Error> {
    let mut rom = Rom::load(&mut fs::File::open(&self.rom)?, MAX_ROM_SIZE)?;
    let source_crc32 = Crc32::of(rom.as_bytes());
    log::debug!("Loaded {:#X} byte ROM, CRC32 {source_crc32}.", rom.len());

    let mut patch_file = fs::File::open(&self.patch)?;
    let result = match self.format {
      Some(kind) => Patcher::from_patch_kind(kind).patch(&mut patch_file, &mut rom),
      None => patch::apply(&mut patch_file, &mut rom),
    };

    match result {
      Ok(report) => {
        log::info!(
          "{} patch applied: {} records, {:#X} byte ROM.",
          report.kind,
          report.records,
          report.rom_size
        );
        if self.verify {
          verify(&mut patch_file, source_crc32, &rom, &report)?;
        }
      }
      Err(patch::Error::NotThisFormat) => {
        log::warn!("Patch is not valid! Skipping...");
        return Err(Error::NoPatchFound);
      }
      Err(err) if self.force && err.is_fatal() => {
        log::warn!("An error occurred while patching: {err}");
        log::warn!("Writing the partially patched ROM anyway.");
      }
      Err(err) => return Err(err.into()),
    }
    log::debug!("Patched ROM CRC32 {}.", Crc32::of(rom.as_bytes()));

    let output = self.output.unwrap_or_else(|| patched_file_name(&self.rom));
    write_atomically(&output, rom.as_bytes())?;
    log::info!("Wrote \"{}\".", output.display());
    Ok(())
  }
}

fn verify(
  patch_file: &mut fs::File,
  source_crc32: Crc32,
  rom: &Rom,
  report: &PatchReport,
) -> Result<(), Error> {
  let Some(sizes) = report.declared_sizes else {
    log::warn!("{} patches have no checksums to verify.", report.kind);
    return Ok(());
  };
  let target = usize::try_from(sizes.target)
    .ok()
    .and_then(|target_size| rom.as_bytes().get(..target_size))
    .ok_or(patch::Error::WrongInputFile)?;
  let footer = patch::ups::verify(patch_file, source_crc32, target)?;
  log::info!("Checksums match: result CRC32 {}.", footer.target_crc32);
  Ok(())
}

/// "<stem> (patched).<ext>" in the same directory as `rom`.
fn patched_file_name(rom: &path::Path) -> path::PathBuf {
  let mut file_name = ffi::OsString::from(rom.file_stem().unwrap_or(rom.as_os_str()));
  file_name.push(" (patched)");
  if let Some(ext) = rom.extension() {
    file_name.push(".");
    file_name.push(ext);
  }
  rom.with_file_name(file_name)
}

/// Writes `bytes` to a temporary file next to `path`, then renames it over
/// `path`.
fn write_atomically(path: &path::Path, bytes: &[u8]) -> io::Result<()> {
  let temp_path = path.with_file_name({
    let mut file_name = Ulid::new().to_string();
    file_name.push_str(".tmp");
    file_name
  });
  let mut temp_file: fs::File = fs::OpenOptions::new()
    .create_new(true)
    .write(true)
    .open(&temp_path)?;
  let result = temp_file.write_all(bytes).and_then(|_| temp_file.flush());
  drop(temp_file); // close the file prior to renaming
  if let Err(e) = result {
    let _ = fs::remove_file(&temp_path);
    return Err(e);
  }
  fs::rename(&temp_path, path)
}

#[non_exhaustive]
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
  #[error(transparent)]
  #[diagnostic(transparent)]
  Rom(#[from] rom::Error),
  #[error(transparent)]
  IO(#[from] io::Error),
  #[error("No valid patch found.")]
  #[diagnostic(help("The ROM was left unpatched."))]
  NoPatchFound,
  #[error(transparent)]
  #[diagnostic(transparent)]
  Patching(#[from] patch::Error),
}

impl Error {
  pub fn get_kind(&self) -> ErrorKind {
    use ErrorKind as K;
    match &self {
      Error::Rom(rom::Error::TooLarge) => K::Capacity,
      Error::Rom(_) => K::IOError,
      Error::IO(_) => K::IOError,
      Error::NoPatchFound => K::NoPatchFound,
      Error::Patching(e) => match e {
        patch::Error::OutOfCapacity => K::Capacity,
        patch::Error::WrongInputFile => K::WrongInputFile,
        patch::Error::IO(_) | patch::Error::OutOfMemory => K::IOError,
        _ => K::Corrupt,
      },
    }
  }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  IOError,
  NoPatchFound,
  Corrupt,
  Capacity,
  WrongInputFile,
}

#[cfg(test)]
mod tests {
  use super::*;
  use byteorder::{LE, WriteBytesExt};
  use rompatch::patch::ups;
  use rompatch::patch::varint::WriteNumber;

  fn args(dir: &path::Path, rom: &[u8], patch: &[u8]) -> Args {
    let rom_path = dir.join("rom.gba");
    fs::write(&rom_path, rom).unwrap();
    let patch_path = dir.join("hack.patch");
    fs::write(&patch_path, patch).unwrap();
    Args {
      rom: rom_path,
      patch: patch_path,
      output: None,
      format: None,
      verify: false,
      force: false,
    }
  }

  /// A UPS patch growing `source` to 5 bytes and flipping the first bit.
  fn growing_ups(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut bytes = ups::MAGIC.to_vec();
    bytes.write_number(source.len() as u64).unwrap();
    bytes.write_number(5).unwrap();
    bytes.write_number(0).unwrap();
    bytes.extend_from_slice(&[0x01, 0x00]);
    bytes.write_u32::<LE>(Crc32::of(source).value()).unwrap();
    bytes.write_u32::<LE>(Crc32::of(target).value()).unwrap();
    let patch_crc32 = Crc32::of(&bytes);
    bytes.write_u32::<LE>(patch_crc32.value()).unwrap();
    bytes
  }

  // The first hunk is complete, the EOF marker is missing.
  const TRUNCATED_IPS: &[u8] = b"PATCH\x00\x00\x00\x00\x04TEST";

  #[test]
  fn corrupt_patch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let args = args(dir.path(), &[0u8; 8], TRUNCATED_IPS);
    let output = dir.path().join("rom (patched).gba");
    let err = args.call().unwrap_err();
    assert!(matches!(err, Error::Patching(patch::Error::Malformed)));
    assert_eq!(err.get_kind(), ErrorKind::Corrupt);
    assert!(!output.exists());
  }

  #[test]
  fn force_writes_partially_patched_rom() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = args(dir.path(), &[0u8; 8], TRUNCATED_IPS);
    args.force = true;
    args.call().unwrap();
    let written = fs::read(dir.path().join("rom (patched).gba")).unwrap();
    assert_eq!(written, b"TEST\0\0\0\0");
  }

  #[test]
  fn unrecognized_patch_is_no_patch_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = args(dir.path(), b"GAME", b"BPS1 is not supported");
    args.force = true;
    let err = args.call().unwrap_err();
    assert_eq!(err.get_kind(), ErrorKind::NoPatchFound);
    assert!(!dir.path().join("rom (patched).gba").exists());
  }

  #[test]
  fn verify_checks_target_before_padding() {
    let dir = tempfile::tempdir().unwrap();
    let source = [1u8, 2, 3, 4];
    let patch = growing_ups(&source, &[0, 2, 3, 4, 0]);
    let mut args = args(dir.path(), &source, &patch);
    args.output = Some(dir.path().join("out.gba"));
    args.verify = true;
    args.call().unwrap();
    let written = fs::read(dir.path().join("out.gba")).unwrap();
    assert_eq!(written, &[0, 2, 3, 4, 0, 0xFF, 0xFF, 0xFF]);
  }

  #[test]
  fn verify_rejects_other_rom() {
    let dir = tempfile::tempdir().unwrap();
    let patch = growing_ups(&[1, 2, 3, 4], &[0, 2, 3, 4, 0]);
    let mut args = args(dir.path(), &[9, 9, 9, 9], &patch);
    args.verify = true;
    let err = args.call().unwrap_err();
    assert_eq!(err.get_kind(), ErrorKind::WrongInputFile);
    assert!(!dir.path().join("rom (patched).gba").exists());
  }

  #[test]
  fn missing_rom_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = args(dir.path(), b"GAME", TRUNCATED_IPS);
    args.rom = dir.path().join("missing.gba");
    assert_eq!(args.call().unwrap_err().get_kind(), ErrorKind::IOError);
  }

  #[test]
  fn error_kinds() {
    assert_eq!(Error::NoPatchFound.get_kind(), ErrorKind::NoPatchFound);
    assert_eq!(
      Error::from(patch::Error::Malformed).get_kind(),
      ErrorKind::Corrupt
    );
    assert_eq!(
      Error::from(patch::Error::OutOfCapacity).get_kind(),
      ErrorKind::Capacity
    );
    assert_eq!(Error::from(rom::Error::TooLarge).get_kind(), ErrorKind::Capacity);
    assert_eq!(
      Error::from(patch::Error::WrongInputFile).get_kind(),
      ErrorKind::WrongInputFile
    );
    assert_eq!(
      Error::from(patch::Error::OutOfMemory).get_kind(),
      ErrorKind::IOError
    );
  }

  #[test]
  fn patched_name_keeps_extension() {
    let name = patched_file_name(path::Path::new("roms/Metroid Fusion.gba"));
    assert_eq!(name, path::Path::new("roms/Metroid Fusion (patched).gba"));
  }

  #[test]
  fn patched_name_without_extension() {
    let name = patched_file_name(path::Path::new("game"));
    assert_eq!(name, path::Path::new("game (patched)"));
  }
}
