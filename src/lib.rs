//! In-place IPS and UPS patching of ROM images.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use rompatch::patch;
//! use rompatch::rom::{MAX_ROM_SIZE, Rom};
//!
//! let mut rom = Rom::load(&mut std::fs::File::open("game.gba")?, MAX_ROM_SIZE)?;
//! let report = patch::apply(&mut std::fs::File::open("game.ups")?, &mut rom)?;
//! println!("{} patch applied, ROM is now {} bytes", report.kind, report.rom_size);
//! # Ok(())
//! # }
//! ```

pub mod crc;
pub mod error;
pub mod patch;
pub mod rom;
