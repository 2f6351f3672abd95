/// Exports all traits and [`ReadAhead`](read_ahead::ReadAhead).
pub mod prelude;

pub mod read_ahead;

/// The read-ahead window used when streaming patch files.
pub const PATCH_BUF_SIZE: usize = 512;
