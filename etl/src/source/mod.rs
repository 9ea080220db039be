//! Sources records are read from.

mod base;
pub mod local_file;
pub mod memory;

pub use base::SourceReader;
