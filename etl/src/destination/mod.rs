//! Destinations records are reconciled into.
//!
//! The [`Destination`] trait is the only write path of a run. Implementations hold their own
//! connection descriptor and are selected from configuration by the caller.

pub(crate) mod base;
pub mod local_file;
pub mod memory;

pub use base::Destination;
