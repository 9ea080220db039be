//! Delta reconciliation between a source and a destination record set.

mod delta_set;
mod engine;
mod fingerprint;

pub use delta_set::{DeltaSet, KeyedRecord, RecordUpdate};
pub use engine::compute_delta;
pub use fingerprint::{Fingerprint, FingerprintIndex, fingerprint};
