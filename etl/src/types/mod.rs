mod cell;
mod key;
mod record;
mod record_set;

pub use cell::Cell;
pub use key::RecordKey;
pub use record::Record;
pub use record_set::RecordSet;
