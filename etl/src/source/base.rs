use std::future::Future;

use crate::error::EtlResult;
use crate::types::Record;

/// A system producing the current records of a run.
///
/// Implementations hold their own connection descriptor. A fetch either returns every record or
/// fails with [`crate::error::ErrorKind::SourceUnavailable`] or
/// [`crate::error::ErrorKind::SourceSchemaError`], never a partial set.
pub trait SourceReader {
    /// Returns the name of the source kind.
    fn name() -> &'static str;

    /// Fetches every current source record.
    fn fetch(&self) -> impl Future<Output = EtlResult<Vec<Record>>> + Send;
}
