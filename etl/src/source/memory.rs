use std::sync::Arc;

use tracing::info;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::source::SourceReader;
use crate::types::Record;

/// Source serving a fixed list of records.
#[derive(Debug, Clone)]
pub struct MemorySource {
    records: Arc<[Record]>,
    failure: Option<ErrorKind>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
            failure: None,
        }
    }

    /// Creates a source whose every fetch fails with `kind`.
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            records: Arc::from(Vec::<Record>::new()),
            failure: Some(kind),
        }
    }
}

impl SourceReader for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn fetch(&self) -> EtlResult<Vec<Record>> {
        if let Some(kind) = self.failure {
            return Err(etl_error!(kind, "Scripted source failure"));
        }

        info!(records = self.records.len(), "fetched source records");

        Ok(self.records.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_its_records_on_every_fetch() {
        let source = MemorySource::new(vec![Record::from_pairs([("id", 1)])]);

        assert_eq!(source.fetch().await.unwrap().len(), 1);
        assert_eq!(source.fetch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_source_reports_its_kind() {
        let source = MemorySource::failing(ErrorKind::SourceUnavailable);
        let err = source.fetch().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }
}
