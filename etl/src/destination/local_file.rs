use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::shared::FileType;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversions::{parse_records, render_records};
use crate::destination::Destination;
use crate::destination::base::apply_to_records;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::merge::{BatchResult, WriteBatch};
use crate::types::Record;

/// Destination backed by a JSON, JSONL or CSV file on the local filesystem.
///
/// A missing file is an empty destination. Each batch rewrites the whole file through a temporary
/// file in the same directory followed by a rename, so readers never see a half-written file.
/// Clones share a write lock, which serialises concurrent batches of one run.
#[derive(Debug, Clone)]
pub struct LocalFileDestination {
    path: PathBuf,
    file_type: FileType,
    data_key: Option<String>,
    write_lock: Arc<Mutex<()>>,
}

impl LocalFileDestination {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType, data_key: Option<String>) -> Self {
        Self {
            path: path.into(),
            file_type,
            data_key,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw file contents, `None` when the file does not exist yet.
    async fn read_text(&self) -> EtlResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => Err(etl_error!(
                ErrorKind::DestinationSchemaError,
                "Destination file is not valid UTF-8",
                format!("{}: {err}", self.path.display()),
                source: err
            )),
            Err(err) => Err(etl_error!(
                ErrorKind::DestinationUnavailable,
                "Failed to read destination file",
                format!("{}: {err}", self.path.display()),
                source: err
            )),
        }
    }

    fn parse(&self, text: Option<&str>) -> EtlResult<Vec<Record>> {
        let Some(text) = text else {
            return Ok(Vec::new());
        };

        parse_records(text, self.file_type, self.data_key.as_deref()).map_err(|err| {
            etl_error!(
                ErrorKind::DestinationSchemaError,
                "Destination file does not hold records",
                format!("{}: {err}", self.path.display()),
                source: err
            )
        })
    }

    async fn replace_contents(&self, contents: String) -> EtlResult<()> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = self
            .path
            .with_file_name(format!(".{file_name}.tmp-{}", Uuid::new_v4()));

        if let Err(err) = tokio::fs::write(&temp_path, contents).await {
            return Err(etl_error!(
                ErrorKind::DestinationUnavailable,
                "Failed to write destination file",
                format!("{}: {err}", temp_path.display()),
                source: err
            ));
        }

        if let Err(err) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(etl_error!(
                ErrorKind::DestinationUnavailable,
                "Failed to replace destination file",
                format!("{}: {err}", self.path.display()),
                source: err
            ));
        }

        Ok(())
    }
}

impl Destination for LocalFileDestination {
    fn name() -> &'static str {
        "local_file"
    }

    fn identity(&self) -> String {
        format!("file://{}", canonical_path(&self.path).display())
    }

    async fn read_existing(&self, _key_columns: &[String]) -> EtlResult<Vec<Record>> {
        let text = self.read_text().await?;
        let records = self.parse(text.as_deref())?;

        info!(
            path = %self.path.display(),
            records = records.len(),
            "read existing records"
        );

        Ok(records)
    }

    async fn write_batch(&self, batch: &WriteBatch) -> EtlResult<BatchResult> {
        let _guard = self.write_lock.lock().await;

        let text = self.read_text().await?;
        let mut records = self.parse(text.as_deref())?;

        let failed = apply_to_records(&mut records, batch, &HashSet::new());
        if failed.len() == batch.len() {
            debug!(
                operation = %batch.operation,
                rows = batch.len(),
                "every row of the batch failed, file left untouched"
            );
            return Ok(BatchResult::with_failures(failed));
        }

        let contents = render_records(
            &records,
            self.file_type,
            self.data_key.as_deref(),
            text.as_deref(),
        )
        .map_err(|err| {
            etl_error!(
                ErrorKind::SerializationError,
                "Failed to render destination file",
                format!("{}: {err}", self.path.display()),
                source: err
            )
        })?;
        self.replace_contents(contents).await?;

        info!(
            path = %self.path.display(),
            operation = %batch.operation,
            rows = batch.len(),
            failed = failed.len(),
            "wrote batch"
        );

        Ok(BatchResult::with_failures(failed))
    }
}

/// Resolves `path` to one spelling shared by every path naming the same file.
///
/// An existing file is canonicalized directly. Otherwise its parent directory is, and the file
/// name joined back. When neither resolves the absolute path is used as is.
fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    match (std::fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}
