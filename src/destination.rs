//! Destination writers: where serialized export payloads end up.
//!
//! Writers are registered by name on the exporter; an export naming an
//! unregistered destination fails with [`crate::Error::UnknownDestination`].
//! A filesystem writer ships in-crate; cloud-drive writers are provided by
//! the host.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{DEFAULT_CONTENT_TYPE, Error, Result};

/// Options passed through to the destination writer.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Content type of the payload. Defaults to
    /// [`crate::DEFAULT_CONTENT_TYPE`] when unset.
    pub content_type: Option<String>,
    /// Provider-specific parent (e.g. a drive folder id).
    pub parent: Option<String>,
}

impl ProviderOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the effective content type.
    #[must_use]
    pub fn effective_content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Result of a destination write.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// The destination name the payload was written to.
    pub destination: String,
    /// The file name used.
    pub file: String,
    /// Provider-assigned identity of the written object, when it has one
    /// (a filesystem path, a drive file id).
    pub handle: Option<String>,
    /// Payload size in bytes.
    pub bytes_written: usize,
}

/// A writer for one named destination.
#[async_trait]
pub trait DestinationWriter: Send + Sync {
    /// Saves the payload under the given file name.
    async fn save(&self, content: &str, file: &str, options: &ProviderOptions)
    -> Result<WriteResult>;
}

/// Writes export payloads into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSystemWriter {
    root: PathBuf,
}

impl FileSystemWriter {
    /// Creates a writer rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DestinationWriter for FileSystemWriter {
    async fn save(
        &self,
        content: &str,
        file: &str,
        _options: &ProviderOptions,
    ) -> Result<WriteResult> {
        if file.is_empty() {
            return Err(Error::InvalidInput("file name is empty".to_string()));
        }
        let path = self.root.join(file);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "write_export_file".to_string(),
                cause: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote export file");
        Ok(WriteResult {
            destination: "file".to_string(),
            file: file.to_string(),
            handle: Some(path.display().to_string()),
            bytes_written: content.len(),
        })
    }
}
