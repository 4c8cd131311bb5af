//! Configuration for the export side of the pipeline.

/// Configuration for [`crate::DataExporter`].
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Hosting application version, stamped into the envelope header.
    ///
    /// When `None` the processor substitutes [`crate::UNKNOWN_VERSION`].
    pub app_version: Option<String>,
    /// Size of one datastore read page.
    pub page_size: usize,
    /// When set, cookies come from the host's native cookie store instead of
    /// the document store, and their ids are caller-meaningful (no `key`
    /// remapping happens on export).
    pub native_cookies: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            app_version: None,
            page_size: 1000,
            native_cookies: false,
        }
    }
}

impl ExportConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hosting application version.
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Sets the datastore read page size.
    #[must_use]
    pub const fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Enables or disables the native cookie store mode.
    #[must_use]
    pub const fn with_native_cookies(mut self, native: bool) -> Self {
        self.native_cookies = native;
        self
    }
}
