//! Export selection: which data kinds to export and where their records
//! come from.

use std::collections::BTreeMap;

use crate::models::Record;

/// Exportable data kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataKind {
    /// Saved requests.
    Saved,
    /// History requests.
    History,
    /// Projects.
    Projects,
    /// Websocket URL history.
    Websocket,
    /// URL history.
    UrlHistory,
    /// Environment variables.
    Variables,
    /// Cached authorization data.
    AuthData,
    /// Cookies.
    Cookies,
    /// Host rules.
    HostRules,
    /// Client certificates.
    ClientCertificates,
}

impl DataKind {
    /// Returns every kind, in gathering order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Saved,
            Self::History,
            Self::Projects,
            Self::Websocket,
            Self::UrlHistory,
            Self::Variables,
            Self::AuthData,
            Self::Cookies,
            Self::HostRules,
            Self::ClientCertificates,
        ]
    }

    /// Maps the kind to the datastore collection it lives in.
    #[must_use]
    pub const fn collection_name(self) -> &'static str {
        match self {
            Self::Saved => crate::store::collections::SAVED_REQUESTS,
            Self::History => crate::store::collections::HISTORY_REQUESTS,
            Self::Projects => crate::store::collections::LEGACY_PROJECTS,
            Self::Websocket => crate::store::collections::WEBSOCKET_URL_HISTORY,
            Self::UrlHistory => crate::store::collections::URL_HISTORY,
            Self::Variables => crate::store::collections::VARIABLES,
            Self::AuthData => crate::store::collections::AUTH_DATA,
            Self::Cookies => crate::store::collections::COOKIES,
            Self::HostRules => crate::store::collections::HOST_RULES,
            Self::ClientCertificates => crate::store::collections::CLIENT_CERTIFICATES,
        }
    }

    /// Returns the selection key name used by callers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::History => "history",
            Self::Projects => "projects",
            Self::Websocket => "websocket",
            Self::UrlHistory => "url-history",
            Self::Variables => "variables",
            Self::AuthData => "auth",
            Self::Cookies => "cookies",
            Self::HostRules => "host-rules",
            Self::ClientCertificates => "client-certificates",
        }
    }

    /// Parses a selection key name.
    ///
    /// Returns `None` if the name is not recognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "saved" | "requests" => Some(Self::Saved),
            "history" => Some(Self::History),
            "projects" => Some(Self::Projects),
            "websocket" | "websocket-url-history" => Some(Self::Websocket),
            "url-history" => Some(Self::UrlHistory),
            "variables" => Some(Self::Variables),
            "auth" | "auth-data" => Some(Self::AuthData),
            "cookies" => Some(Self::Cookies),
            "host-rules" => Some(Self::HostRules),
            "client-certificates" => Some(Self::ClientCertificates),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the records of one kind come from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Fetch all entries of the kind's collection from the datastore.
    Store,
    /// Export the given records verbatim (no datastore query is made).
    Listed(Vec<Record>),
}

/// A per-kind selection of data to export.
#[derive(Debug, Clone, Default)]
pub struct ExportSelection {
    entries: BTreeMap<DataKind, DataSource>,
}

impl ExportSelection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a kind for a full datastore fetch.
    #[must_use]
    pub fn from_store(mut self, kind: DataKind) -> Self {
        self.entries.insert(kind, DataSource::Store);
        self
    }

    /// Selects a kind with a literal list of records.
    #[must_use]
    pub fn listed(mut self, kind: DataKind, records: Vec<Record>) -> Self {
        self.entries.insert(kind, DataSource::Listed(records));
        self
    }

    /// Selects every kind for a full datastore fetch.
    #[must_use]
    pub fn everything() -> Self {
        let mut selection = Self::new();
        for kind in DataKind::all() {
            selection.entries.insert(*kind, DataSource::Store);
        }
        selection
    }

    /// Returns true when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the selected kinds and their sources.
    pub fn iter(&self) -> impl Iterator<Item = (DataKind, &DataSource)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Consumes the selection into its entries.
    #[must_use]
    pub fn into_entries(self) -> BTreeMap<DataKind, DataSource> {
        self.entries
    }
}
