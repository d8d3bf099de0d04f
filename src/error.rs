//! Error types for catalog building, persistence and launching.

use std::path::PathBuf;

use thiserror::Error;

/// Terminal errors: the whole operation is aborted and no partial tree is
/// returned.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("menu group not found: {0}")]
    GroupNotFound(String),

    #[error("entry name '{0}' collides with the reserved shortcut-key suffix")]
    ReservedNameCollision(String),

    #[error("failed writing to namespace {namespace} after {written} entries: {source}")]
    StoreWrite {
        namespace: String,
        written: usize,
        #[source]
        source: StoreError,
    },

    #[error("failed reading namespace {namespace}: {source}")]
    StoreRead {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no catalog entry '{key}' in {}", .catalog.display())]
    UnknownCatalogKey { key: String, catalog: PathBuf },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("presenter error: {0}")]
    Presenter(#[from] PresenterError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single file-system entry could not become an action. These never
/// abort a build; the entry is dropped and reported as a diagnostic.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported extension '{0}'")]
    UnsupportedExtension(String),

    #[error("no URL= line in {}", .0.display())]
    MalformedUrlFile(PathBuf),

    #[error("no browser found to open {}", .0.display())]
    BrowserNotFound(PathBuf),

    #[error("cannot read shortcut {}: {reason}", .path.display())]
    Shortcut { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid namespace '{0}'")]
    InvalidNamespace(String),

    #[error("namespace {namespace} is corrupt: {source}")]
    Corrupt {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PresenterError {
    #[error("unknown group handle {0}")]
    UnknownGroup(usize),

    #[error("unknown item handle {0}")]
    UnknownItem(usize),
}

/// A child name that is already taken under the same group.
#[derive(Debug, Error)]
#[error("'{name}' already exists in group '{group}'")]
pub struct DuplicateName {
    pub name: String,
    pub group: String,
}
