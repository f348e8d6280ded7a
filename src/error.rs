use thiserror::Error;

/// Failure to get a usable page from one of the proxies.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{0}")]
    Unavailable(String),
}

/// Page shape did not match. Never leaves a parser.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid selector {css}: {reason}")]
    Selector { css: &'static str, reason: String },

    #[error("invalid pattern: {0}")]
    Pattern(&'static str),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors ending a device synchronization step or traversal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to load {0}")]
    LoadFailed(String),

    #[error("Failed to load details for {0}")]
    DetailsFailed(String),

    #[error("Failed to mount file")]
    MountFailed(String),

    #[error("Device unreachable")]
    Unreachable,
}
