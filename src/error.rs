use thiserror::Error;

/// Everything the engine can report to a caller. Each variant carries enough
/// detail to decide whether a retry makes sense: `Restore` failures are always
/// retry-safe, `SnapshotExists` never is.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced profile or snapshot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A snapshot with this name already exists in the profile. Capture never
    /// silently overwrites; clear the old snapshot first.
    #[error("snapshot '{0}' already exists in profile '{1}'")]
    SnapshotExists(String, String),

    /// The provider's write failed partway through a restore. Live state may
    /// be inconsistent, but the stored snapshot is untouched and re-issuing
    /// the same restore is safe.
    #[error("restore of '{name}' applied partially: {source}")]
    PartialApply {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Persistence backend failure. Fatal to the operation, retryable by the
    /// caller.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider read failed during capture. Nothing was written.
    #[error("state provider read failed: {0}")]
    Provider(std::io::Error),

    /// Rejected before any I/O happened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// Registry (de)serialization failures are storage-layer i/o as far as callers
// are concerned.
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
