use thiserror::Error;

/// Failure kinds surfaced by every repository backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No stored row carries the requested id.
    #[error("user not found: {id}")]
    NotFound { id: String },

    #[error("storage i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A row that cannot be turned into a user (wrong field count, bad timestamp
    /// under the strict policy, undecodable text).
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(id: &str) -> Self {
        StoreError::NotFound { id: id.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map_or(0, |p| p.line());
        let reason = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(e) => StoreError::Io(e),
            _ => StoreError::MalformedRecord { line, reason },
        }
    }
}
