//! Error types for the store.

/// Errors raised by a [`Store`](crate::Store) backend.
///
/// Callers treat all of these the same way: log, abort the current
/// operation, keep the process running.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected a statement or could not be opened.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking task running the query panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A previous panic while holding the connection poisoned its lock.
    #[error("store connection lock poisoned")]
    LockPoisoned,

    /// A stored timestamp could not be parsed.
    #[error("invalid stored timestamp {0:?}")]
    InvalidTimestamp(String),
}
