/// Terminal error classes surfaced by store operations.
///
/// Transient SQLite contention is retried internally; only an exhausted
/// retry envelope becomes `BusyTimeout`. Precondition failures map to
/// `ReadOnly` / `Closed` / `Invalid` and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database stayed busy past the retry envelope")]
    BusyTimeout,
    #[error("store is read-only")]
    ReadOnly,
    #[error("store is closed")]
    Closed,
    #[error("{0}")]
    Invalid(String),
}
