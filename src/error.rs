use thiserror::Error;

/// Failures reported across the interval store boundary.
///
/// `Disposed` is distinct from an empty result: an empty result means the
/// store has no state there, `Disposed` means it can no longer answer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("interval store has been disposed")]
    Disposed,
    #[error("interval store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_disposed(&self) -> bool {
        matches!(self, StoreError::Disposed)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}
