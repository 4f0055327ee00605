//! Engine-level error taxonomy.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::storage::StorageError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThemeError {
    /// The theme has no definition usable on this device. Surfaced to the
    /// user as a non-blocking notice; the previous theme stays active.
    #[error("theme '{name}' is not available on this device")]
    NotAvailable { name: String },

    /// The requested id matches no known theme record.
    #[error("unknown theme '{id}'")]
    UnknownTheme { id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type alias for engine operations
pub type ThemeResult<T> = Result<T, ThemeError>;
