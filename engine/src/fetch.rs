//! Remote completion of partially-synced themes.

use async_trait::async_trait;
use thiserror::Error;

use crate::theme::types::{ThemeRecord, ThemeVariables};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("theme download failed: {0}")]
    Transport(String),
}

/// Result of a remote theme fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The completed variable set for the theme.
    Variables(ThemeVariables),
    /// The theme has no definition usable on this device. Terminal for the
    /// activation attempt that requested it.
    Unavailable,
}

/// Downloads the full variable set for a theme that synced without one.
#[async_trait]
pub trait ThemeFetcher: Send + Sync {
    async fn fetch_theme(&self, theme: &ThemeRecord) -> Result<FetchOutcome, FetchError>;
}
