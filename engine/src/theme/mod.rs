//! # Theme Subsystem
//!
//! Everything the engine knows about themes: the record data model, the
//! canonical variable template and built-in system themes, color math,
//! derived widget styles, and the Resolution Engine itself.
//!
//! ## Architecture
//!
//! - **[`ThemeEngine`]** - active-theme selection, per-mode preferences,
//!   merge/persistence logic, sync reconciliation, observers
//! - **[`ThemeRecord`]** - identity-bearing theme definition plus the
//!   engine's local bookkeeping
//! - **[`template`]** - the complete reference variable set used to fill
//!   gaps in partial remote theme data, and the two seeded system themes
//! - **[`styles`]** - style tables derived from the active variables
//!
//! ## Activation flow
//!
//! Activating a theme clears the previous device-active flag, completes a
//! partial variable set through the Remote Theme Fetcher, merges the result
//! over the template so no variable is ever missing, records the theme as
//! the preference for the current appearance mode, persists the selection
//! for cold start, and finally applies platform chrome, rebuilds the style
//! table, and notifies observers.

pub mod color;
pub mod engine;
pub mod styles;
pub mod template;
pub mod types;

pub use engine::{ObserverToken, ThemeChangeObserver, ThemeEngine};
pub use types::{ThemeRecord, ThemeRecordPayload, ThemeVariables, VariableSet};
