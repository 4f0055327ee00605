//! The canonical variable template and the built-in system themes.
//!
//! Remotely-defined themes cannot be trusted to carry every variable the
//! client expects, so activation merges them over the template to guarantee
//! a complete set. The two system themes are seeded at engine construction,
//! are always present, and never sync.

use once_cell::sync::Lazy;

use crate::theme::types::{ThemeRecord, ThemeVariables};

pub const VAR_INFO_COLOR: &str = "info_color";
pub const VAR_NEUTRAL_COLOR: &str = "neutral_color";
pub const VAR_SUCCESS_COLOR: &str = "success_color";
pub const VAR_WARNING_COLOR: &str = "warning_color";
pub const VAR_DANGER_COLOR: &str = "danger_color";
pub const VAR_SHADOW_COLOR: &str = "shadow_color";
pub const VAR_BACKGROUND_COLOR: &str = "background_color";
pub const VAR_CONTRAST_BACKGROUND_COLOR: &str = "contrast_background_color";
pub const VAR_FOREGROUND_COLOR: &str = "foreground_color";
pub const VAR_CONTRAST_FOREGROUND_COLOR: &str = "contrast_foreground_color";
pub const VAR_BORDER_COLOR: &str = "border_color";
pub const VAR_CONTRAST_BORDER_COLOR: &str = "contrast_border_color";

/// The marker variable whose absence means a theme was synced without its
/// full definition and must be completed remotely before use.
pub const REQUIRED_VARIABLE: &str = VAR_INFO_COLOR;

/// Name (and id) of the system theme used as the cold-start fallback.
pub const INITIAL_SYSTEM_THEME: &str = "Slate";

/// Name (and id) of the second built-in system theme.
pub const EMBER_SYSTEM_THEME: &str = "Ember";

fn variables(pairs: &[(&str, &str)]) -> ThemeVariables {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

static SLATE: Lazy<ThemeVariables> = Lazy::new(|| {
    variables(&[
        (VAR_INFO_COLOR, "#086dd6"),
        (VAR_NEUTRAL_COLOR, "#989898"),
        (VAR_SUCCESS_COLOR, "#2b9612"),
        (VAR_WARNING_COLOR, "#ec8d2d"),
        (VAR_DANGER_COLOR, "#f80324"),
        (VAR_SHADOW_COLOR, "#c8c8c8"),
        (VAR_BACKGROUND_COLOR, "#ffffff"),
        (VAR_CONTRAST_BACKGROUND_COLOR, "#f6f6f6"),
        (VAR_FOREGROUND_COLOR, "#2e2e2e"),
        (VAR_CONTRAST_FOREGROUND_COLOR, "#2e2e2e"),
        (VAR_BORDER_COLOR, "#e3e3e3"),
        (VAR_CONTRAST_BORDER_COLOR, "#e3e3e3"),
    ])
});

static EMBER: Lazy<ThemeVariables> = Lazy::new(|| {
    variables(&[
        (VAR_INFO_COLOR, "#b31f1f"),
        (VAR_NEUTRAL_COLOR, "#9b8e8e"),
        (VAR_SUCCESS_COLOR, "#2b9612"),
        (VAR_WARNING_COLOR, "#ec8d2d"),
        (VAR_DANGER_COLOR, "#f80324"),
        (VAR_SHADOW_COLOR, "#d8c8c8"),
        (VAR_BACKGROUND_COLOR, "#fff9f9"),
        (VAR_CONTRAST_BACKGROUND_COLOR, "#f7eeee"),
        (VAR_FOREGROUND_COLOR, "#332727"),
        (VAR_CONTRAST_FOREGROUND_COLOR, "#332727"),
        (VAR_BORDER_COLOR, "#eadcdc"),
        (VAR_CONTRAST_BORDER_COLOR, "#eadcdc"),
    ])
});

/// The canonical, complete variable set used to fill gaps in partial theme
/// data. Returns a copy, since callers may modify the result before use.
pub fn template_variables() -> ThemeVariables {
    EMBER.clone()
}

/// Build the built-in system theme records, initial theme first.
pub fn builtin_themes() -> Vec<ThemeRecord> {
    vec![
        ThemeRecord::system(INITIAL_SYSTEM_THEME, true, SLATE.clone()),
        ThemeRecord::system(EMBER_SYSTEM_THEME, false, EMBER.clone()),
    ]
}
