//! Derived widget styles, recomputed whenever the active theme changes.
//!
//! Building a sheet is a pure function of the theme's variables and the
//! fixed layout constants; the engine swaps the whole table atomically as
//! the final commit step of an activation.

use std::collections::BTreeMap;

use crate::chrome::Platform;
use crate::theme::template::{
    VAR_BACKGROUND_COLOR, VAR_BORDER_COLOR, VAR_CONTRAST_BACKGROUND_COLOR, VAR_FOREGROUND_COLOR,
    VAR_INFO_COLOR,
};
use crate::theme::types::ThemeVariables;

/// Fixed layout constants mixed into the derived styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutConstants {
    pub main_text_font_size: u16,
    pub padding_left: u16,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            main_text_font_size: 16,
            padding_left: 14,
        }
    }
}

/// One named style entry. Unset fields inherit from the widget's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub background: Option<String>,
    pub foreground: Option<String>,
    pub border: Option<String>,
    pub font_size: Option<u16>,
    pub padding_horizontal: Option<u16>,
    pub bold: bool,
}

/// The full derived style table for the active theme.
///
/// Platform-specific overlays live under `<key>_android` / `<key>_ios` and
/// are resolved by [`styles_for_key`].
///
/// [`styles_for_key`]: StyleSheet::styles_for_key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    entries: BTreeMap<String, Style>,
}

impl StyleSheet {
    pub fn build(variables: &ThemeVariables, layout: &LayoutConstants) -> Self {
        let var = |name: &str| variables.get(name).map(str::to_string);
        let mut entries = BTreeMap::new();
        let mut set = |key: &str, style: Style| {
            entries.insert(key.to_string(), style);
        };

        set(
            "base_background",
            Style {
                background: var(VAR_BACKGROUND_COLOR),
                ..Style::default()
            },
        );
        set(
            "contrast_background",
            Style {
                background: var(VAR_CONTRAST_BACKGROUND_COLOR),
                ..Style::default()
            },
        );
        set(
            "ui_text",
            Style {
                foreground: var(VAR_FOREGROUND_COLOR),
                font_size: Some(layout.main_text_font_size),
                ..Style::default()
            },
        );
        set(
            "table_section",
            Style {
                background: var(VAR_BACKGROUND_COLOR),
                ..Style::default()
            },
        );
        set(
            "sectioned_cell",
            Style {
                background: var(VAR_BACKGROUND_COLOR),
                border: var(VAR_BORDER_COLOR),
                padding_horizontal: Some(layout.padding_left),
                ..Style::default()
            },
        );
        set(
            "cell_text_input",
            Style {
                foreground: var(VAR_FOREGROUND_COLOR),
                font_size: Some(layout.main_text_font_size),
                ..Style::default()
            },
        );
        set(
            "note_text",
            Style {
                background: var(VAR_BACKGROUND_COLOR),
                foreground: var(VAR_FOREGROUND_COLOR),
                padding_horizontal: Some(layout.padding_left),
                ..Style::default()
            },
        );
        // the note editor sits flush against the screen edge on iOS
        set(
            "note_text_ios",
            Style {
                padding_horizontal: Some(layout.padding_left.saturating_sub(5)),
                ..Style::default()
            },
        );
        set(
            "action_sheet_title",
            Style {
                background: var(VAR_BACKGROUND_COLOR),
                foreground: var(VAR_FOREGROUND_COLOR),
                ..Style::default()
            },
        );
        set(
            "action_sheet_button",
            Style {
                background: var(VAR_BACKGROUND_COLOR),
                foreground: var(VAR_INFO_COLOR),
                ..Style::default()
            },
        );
        set(
            "button_cell",
            Style {
                foreground: var(VAR_INFO_COLOR),
                font_size: Some(layout.main_text_font_size),
                ..Style::default()
            },
        );
        // Android buttons render in the body color, not the accent
        set(
            "button_cell_android",
            Style {
                foreground: var(VAR_FOREGROUND_COLOR),
                ..Style::default()
            },
        );
        set(
            "bold",
            Style {
                bold: true,
                ..Style::default()
            },
        );

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Style> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Base style plus the overlay for `platform`, in application order.
    pub fn styles_for_key(&self, key: &str, platform: Platform) -> Vec<&Style> {
        let mut styles = Vec::new();
        if let Some(base) = self.entries.get(key) {
            styles.push(base);
        }
        let suffix = match platform {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Other => return styles,
        };
        if let Some(overlay) = self.entries.get(&format!("{key}_{suffix}")) {
            styles.push(overlay);
        }
        styles
    }
}
