//! Platform chrome capability seam.
//!
//! The engine computes *what* the chrome should look like (status bar
//! content, background, icon variant) and delegates *how* to an injected
//! [`PlatformChrome`] implementation, keeping the engine itself free of any
//! OS conditionals.

use thiserror::Error;

use crate::theme::color::LUMINOSITY_DARK_THRESHOLD;

/// Host platform discriminator, used for style-table overlays and supplied
/// by the chrome implementation selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Other,
}

/// Status bar content styling: light glyphs for dark backgrounds, dark
/// glyphs for light backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBarStyle {
    LightContent,
    DarkContent,
}

impl StatusBarStyle {
    pub fn for_luminosity(luminosity: f64) -> Self {
        if luminosity < LUMINOSITY_DARK_THRESHOLD {
            StatusBarStyle::LightContent
        } else {
            StatusBarStyle::DarkContent
        }
    }
}

/// On-screen keyboard appearance matching the active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardAppearance {
    Light,
    Dark,
}

impl KeyboardAppearance {
    pub fn for_luminosity(luminosity: f64) -> Self {
        if luminosity < LUMINOSITY_DARK_THRESHOLD {
            KeyboardAppearance::Dark
        } else {
            KeyboardAppearance::Light
        }
    }
}

/// Failure to switch the home-screen icon. The engine swallows these;
/// implementations report them so the degradation is loggable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("app icon change failed: {0}")]
pub struct IconError(pub String);

/// Highest Android API level that cannot adapt status bar text color; the
/// bar background must be forced to black there to keep contrast.
pub const LEGACY_ANDROID_STATUS_BAR_API: u32 = 22;

/// Resolve the status bar background an Android chrome implementation
/// should apply for its API level.
pub fn legacy_status_bar_background(api_level: u32, color: &str) -> &str {
    if api_level <= LEGACY_ANDROID_STATUS_BAR_API {
        "#000000"
    } else {
        color
    }
}

/// Capability interface for OS-level visual side effects.
///
/// `set_status_bar_background` is meaningful on Android only and
/// `set_app_icon` on iOS only; implementations for other platforms no-op
/// the respective call. `set_app_icon(None)` resets to the default icon.
pub trait PlatformChrome: Send + Sync {
    fn platform(&self) -> Platform;
    fn set_status_bar_style(&self, style: StatusBarStyle);
    fn set_status_bar_background(&self, color: &str);
    fn set_app_icon(&self, name: Option<&str>) -> Result<(), IconError>;
}

/// Chrome implementation with no side effects, for hosts without native
/// chrome (tests, desktop previews).
#[derive(Debug, Default)]
pub struct NullChrome;

impl PlatformChrome for NullChrome {
    fn platform(&self) -> Platform {
        Platform::Other
    }

    fn set_status_bar_style(&self, _style: StatusBarStyle) {}

    fn set_status_bar_background(&self, _color: &str) {}

    fn set_app_icon(&self, _name: Option<&str>) -> Result<(), IconError> {
        Ok(())
    }
}
