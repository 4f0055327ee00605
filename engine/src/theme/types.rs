use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chrome::{KeyboardAppearance, StatusBarStyle};
use crate::mode::Mode;
use crate::theme::color;
use crate::theme::template::{self, VAR_CONTRAST_BACKGROUND_COLOR};

/// Ordered mapping from style variable names to their values.
///
/// Ordering keeps the serialized projection deterministic, which matters for
/// the swap-in equivalence check during sync reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeVariables(BTreeMap<String, String>);

impl ThemeVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge these variables over `base`: every key present here overrides
    /// the base value, every key missing here is filled from the base.
    pub fn merged_over(&self, mut base: ThemeVariables) -> ThemeVariables {
        for (name, value) in &self.0 {
            base.0.insert(name.clone(), value.clone());
        }
        base
    }
}

impl FromIterator<(String, String)> for ThemeVariables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A theme's variable mapping, tagged by completeness.
///
/// Remotely-defined themes may sync down without their full variable set; a
/// `Partial` set must be completed by the Remote Theme Fetcher before the
/// theme can be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSet {
    Complete(ThemeVariables),
    Partial(ThemeVariables),
}

impl VariableSet {
    /// Tag a raw variable mapping: complete when the required marker
    /// variable is present, partial otherwise.
    pub fn classify(variables: ThemeVariables) -> Self {
        if variables.contains(template::REQUIRED_VARIABLE) {
            VariableSet::Complete(variables)
        } else {
            VariableSet::Partial(variables)
        }
    }

    pub fn variables(&self) -> &ThemeVariables {
        match self {
            VariableSet::Complete(vars) | VariableSet::Partial(vars) => vars,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, VariableSet::Partial(_))
    }
}

/// The serialization projection of a [`ThemeRecord`].
///
/// One payload shape serves both sync transport and the cold-start
/// preference blob. Local-only state (dirty flag, device-active flag,
/// swap-in marker, memoized luminosity) never serializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRecordPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub variables: ThemeVariables,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub preferred_light: bool,
    #[serde(default)]
    pub preferred_dark: bool,
}

/// A named, identity-bearing theme definition plus the engine's local
/// bookkeeping for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRecord {
    pub id: String,
    pub name: String,
    variables: VariableSet,
    pub is_system: bool,
    pub is_initial: bool,
    pub(crate) preferred_light: bool,
    pub(crate) preferred_dark: bool,
    pub(crate) is_dirty: bool,
    pub(crate) is_active_on_device: bool,
    pub(crate) is_swap_in: bool,
    luminosity: Option<f64>,
}

impl ThemeRecord {
    /// Build one of the built-in system themes. System themes use their name
    /// as identity and are seeded once at engine construction.
    pub(crate) fn system(name: &str, is_initial: bool, variables: ThemeVariables) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            variables: VariableSet::classify(variables),
            is_system: true,
            is_initial,
            preferred_light: false,
            preferred_dark: false,
            is_dirty: false,
            is_active_on_device: false,
            is_swap_in: false,
            luminosity: None,
        }
    }

    pub fn from_payload(payload: ThemeRecordPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            variables: VariableSet::classify(payload.variables),
            is_system: payload.is_system,
            is_initial: payload.is_initial,
            preferred_light: payload.preferred_light,
            preferred_dark: payload.preferred_dark,
            is_dirty: false,
            is_active_on_device: false,
            is_swap_in: false,
            luminosity: None,
        }
    }

    pub fn to_payload(&self) -> ThemeRecordPayload {
        ThemeRecordPayload {
            id: self.id.clone(),
            name: self.name.clone(),
            variables: self.variables.variables().clone(),
            is_system: self.is_system,
            is_initial: self.is_initial,
            preferred_light: self.preferred_light,
            preferred_dark: self.preferred_dark,
        }
    }

    pub fn variables(&self) -> &ThemeVariables {
        self.variables.variables()
    }

    pub fn variable_set(&self) -> &VariableSet {
        &self.variables
    }

    /// Whether this theme still needs its variable set completed remotely.
    pub fn needs_remote_completion(&self) -> bool {
        self.variables.is_partial()
    }

    /// Replace the variable mapping wholesale, re-tagging completeness and
    /// dropping the memoized luminosity.
    pub(crate) fn replace_variables(&mut self, variables: ThemeVariables) {
        self.variables = VariableSet::classify(variables);
        self.luminosity = None;
    }

    /// Fill every gap from the canonical template. The result is complete by
    /// construction, whatever shape the remote data had.
    pub(crate) fn merge_template(&mut self) {
        let merged = self
            .variables
            .variables()
            .merged_over(template::template_variables());
        self.variables = VariableSet::Complete(merged);
        self.luminosity = None;
    }

    pub fn preferred_for(&self, mode: Mode) -> bool {
        match mode {
            Mode::Light => self.preferred_light,
            Mode::Dark => self.preferred_dark,
        }
    }

    pub(crate) fn set_preferred_for(&mut self, mode: Mode, preferred: bool) {
        match mode {
            Mode::Light => self.preferred_light = preferred,
            Mode::Dark => self.preferred_dark = preferred,
        }
    }

    pub fn is_active_on_device(&self) -> bool {
        self.is_active_on_device
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_swap_in(&self) -> bool {
        self.is_swap_in
    }

    /// Perceptual luminosity of the contrast-background variable, memoized.
    ///
    /// Missing or unparseable values score as maximum luminosity so chrome
    /// degrades to the light-background styling.
    pub fn luminosity(&mut self) -> f64 {
        *self.luminosity.get_or_insert_with(|| {
            self.variables
                .variables()
                .get(VAR_CONTRAST_BACKGROUND_COLOR)
                .and_then(color::luminosity)
                .unwrap_or(255.0)
        })
    }

    pub fn status_bar_style(&mut self) -> StatusBarStyle {
        StatusBarStyle::for_luminosity(self.luminosity())
    }

    pub fn keyboard_appearance(&mut self) -> KeyboardAppearance {
        KeyboardAppearance::for_luminosity(self.luminosity())
    }
}
