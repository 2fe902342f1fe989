//! Krumhansl-Kessler key templates
//!
//! Defines tonal profiles for 24 keys (12 major + 12 minor). Each template
//! is the canonical C major or C minor profile rotated to its root.

use crate::analysis::result::Key;
use std::sync::OnceLock;

/// Krumhansl-Kessler C major profile
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler C minor profile
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Rotate `profile` right by `shift` positions
///
/// Element `j` of the result is `profile[(j - shift) mod 12]`, so the tonic
/// weight lands on pitch class `shift`.
pub fn rotate(profile: &[f32; 12], shift: u32) -> [f32; 12] {
    let shift = (shift % 12) as usize;
    let mut out = [0.0f32; 12];
    for (j, o) in out.iter_mut().enumerate() {
        *o = profile[(j + 12 - shift) % 12];
    }
    out
}

/// One labeled reference profile
#[derive(Debug, Clone, PartialEq)]
pub struct ToneTemplate {
    key: Key,
    profile: [f32; 12],
}

impl ToneTemplate {
    /// Template for `key`
    pub fn new(key: Key) -> Self {
        let canonical = if key.is_minor() {
            &MINOR_PROFILE
        } else {
            &MAJOR_PROFILE
        };
        Self {
            key,
            profile: rotate(canonical, key.root()),
        }
    }

    /// Key this template represents
    pub fn key(&self) -> Key {
        self.key
    }

    /// Rotated 12-bin profile
    pub fn profile(&self) -> &[f32; 12] {
        &self.profile
    }
}

/// Key templates for all 24 keys
#[derive(Debug, Clone)]
pub struct KeyTemplates {
    /// Templates in ranking order: majors C..B, then minors C..B
    templates: Vec<ToneTemplate>,
}

impl KeyTemplates {
    /// Create new key templates with Krumhansl-Kessler profiles
    pub fn new() -> Self {
        Self {
            templates: Key::all().map(ToneTemplate::new).collect(),
        }
    }

    /// Process-wide template set
    pub fn standard() -> &'static KeyTemplates {
        static TEMPLATES: OnceLock<KeyTemplates> = OnceLock::new();
        TEMPLATES.get_or_init(KeyTemplates::new)
    }

    /// All templates in ranking order
    pub fn iter(&self) -> impl Iterator<Item = &ToneTemplate> {
        self.templates.iter()
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True if the set is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Major template for root `key_idx` (0 = C)
    pub fn get_major_template(&self, key_idx: u32) -> &[f32; 12] {
        self.templates[(key_idx % 12) as usize].profile()
    }

    /// Minor template for root `key_idx` (0 = C)
    pub fn get_minor_template(&self, key_idx: u32) -> &[f32; 12] {
        self.templates[12 + (key_idx % 12) as usize].profile()
    }
}

impl Default for KeyTemplates {
    fn default() -> Self {
        Self::new()
    }
}
