//! Field label → OCR character whitelist.
//!
//! Classification is a substring match on the human-readable label,
//! case-sensitive, first rule wins. Rules live in a table so new field kinds
//! can be added (built-in or from config) without touching the controller.

use serde::{Deserialize, Serialize};

/// Content class of a field, used for logging and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    Amount,
    Date,
    Sequence,
    Custom,
    Unconstrained,
}

/// One row of the lookup table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileRule {
    /// Any of these substrings in the label selects this rule
    pub patterns: Vec<String>,
    /// Characters the engine may output (empty = unconstrained)
    pub whitelist: String,
    #[serde(default = "default_custom_class")]
    pub class: CharClass,
}

fn default_custom_class() -> CharClass {
    CharClass::Custom
}

impl ProfileRule {
    pub fn new(class: CharClass, patterns: &[&str], whitelist: &str) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            whitelist: whitelist.to_string(),
            class,
        }
    }

    fn matches(&self, label: &str) -> bool {
        self.patterns.iter().any(|p| label.contains(p.as_str()))
    }
}

/// Resolved OCR constraint for one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldProfile {
    pub class: CharClass,
    pub whitelist: String,
}

/// Ordered rule table. Priority is table order.
#[derive(Clone, Debug)]
pub struct FieldProfiles {
    rules: Vec<ProfileRule>,
}

impl Default for FieldProfiles {
    fn default() -> Self {
        Self {
            rules: vec![
                ProfileRule::new(CharClass::Amount, &["金額"], "0123456789,¥"),
                ProfileRule::new(CharClass::Date, &["日付", "年月日"], "0123456789/.-年月日"),
                ProfileRule::new(CharClass::Sequence, &["No"], "0123456789"),
            ],
        }
    }
}

impl FieldProfiles {
    /// Built-in rules followed by `extra` (checked after the built-ins).
    pub fn with_extra_rules(extra: impl IntoIterator<Item = ProfileRule>) -> Self {
        let mut profiles = Self::default();
        profiles.rules.extend(extra);
        profiles
    }

    /// Resolves the profile for a label. Total: unmatched labels get an
    /// unconstrained profile.
    pub fn resolve(&self, label: &str) -> FieldProfile {
        match self.rules.iter().find(|rule| rule.matches(label)) {
            Some(rule) => FieldProfile {
                class: rule.class,
                whitelist: rule.whitelist.clone(),
            },
            None => {
                // Silent fallthrough would hide label wording changes
                tracing::warn!(label, "no charset rule matched, OCR runs unconstrained");
                FieldProfile {
                    class: CharClass::Unconstrained,
                    whitelist: String::new(),
                }
            }
        }
    }

    /// Whitelist string for a label (`""` means unconstrained).
    pub fn resolve_charset(&self, label: &str) -> String {
        self.resolve(label).whitelist
    }
}
