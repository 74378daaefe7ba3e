//! Evaluation settings, passed explicitly into every run.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which stratification algorithm to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StratifierKind {
    /// One level per rule-head predicate
    Global,
    /// One level per rule; dependencies only on rules whose heads can match
    Local,
}

/// Rule safety options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SafetyConfig {
    /// A positive built-in that can compute a position limits the variable there,
    /// once its other variables are limited (e.g. `?Z` in `q(?X, ?Y), add(?X, ?Y, ?Z)`)
    pub builtins_imply_limited: bool,
    /// Accept variables that only occur in negated ordinary literals
    /// (`p(?X) :- q(?X), not r(?X, ?Y).` reads "no `?Y` with `r(?X, ?Y)`")
    pub allow_unlimited_variables_in_negation: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            builtins_imply_limited: true,
            allow_unlimited_variables_in_negation: false,
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Configuration {
    /// Rule safety options
    pub safety: SafetyConfig,
    /// Stratifiers tried in order; the first that succeeds is used
    pub stratifiers: Vec<StratifierKind>,
    /// Allow rules whose head is an equality literal
    pub rule_head_equality: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            safety: SafetyConfig::default(),
            stratifiers: vec![StratifierKind::Global, StratifierKind::Local],
            rule_head_equality: false,
        }
    }
}

#[cfg(feature = "serde")]
impl Configuration {
    /// Load a configuration from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document is malformed or has fields of the wrong type
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Bounds enforced between evaluation steps by [`crate::limits::run_with_limits`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Wall-clock budget for the whole run
    pub timeout: Option<Duration>,
    /// Maximum number of tuples across all relations
    pub max_tuples: Option<usize>,
}
