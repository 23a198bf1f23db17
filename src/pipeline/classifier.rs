//! Importance classification — assigns the overall tier for a message.
//!
//! Fixed precedence when multiple rules match:
//! explicit urgency marker > action-item-derived > sender pattern > default.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::pipeline::types::{ExtractedAction, ImportanceTier};

/// Explicit urgency markers in the canonical text.
static URGENCY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(urgent|urgently|asap|action required|time[- ]sensitive|immediately)\b")
        .unwrap()
});

/// Compiled sender-pattern lists from configuration.
///
/// High-priority patterns force importance up; low-priority patterns
/// (bulk/automated senders) pull it down when nothing else fires.
pub struct SenderRules {
    high: Vec<Regex>,
    low: Vec<Regex>,
}

impl SenderRules {
    /// Compile pattern lists; invalid regexes are configuration errors.
    pub fn from_patterns(high: &[String], low: &[String]) -> Result<Self, ConfigError> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| ConfigError::InvalidPattern {
                        pattern: p.clone(),
                        message: e.to_string(),
                    })
                })
                .collect()
        };
        Ok(Self {
            high: compile(high)?,
            low: compile(low)?,
        })
    }

    /// No sender patterns configured.
    pub fn empty() -> Self {
        Self {
            high: Vec::new(),
            low: Vec::new(),
        }
    }

    fn matches_high(&self, sender: &str) -> bool {
        self.high.iter().any(|r| r.is_match(sender))
    }

    fn matches_low(&self, sender: &str) -> bool {
        self.low.iter().any(|r| r.is_match(sender))
    }
}

/// Classify a message from its canonical text, extracted action items,
/// and sender. Deterministic given its inputs.
pub fn classify(
    canonical: &str,
    actions: &[ExtractedAction],
    sender: &str,
    rules: &SenderRules,
) -> ImportanceTier {
    if URGENCY_MARKER.is_match(canonical) {
        return ImportanceTier::High;
    }
    if actions.iter().any(|a| a.importance == ImportanceTier::High) {
        return ImportanceTier::High;
    }
    if rules.matches_high(sender) {
        return ImportanceTier::High;
    }
    if rules.matches_low(sender) && actions.is_empty() {
        return ImportanceTier::Low;
    }
    ImportanceTier::Normal
}
