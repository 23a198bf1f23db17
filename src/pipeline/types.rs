//! Shared types for the message processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Importance tier assigned to messages and action items.
///
/// Variant order matters: `Low < Normal < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceTier {
    Low,
    #[default]
    Normal,
    High,
}

impl ImportanceTier {
    /// Numeric score used for API filtering and DB sorting (1..=3).
    pub fn score(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
        }
    }

    /// Build a tier from a numeric score; out-of-range values clamp.
    pub fn from_score(score: i64) -> Self {
        match score {
            i64::MIN..=1 => Self::Low,
            2 => Self::Normal,
            _ => Self::High,
        }
    }

    /// Short label for logging and storage.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// A raw email record as supplied by an ingestion source.
///
/// Source adapters convert their native format into this struct; the
/// pipeline does not care whether it came from a live mailbox or a fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Source-native identifier; the store keys messages by it so
    /// re-ingesting the same message is safe.
    pub external_id: String,
    /// Sender address.
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// Raw body, possibly HTML or quoted-reply soup.
    pub body: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

/// One extracted action item: a discrete task with local importance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedAction {
    /// The matched clause, trimmed and capped.
    pub description: String,
    /// High when the clause carries urgency or a near deadline.
    pub importance: ImportanceTier,
}

/// The orchestrator's transient output bundle for one message.
///
/// Handed to the store for atomic application; never retained by the
/// pipeline itself.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Bounded-length synopsis of the canonical text.
    pub summary: String,
    /// Overall tier from the classifier.
    pub importance: ImportanceTier,
    /// Action items in source-text appearance order.
    pub actions: Vec<ExtractedAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(ImportanceTier::Low < ImportanceTier::Normal);
        assert!(ImportanceTier::Normal < ImportanceTier::High);
    }

    #[test]
    fn tier_score_roundtrip() {
        for tier in [
            ImportanceTier::Low,
            ImportanceTier::Normal,
            ImportanceTier::High,
        ] {
            assert_eq!(ImportanceTier::from_score(tier.score()), tier);
        }
    }

    #[test]
    fn tier_from_score_clamps() {
        assert_eq!(ImportanceTier::from_score(0), ImportanceTier::Low);
        assert_eq!(ImportanceTier::from_score(-5), ImportanceTier::Low);
        assert_eq!(ImportanceTier::from_score(99), ImportanceTier::High);
    }

    #[test]
    fn tier_serde_snake_case() {
        let json = serde_json::to_string(&ImportanceTier::High).unwrap();
        assert_eq!(json, "\"high\"");
        let parsed: ImportanceTier = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, ImportanceTier::Low);
    }

    #[test]
    fn raw_message_serde_roundtrip() {
        let raw = RawMessage {
            external_id: "msg-1".into(),
            sender: "alice@example.com".into(),
            subject: "Hello".into(),
            body: "Hi there".into(),
            received_at: Utc::now(),
        };
        let json = serde_json::to_string(&raw).unwrap();
        let parsed: RawMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.external_id, "msg-1");
        assert_eq!(parsed.sender, "alice@example.com");
    }
}
