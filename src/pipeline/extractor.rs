//! Action-item extraction — scans canonical text for imperative and
//! request patterns and produces discrete tasks with local importance.
//!
//! Total and pure, like the normalizer. The trigger vocabulary is
//! heuristic and best-effort; the contract is ordering, de-duplication,
//! and totality, not NLP-complete task detection.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::summarizer::truncate_at_boundary;
use crate::pipeline::types::{ExtractedAction, ImportanceTier};

/// Cap on one action-item description, same truncation policy as the
/// summarizer.
const MAX_DESCRIPTION_LEN: usize = 140;

/// Minimum clause length worth keeping; anything shorter is noise.
const MIN_CLAUSE_LEN: usize = 8;

/// Polite/imperative sentence openers.
static OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(please|kindly|let'?s)\b").unwrap());

/// Prefixes stripped off a matched clause to leave the bare task.
static STRIP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(please|kindly|(can|could|would|will) you( please)?)\s+").unwrap()
});

/// Leading connectors ("Also, call Bob") in front of an imperative.
static CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(also|then|and|finally|next)[,\s]\s*").unwrap());

/// "Action items:" / "Next steps:" style section headers.
static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(action items?|next steps?|todo|to-do)\b\s*:?").unwrap());

/// Bare-imperative request verbs at clause start.
static IMPERATIVE_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(send|review|confirm|share|provide|update|schedule|book|arrange|reply|respond|sign|approve|submit|forward|attach|check|call|pay|fix|complete|finish|prepare)\b",
    )
    .unwrap()
});

/// Trigger phrases anywhere in a clause.
static TRIGGERS: &[&str] = &[
    // polite requests
    "please",
    "could you",
    "can you",
    "would you",
    "need to",
    "needs to",
    "let me know",
    "follow up",
    "circle back",
    "don't forget",
    "make sure",
    "remember to",
    // deadlines / time pressure
    "by eod",
    "by end of day",
    "by tomorrow",
    "by monday",
    "by tuesday",
    "by wednesday",
    "by thursday",
    "by friday",
    "by saturday",
    "by sunday",
    "this week",
    "deadline",
    "due ",
    // modal + action
    "should send",
    "should review",
    "should schedule",
    "must send",
    "must review",
];

/// Question-form requests addressed to the reader.
static QUESTION_HINTS: &[&str] = &["can ", "could ", "would ", "will ", "do you", "are you"];

/// Urgency keywords that escalate a single item to high.
static URGENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(urgent|asap|right away|immediately|action required)\b").unwrap()
});

/// Short-horizon deadline phrases; also escalate to high.
static NEAR_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(by (eod|end of day|noon|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday)|today|tomorrow|deadline|overdue|due\b)",
    )
    .unwrap()
});

/// Extract action items from canonical text, in appearance order.
///
/// Identical descriptions (case/whitespace-insensitive) collapse to one
/// item, keeping the first occurrence. Extraction stops once `max_items`
/// is reached, preserving the earliest-appearing items.
pub fn extract(canonical: &str, max_items: usize) -> Vec<ExtractedAction> {
    let mut items: Vec<ExtractedAction> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for line in canonical.lines() {
        for sentence in split_sentences(line) {
            if items.len() >= max_items {
                return items;
            }
            if !is_candidate(sentence) {
                continue;
            }
            let description = clean_description(sentence);
            if description.chars().count() < MIN_CLAUSE_LEN {
                continue;
            }
            let key = dedup_key(&description);
            if !seen.insert(key) {
                continue;
            }
            items.push(ExtractedAction {
                importance: item_importance(sentence),
                description,
            });
        }
    }
    items
}

/// Naive sentence splitter: cut after `.`, `?`, or `!` followed by
/// whitespace. Keeps the terminator with its sentence.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminator = false;
    for (idx, ch) in line.char_indices() {
        if prev_terminator && ch.is_whitespace() {
            let s = line[start..idx].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = idx;
        }
        prev_terminator = matches!(ch, '.' | '?' | '!');
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Does this sentence look like a request, instruction, or deadline?
fn is_candidate(sentence: &str) -> bool {
    if sentence.chars().count() < MIN_CLAUSE_LEN {
        return false;
    }
    // More than two addresses means a footer, not a task.
    if sentence.matches('@').count() > 2 {
        return false;
    }
    let lowered = sentence.to_lowercase();
    if lowered.ends_with("thanks") || lowered.ends_with("thank you") || lowered.ends_with("best")
    {
        return false;
    }
    let core = CONNECTOR.replace(sentence, "");
    if OPENER.is_match(&core) || IMPERATIVE_VERB.is_match(&core) {
        return true;
    }
    if SECTION_HEADER.is_match(sentence) {
        return true;
    }
    if TRIGGERS.iter().any(|t| lowered.contains(t)) {
        return true;
    }
    // Question-form request: "Could you ...?" / "Are you able to ...?"
    if lowered.ends_with('?') && QUESTION_HINTS.iter().any(|h| lowered.contains(h)) {
        return true;
    }
    false
}

/// Strip politeness prefixes and trailing punctuation, cap the length.
fn clean_description(sentence: &str) -> String {
    let core = CONNECTOR.replace(sentence, "");
    let stripped = STRIP_PREFIX.replace(&core, "").into_owned();
    let trimmed = stripped
        .trim()
        .trim_end_matches(['.', '?', '!', ',', ';', ':'])
        .trim_end();
    truncate_at_boundary(trimmed, MAX_DESCRIPTION_LEN)
}

/// Case/whitespace-insensitive identity for de-duplication.
fn dedup_key(description: &str) -> String {
    description
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Local importance: urgency keyword or near deadline escalates to high.
fn item_importance(sentence: &str) -> ImportanceTier {
    if URGENCY.is_match(sentence) || NEAR_DEADLINE.is_match(sentence) {
        ImportanceTier::High
    } else {
        ImportanceTier::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_polite_request() {
        let items = extract("Please send the report by Friday.", 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "send the report by Friday");
        assert_eq!(items[0].importance, ImportanceTier::High);
    }

    #[test]
    fn preserves_reading_order() {
        let items = extract("Please send the report. Also, call Bob.", 5);
        let descriptions: Vec<&str> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["send the report", "call Bob"]);
    }

    #[test]
    fn deduplicates_case_and_whitespace() {
        let text = "Please review the doc.\nplease REVIEW   the doc.\nPlease review the doc.";
        let items = extract(text, 10);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "review the doc");
    }

    #[test]
    fn respects_max_items() {
        let text = "Please send the report.\nPlease call Bob.\nPlease review the budget.\nPlease book a room.";
        let items = extract(text, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "send the report");
        assert_eq!(items[1].description, "call Bob");
    }

    #[test]
    fn question_form_request() {
        let items = extract("Could you share the slides before the meeting?", 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "share the slides before the meeting");
    }

    #[test]
    fn urgency_escalates_importance() {
        let items = extract("Please reply to the vendor asap.", 5);
        assert_eq!(items[0].importance, ImportanceTier::High);
    }

    #[test]
    fn deadline_escalates_importance() {
        let items = extract("Review the contract by EOD.", 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].importance, ImportanceTier::High);
    }

    #[test]
    fn plain_request_is_normal() {
        let items = extract("Please share the slides when you get a chance.", 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].importance, ImportanceTier::Normal);
    }

    #[test]
    fn urgency_marker_alone_is_not_a_task() {
        // "URGENT" escalates classification but is not itself a request.
        let items = extract("Q3 Report — URGENT", 5);
        assert!(items.is_empty());
    }

    #[test]
    fn non_request_text_yields_nothing() {
        let items = extract("The weather was lovely in Lisbon.\nWe had a great time.", 5);
        assert!(items.is_empty());
    }

    #[test]
    fn total_on_garbage() {
        assert!(extract("", 5).is_empty());
        assert!(extract("   \n\n  ", 5).is_empty());
        let _ = extract(&"\u{fffd}x".repeat(5_000), 5);
    }

    #[test]
    fn footer_with_many_addresses_skipped() {
        let items = extract("Contact a@x.com b@x.com c@x.com d@x.com to unsubscribe due", 5);
        assert!(items.is_empty());
    }

    #[test]
    fn long_clause_capped_at_boundary() {
        let long = format!("Please review {}", "the very long document name ".repeat(20));
        let items = extract(&long, 5);
        assert_eq!(items.len(), 1);
        assert!(items[0].description.chars().count() <= 140);
    }

    #[test]
    fn pure_and_deterministic() {
        let text = "Please send the invoice by tomorrow. Can you confirm receipt?";
        assert_eq!(extract(text, 5), extract(text, 5));
    }

    #[test]
    fn sentence_splitter_basic() {
        let parts = split_sentences("First one. Second one? Third!");
        assert_eq!(parts, vec!["First one.", "Second one?", "Third!"]);
    }
}
