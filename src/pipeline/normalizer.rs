//! Text normalization — turns a raw subject/body pair into the canonical
//! text every downstream stage consumes.
//!
//! Total and pure: never fails, no I/O, no randomness. Malformed input
//! worst-cases to an empty string, not an error.

use std::sync::LazyLock;

use regex::Regex;

/// "On Mon, Jan 2, 2025 at 9:00 AM Alice <a@x.com> wrote:" — everything
/// from this line onward is a quoted reply chain.
static WROTE_ATTRIBUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^on\b.{0,120}wrote:\s*$").unwrap());

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Produce the canonical text for a message.
///
/// Subject first, then the cleaned body, joined by a single newline.
/// Returns the subject alone when the body is empty, and an empty string
/// when both are absent.
pub fn normalize(subject: &str, body: &str) -> String {
    let subject = collapse_inline(subject);
    let body = clean_body(body);

    match (subject.is_empty(), body.is_empty()) {
        (true, true) => String::new(),
        (false, true) => subject,
        (true, false) => body,
        (false, false) => format!("{subject}\n{body}"),
    }
}

/// Strip quoted replies, signatures, HTML, and URLs from a raw body, then
/// collapse whitespace.
fn clean_body(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim_start();
        // Signature delimiter ends the useful content.
        if line.trim() == "--" {
            break;
        }
        // A "wrote:" attribution starts the quoted thread; drop the rest.
        if WROTE_ATTRIBUTION.is_match(trimmed) {
            break;
        }
        // Quoted-reply lines inflate extraction signal; skip them.
        if trimmed.starts_with('>') {
            continue;
        }
        kept.push(line);
    }
    let mut text = kept.join("\n");

    if looks_like_html(&text) {
        text = strip_html(&text);
    }

    let text = URL.replace_all(&text, "[link]");

    // Collapse runs of spaces/tabs within lines and runs of blank lines,
    // preserving single newlines so line-by-line extraction still works.
    text.lines()
        .map(collapse_inline)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of whitespace to single spaces and trim.
fn collapse_inline(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cheap HTML sniff: an `<html` tag anywhere, or a closing tag early on.
fn looks_like_html(text: &str) -> bool {
    let lowered = text.to_lowercase();
    if lowered.contains("<html") {
        return true;
    }
    let head: String = lowered.chars().take(200).collect();
    head.contains("</")
}

/// Strip HTML tags from content (basic).
fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}
