//! The ingestion-and-extraction pipeline.
//!
//! Flow per message: normalize → {summarize, extract, classify} on the
//! same canonical text. All stages except the external summarizer call
//! are pure functions, which is what makes re-processing idempotent.

pub mod classifier;
pub mod extractor;
pub mod normalizer;
pub mod orchestrator;
pub mod summarizer;
pub mod types;

pub use orchestrator::Pipeline;
pub use types::{ExtractedAction, ImportanceTier, ProcessingResult, RawMessage};
