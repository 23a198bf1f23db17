//! MailMinder — email ingestion and extraction pipeline.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod store;
