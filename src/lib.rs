//! Job Lens: scrape public job listings, then score them against a resume and draft
//! tailored application documents with an LLM.

pub mod analysis;
pub mod auth;
pub mod core;
pub mod credit_cli;
pub mod environment;
pub mod events;
pub mod resume;
pub mod scraping;
pub mod session;
pub mod web;
