// src/core/mod.rs
//! Shared services: configuration, the credit database and the LLM client

pub mod config_manager;
pub mod database;
pub mod llm_client;

pub use config_manager::ConfigManager;
pub use database::Database;
pub use llm_client::{CompletionProvider, LlmClient};
