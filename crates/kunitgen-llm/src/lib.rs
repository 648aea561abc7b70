//! kunitgen-llm: chat completion client for test generation
//!
//! Implements [`kunitgen_core::TestGenerator`] on top of any endpoint that
//! speaks the OpenAI `/chat/completions` protocol (NVIDIA NIM by default).

pub mod client;
pub mod error;

pub use client::{ClientConfig, OpenAiCompatibleClient};
pub use error::LlmError;

/// Result type for kunitgen-llm operations
pub type Result<T> = std::result::Result<T, LlmError>;
