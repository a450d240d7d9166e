//! LLM Client Layer
//!
//! This module provides:
//! - LlmClient trait for API abstraction
//! - OpenAiClient implementation (chat completions)
//! - MockLlmClient for scripted runs

pub mod client;
pub mod openai;

pub use client::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, MockLlmClient, TokenUsage, strip_code_fence,
};
pub use openai::{OpenAiClient, OpenAiConfig};
