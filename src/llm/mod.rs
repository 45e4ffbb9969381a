//! LLM client abstraction layer
//!
//! A trait-based abstraction over the inference backend, so stage runners can
//! be driven by a real OpenAI-compatible server or by a scripted mock.

mod client;
mod error;
mod mock;
mod openai;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use mock::{MockLLMClient, MockResponse};
pub use openai::{OpenAICompatibleClient, DEFAULT_TIMEOUT_SECS};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
