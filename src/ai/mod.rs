//! Prompt assembly and the outbound chat-completion call.

mod client;
mod dto;
mod prompt;

pub use client::{AiClient, ProviderFailure};
pub use dto::{ChatCompletionRequest, ChatCompletionResponse, HistoryEntry, ProviderMessage};
pub use prompt::{build_messages, build_system_prompt};
