//! Generation-service boundary: chat providers, bounded retry, and strict structured decoding.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod structured;

pub use error::LlmError;
pub use provider::{GenerationParams, LlmProvider, Message, Role};
pub use retry::{DelayStrategy, FixedDelay, LinearBackoff, NoDelay, RetryExhausted, RetryPolicy};
