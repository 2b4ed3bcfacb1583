//! # agent-runtime
//!
//! Runtime providers for the phone advisor agent.
//!
//! ## Providers
//!
//! - **OpenAI-compatible** (default): streaming chat completions with native
//!   tool calling against OpenAI or any server exposing the same API
//! - **Retry**: wraps any provider and retries transient failures when a
//!   stream is opened
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{OpenAiProvider, RetryPolicy, RetryProvider};
//!
//! let provider = Arc::new(OpenAiProvider::from_env()?);
//! let provider = Arc::new(RetryProvider::new(provider, RetryPolicy::default()));
//! let agent = AgentBuilder::new()
//!     .provider(provider)
//!     .build()?;
//! ```

pub mod env;
pub mod openai;
pub mod retry;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use retry::{RetryPolicy, RetryProvider};
