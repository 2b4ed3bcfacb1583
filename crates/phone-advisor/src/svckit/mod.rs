//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the phone advisor.

mod search_phones;

pub use search_phones::SearchPhonesTool;
