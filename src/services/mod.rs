//! Services
//!
//! Business logic: chat-history analysis and LLM access.

pub mod analysis;
pub mod llm;
