//! Summarizer implementations.

#[cfg(feature = "openai")]
pub mod openai;
pub mod parse;
pub mod prompts;

#[cfg(feature = "openai")]
pub use openai::OpenAiSummarizer;
pub use parse::parse_summary;
