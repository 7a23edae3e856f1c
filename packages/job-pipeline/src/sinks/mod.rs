//! Sink implementations.

pub mod jsonl;
pub mod log;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod tsv;

pub use jsonl::JsonLinesSink;
pub use log::LogSink;
pub use memory::MemorySink;
#[cfg(feature = "postgres")]
pub use postgres::PostgresSink;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSink;
pub use tsv::TsvSink;
