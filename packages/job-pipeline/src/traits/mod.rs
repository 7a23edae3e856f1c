//! Collaborator contracts for the pipeline.
//!
//! Any type implementing these traits can be plugged into the
//! [`Pipeline`](crate::pipeline::Pipeline): sources produce raw blobs, a
//! summarizer structures them, sinks record the resulting jobs.

pub mod sink;
pub mod source;
pub mod summarizer;
