//! Data types flowing through the pipeline.

pub mod config;
pub mod job;
pub mod raw;
pub mod salary;
pub mod summary;
