//! Configuration loading and the labeling pipeline.

pub mod config;
pub mod pipeline;
