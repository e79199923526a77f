//! Pieces of the HTTP service that sit around the pipeline

pub mod cache;
pub mod config;
pub mod error;
pub mod source;
