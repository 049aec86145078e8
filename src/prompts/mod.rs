//! Prompt templates for the summarization model.

pub mod summary;

pub use summary::*;
