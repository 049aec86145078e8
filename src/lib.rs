//! # paperdigest
//!
//! Scrape, summarize and catalogue academic articles - 3-Stage Rust Pipeline
//!
//! ## Modules
//!
//! - [`scopus`] - Scopus search producing the work list
//! - [`session`] - Authenticated library proxy sessions
//! - [`worker`] / [`extract`] - Article fetching, cleaning and validation
//! - [`retry`] - Per-item retries with session recreation
//! - [`throttle`] - Sliding-window request ceiling for remote APIs
//! - [`gemini`] / [`summarize`] - Structured summaries
//! - [`notion`] - Notion database upload
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use paperdigest::config::PipelineConfig;
//! use paperdigest::scopus;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load(std::path::Path::new("config.yaml"))?;
//!     let items = scopus::search(&config.elsevier).await?;
//!     println!("Found {} articles", items.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod delay;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod models;
pub mod notion;
pub mod prompts;
pub mod retry;
pub mod scopus;
pub mod session;
pub mod storage;
pub mod summarize;
pub mod throttle;
pub mod worker;

pub use error::{DigestError, Result};
