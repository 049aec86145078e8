//! Summarization stage: article texts in, JSON summaries out.

use crate::error::{DigestError, Result};
use crate::gemini::{extract_json, Summarizer, TokenUsage};
use crate::storage::{file_stem, summary_file_name, ArtifactStore};
use crate::throttle::{Clock, RateLimitedCaller};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// What one summarization run produced
#[derive(Debug, Default)]
pub struct SummaryReport {
    /// Summary files written, in processing order
    pub written: Vec<PathBuf>,
    /// `(document stem, error message)` for every skipped document
    pub failed: Vec<(String, String)>,
    /// Tokens spent across every call that returned a reply
    pub usage: TokenUsage,
}

/// Summarize every committed document in `source` into `dest`.
///
/// Documents are processed in file-name order. A failed document is logged
/// and recorded; the run moves on to the next one.
pub async fn summarize_documents<S, C>(
    summarizer: &S,
    caller: &mut RateLimitedCaller<C>,
    source: &ArtifactStore,
    dest: &ArtifactStore,
) -> Result<SummaryReport>
where
    S: Summarizer + ?Sized,
    C: Clock,
{
    let documents = source.documents()?;
    if documents.is_empty() {
        return Err(DigestError::EmptyBatch(format!(
            "no .txt documents in {}",
            source.root().display()
        )));
    }

    let total = documents.len();
    info!(total = total, "Starting summarization");

    let mut report = SummaryReport::default();
    for (idx, path) in documents.iter().enumerate() {
        let stem = file_stem(path);
        match summarize_one(summarizer, caller, path, &stem, dest, &mut report.usage).await {
            Ok(written) => {
                info!(id = %stem, progress = %format!("{}/{}", idx + 1, total), "Summary written");
                report.written.push(written);
                caller.pace().await;
            }
            Err(e) => {
                error!(id = %stem, error = %e, "Summarization failed, skipping");
                report.failed.push((stem, e.to_string()));
            }
        }
    }

    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        total_tokens = report.usage.total_tokens,
        "Summarization complete"
    );
    Ok(report)
}

async fn summarize_one<S, C>(
    summarizer: &S,
    caller: &mut RateLimitedCaller<C>,
    path: &Path,
    stem: &str,
    dest: &ArtifactStore,
    usage: &mut TokenUsage,
) -> Result<PathBuf>
where
    S: Summarizer + ?Sized,
    C: Clock,
{
    let article = std::fs::read_to_string(path)?;
    let (reply, spent) = caller.call(|| summarizer.summarize(&article)).await?;
    usage.add(&spent);

    let summary: serde_json::Value = serde_json::from_str(extract_json(&reply))
        .map_err(|e| DigestError::remote("gemini", format!("reply is not JSON: {}", e)))?;

    dest.write(&summary_file_name(stem), &serde_json::to_string_pretty(&summary)?)
}
