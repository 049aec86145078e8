//! Fetch-and-validate worker: one article, one live session.

use crate::delay::DelayPolicy;
use crate::error::{DigestError, Result};
use crate::extract::ArticleExtractor;
use crate::models::{ExtractedDocument, WorkItem, MIN_DOCUMENT_BYTES};
use crate::session::LibrarySession;
use crate::storage::{ArtifactStore, StagedArtifact};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// A validated document whose text is staged on disk awaiting commit
#[derive(Debug)]
pub struct StagedDocument {
    pub document: ExtractedDocument,
    pub artifact: StagedArtifact,
}

/// Fetches and validates one work item using a session of type `S`.
#[async_trait]
pub trait Fetcher<S: Send + Sync>: Send + Sync {
    async fn fetch(&self, session: &S, item: &WorkItem) -> Result<StagedDocument>;
}

/// Production worker against the proxied publisher site
pub struct ArticleWorker {
    extractor: ArticleExtractor,
    delay: Box<dyn DelayPolicy>,
    store: ArtifactStore,
    content_wait: Duration,
    min_bytes: u64,
}

impl ArticleWorker {
    pub fn new(
        store: ArtifactStore,
        delay: Box<dyn DelayPolicy>,
        content_wait: Duration,
    ) -> Result<Self> {
        Ok(Self {
            extractor: ArticleExtractor::new()?,
            delay,
            store,
            content_wait,
            min_bytes: MIN_DOCUMENT_BYTES,
        })
    }

    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Extract, stage and size-check a fetched page.
    ///
    /// An undersized document's staging file is deleted before the error is
    /// returned.
    pub fn process_page(&self, item: &WorkItem, html: &str) -> Result<StagedDocument> {
        let sections = self
            .extractor
            .extract_sections(html)
            .ok_or_else(|| DigestError::ContentNotFound {
                id: item.id.clone(),
            })?;

        let document = ExtractedDocument::new(item.clone(), sections);
        let artifact = self.store.stage(&item.id, &document.render())?;

        if artifact.bytes < self.min_bytes {
            let bytes = artifact.bytes;
            self.store.discard(artifact)?;
            warn!(id = %item.id, bytes = bytes, min = self.min_bytes, "Possible incomplete content");
            return Err(DigestError::UndersizedDocument {
                id: item.id.clone(),
                bytes,
                min: self.min_bytes,
            });
        }

        Ok(StagedDocument { document, artifact })
    }
}

#[async_trait]
impl Fetcher<LibrarySession> for ArticleWorker {
    async fn fetch(&self, session: &LibrarySession, item: &WorkItem) -> Result<StagedDocument> {
        let page = tokio::time::timeout(self.content_wait, session.get_html(&item.url)).await;

        // Taken for every request, whatever it returned
        let delay = self.delay.next_delay();
        debug!(id = %item.id, delay_ms = delay.as_millis() as u64, "Anti-automation pause");
        tokio::time::sleep(delay).await;

        let html = match page {
            Ok(result) => result?,
            Err(_) => {
                debug!(id = %item.id, wait_secs = self.content_wait.as_secs_f64(), "Page did not arrive in time");
                return Err(DigestError::ContentNotFound {
                    id: item.id.clone(),
                });
            }
        };

        self.process_page(item, &html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::NoDelay;
    use tempfile::TempDir;

    fn item() -> WorkItem {
        WorkItem {
            id: "j.buildenv.2024.111".to_string(),
            url: "https://www.sciencedirect.com/science/article/pii/S0360132324001234".to_string(),
            title: "Thermal comfort in classrooms".to_string(),
            venue: "Building and Environment".to_string(),
            date: "2024-03-15".to_string(),
            first_author: "Park S.".to_string(),
        }
    }

    fn page(paragraphs: usize) -> String {
        let body = "<p>Students reported warm conditions during afternoon lessons.</p>".repeat(paragraphs);
        format!(
            r#"<html><body><div id="body"><div><section><h2>Results</h2>{}</section></div></div></body></html>"#,
            body
        )
    }

    fn worker(dir: &TempDir) -> ArticleWorker {
        let store = ArtifactStore::new(dir.path()).expect("store");
        ArticleWorker::new(store, Box::new(NoDelay), Duration::from_secs(1)).expect("worker")
    }

    #[test]
    fn test_full_article_is_staged() {
        let dir = TempDir::new().expect("tempdir");
        let staged = worker(&dir).process_page(&item(), &page(120)).expect("valid article");
        assert!(staged.artifact.bytes >= MIN_DOCUMENT_BYTES);
        assert!(staged.artifact.path.exists());
        assert_eq!(staged.document.sections.len(), 1);
    }

    #[test]
    fn test_undersized_article_leaves_no_artifact() {
        let dir = TempDir::new().expect("tempdir");
        let err = worker(&dir)
            .process_page(&item(), &page(3))
            .expect_err("too short");
        assert!(matches!(err, DigestError::UndersizedDocument { ref id, .. } if id == "j.buildenv.2024.111"));
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn test_missing_region_is_content_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let err = worker(&dir)
            .process_page(&item(), "<html><body>Session expired</body></html>")
            .expect_err("no region");
        assert!(matches!(err, DigestError::ContentNotFound { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn test_custom_threshold() {
        let dir = TempDir::new().expect("tempdir");
        let staged = worker(&dir)
            .with_min_bytes(64)
            .process_page(&item(), &page(1))
            .expect("small threshold");
        assert!(staged.artifact.bytes >= 64);
    }
}
