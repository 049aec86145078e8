//! Bounded-retry scraping loop.
//!
//! Items are processed strictly in order, one at a time, against a single
//! session. Any failed attempt closes that session; the next attempt logs in
//! again from scratch. An item that fails `max_retries` times is skipped and
//! the batch continues.

use crate::error::{DigestError, Result};
use crate::models::WorkItem;
use crate::session::SessionProvider;
use crate::storage::ArtifactStore;
use crate::worker::Fetcher;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Default number of attempts per item
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Attempting { attempt: u32 },
    Succeeded { attempts: u32, path: PathBuf },
    Failed { attempts: u32, last_error: String },
}

impl ItemState {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Attempting { attempt } => *attempt,
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Attempt counter for one item. Never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_retries: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempts: 0,
            max_retries: max_retries.max(1),
        }
    }

    /// Start the next attempt; `None` once the budget is spent.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_retries
    }
}

/// Final state of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub state: ItemState,
}

/// Summary of one scraping run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
    pub sessions_opened: u32,
    /// Sessions opened to replace one discarded after a failure
    pub session_recreations: u32,
}

impl BatchReport {
    pub fn committed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, ItemState::Succeeded { .. }))
            .count()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, ItemState::Failed { .. }))
            .map(|o| o.id.as_str())
            .collect()
    }

    pub fn total_attempts(&self) -> u32 {
        self.outcomes.iter().map(|o| o.state.attempts()).sum()
    }
}

/// Drives a [`Fetcher`] over a batch with session recreation on failure.
pub struct RetryOrchestrator<P: SessionProvider, F> {
    provider: P,
    fetcher: F,
    store: ArtifactStore,
    max_retries: u32,
    session: Option<P::Session>,
    replacing_discarded: bool,
    sessions_opened: u32,
    session_recreations: u32,
}

impl<P, F> RetryOrchestrator<P, F>
where
    P: SessionProvider,
    F: Fetcher<P::Session>,
{
    pub fn new(provider: P, fetcher: F, store: ArtifactStore) -> Self {
        Self {
            provider,
            fetcher,
            store,
            max_retries: DEFAULT_MAX_RETRIES,
            session: None,
            replacing_discarded: false,
            sessions_opened: 0,
            session_recreations: 0,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Process every item in order and close the session at the end.
    pub async fn run(mut self, items: &[WorkItem]) -> BatchReport {
        info!(count = items.len(), max_retries = self.max_retries, "Starting scrape batch");

        let mut outcomes = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let state = self.process_item(item).await;
            match &state {
                ItemState::Succeeded { attempts, .. } => {
                    info!(idx = idx + 1, id = %item.id, attempts = attempts, "Article saved");
                }
                ItemState::Failed { attempts, last_error } => {
                    error!(
                        idx = idx + 1,
                        id = %item.id,
                        attempts = attempts,
                        error = %last_error,
                        "Max retries reached, skipping article"
                    );
                }
                _ => {}
            }
            outcomes.push(ItemOutcome {
                id: item.id.clone(),
                state,
            });
        }

        if let Some(session) = self.session.take() {
            self.provider.close(session).await;
        }

        let report = BatchReport {
            outcomes,
            sessions_opened: self.sessions_opened,
            session_recreations: self.session_recreations,
        };
        info!(
            committed = report.committed(),
            failed = report.failed_ids().len(),
            session_recreations = report.session_recreations,
            "Scrape batch complete"
        );
        report
    }

    /// Run one item to a terminal state.
    async fn process_item(&mut self, item: &WorkItem) -> ItemState {
        let mut retry = RetryState::new(self.max_retries);
        let mut state = ItemState::Pending;

        while let Some(attempt) = retry.begin_attempt() {
            state = ItemState::Attempting { attempt };
            debug!(id = %item.id, state = ?state, "Fetching article");
            match self.attempt(item).await {
                Ok(path) => {
                    return ItemState::Succeeded {
                        attempts: attempt,
                        path,
                    };
                }
                Err(e) => {
                    warn!(id = %item.id, attempt = attempt, error = %e, "Attempt failed");
                    self.discard_session().await;
                    state = ItemState::Failed {
                        attempts: attempt,
                        last_error: e.to_string(),
                    };
                }
            }
        }

        state
    }

    async fn attempt(&mut self, item: &WorkItem) -> Result<PathBuf> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.open_session().await?,
        };

        let fetched = self.fetcher.fetch(&session, item).await;
        self.session = Some(session);

        let staged = fetched?;
        self.store.commit(staged.artifact)
    }

    async fn open_session(&mut self) -> Result<P::Session> {
        let session = self.provider.open().await.map_err(|err| match err {
            DigestError::Auth(msg) => DigestError::Auth(msg),
            other => DigestError::Auth(other.to_string()),
        })?;

        self.sessions_opened += 1;
        if self.replacing_discarded {
            self.session_recreations += 1;
            self.replacing_discarded = false;
        }
        Ok(session)
    }

    /// Close the current session; the next attempt must log in again.
    async fn discard_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.provider.close(session).await;
        }
        self.replacing_discarded = true;
    }
}
