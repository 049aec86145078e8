//! Elsevier Scopus search client.
//!
//! Runs one query against the Scopus Search API and turns every entry that
//! carries a ScienceDirect PII into a [`WorkItem`].
//!
//! API notes:
//! - `X-ELS-APIKey` header authenticates the request
//! - `start`/`count` paginate; Scopus refuses `start` beyond 5000
//! - An empty result set comes back as a single entry with an `error` field

use crate::config::ElsevierConfig;
use crate::error::{DigestError, OptionExt, Result};
use crate::models::WorkItem;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Scopus Search API endpoint
const SCOPUS_SEARCH_URL: &str = "https://api.elsevier.com/content/search/scopus";

/// ScienceDirect article URL prefix, completed with the PII
pub const SCIENCEDIRECT_ARTICLE_URL: &str = "https://www.sciencedirect.com/science/article/pii/";

/// Scopus will not page past this offset
const MAX_START: usize = 5000;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "search-results")]
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(rename = "opensearch:totalResults", default)]
    total_results: Option<String>,
    #[serde(default)]
    entry: Vec<ScopusEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    pii: Option<String>,
    #[serde(rename = "prism:doi", default)]
    doi: Option<String>,
    #[serde(rename = "dc:title", default)]
    title: Option<String>,
    #[serde(rename = "prism:publicationName", default)]
    publication_name: Option<String>,
    #[serde(rename = "prism:coverDate", default)]
    cover_date: Option<String>,
    #[serde(rename = "dc:creator", default)]
    creator: Option<String>,
}

/// Run the configured query and return every article with a PII and DOI.
pub async fn search(config: &ElsevierConfig) -> Result<Vec<WorkItem>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {}", e)))?;

    info!(query = %config.query, "Starting Scopus search");

    let mut items = Vec::new();
    let mut start = 0usize;
    let limit = config.max_results.unwrap_or(usize::MAX);

    loop {
        let url = build_search_url(&config.query, start, config.page_size)?;
        debug!(start = start, url = %url, "Fetching Scopus page");

        let page = fetch_page(&client, &url, &config.api_key).await?;
        let total = page
            .results
            .total_results
            .as_deref()
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_parse("Scopus response has no opensearch:totalResults")?;
        let returned = page.results.entry.len();

        items.extend(parse_entries(page.results.entry));

        start += returned;
        if returned == 0 || start >= total || start >= limit {
            break;
        }
        if start >= MAX_START {
            warn!(total = total, "Scopus paging limit reached, remaining results skipped");
            break;
        }
    }

    items.truncate(limit);
    info!(total = items.len(), "Scopus search complete");
    Ok(items)
}

fn build_search_url(query: &str, start: usize, count: usize) -> Result<Url> {
    let mut url = Url::parse(SCOPUS_SEARCH_URL)
        .map_err(|e| DigestError::Config(format!("Invalid search URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("query", query)
        .append_pair("start", &start.to_string())
        .append_pair("count", &count.to_string());
    Ok(url)
}

async fn fetch_page(client: &Client, url: &Url, api_key: &str) -> Result<SearchResponse> {
    let response = client
        .get(url.as_str())
        .header("X-ELS-APIKey", api_key)
        .header("Accept", "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(DigestError::Api {
            code: status.as_u16() as i32,
            message: format!("Scopus API error: {} - {}", status, error_text),
        });
    }

    response
        .json()
        .await
        .map_err(|e| DigestError::Parse(format!("Failed to parse Scopus response: {}", e)))
}

/// Keep entries that can be fetched from ScienceDirect.
fn parse_entries(entries: Vec<ScopusEntry>) -> Vec<WorkItem> {
    entries
        .into_iter()
        .filter(|e| e.error.is_none())
        .filter_map(|e| {
            let pii = e.pii.filter(|p| !p.trim().is_empty())?;
            let doi = e.doi.filter(|d| !d.trim().is_empty())?;
            Some(WorkItem {
                id: WorkItem::id_from_doi(&doi),
                url: format!("{}{}", SCIENCEDIRECT_ARTICLE_URL, pii.trim()),
                title: e.title.unwrap_or_default(),
                venue: e.publication_name.unwrap_or_default(),
                date: e.cover_date.unwrap_or_default(),
                first_author: e.creator.unwrap_or_default(),
            })
        })
        .collect()
}
