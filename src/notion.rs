//! Notion upload stage.
//!
//! Each summary JSON becomes one page in a Notion database: a handful of
//! database properties for filtering plus the full summary as page blocks.
//!
//! API notes:
//! - `Notion-Version: 2022-06-28`, bearer token auth
//! - At most 100 child blocks per create/append request
//! - At most 2000 characters per rich text object

use crate::error::{DigestError, Result};
use crate::storage::{file_stem, ArtifactStore, SUMMARY_SUFFIX};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

/// Notion REST API root
pub const NOTION_API_URL: &str = "https://api.notion.com/v1";

const NOTION_VERSION: &str = "2022-06-28";

/// Maximum child blocks accepted by one request
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Maximum characters in one rich text object
pub const MAX_RICH_TEXT_CHARS: usize = 2000;

const SERVICE: &str = "notion";

/// Summary sections rendered as page content, with their page headings
const CONTENT_SECTIONS: &[(&str, &str)] = &[
    ("Abstract", "Abstract"),
    ("Research Gap Or Problem Statement", "1. Research Gap and Problem Statement"),
    ("Methodology", "2. Methodology"),
    ("Experiment", "3. Experiment"),
    ("Results And Discussions", "4. Results and Discussions"),
    ("Contribution", "5. Contribution"),
];

/// Page operations used by the uploader.
#[async_trait]
pub trait PageApi: Send + Sync {
    /// Create a database page and return its id
    async fn create_page(
        &self,
        database_id: &str,
        properties: Map<String, Value>,
        children: Vec<Value>,
    ) -> Result<String>;

    /// Append blocks to an existing page, in order
    async fn append_children(&self, block_id: &str, children: Vec<Value>) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

/// Notion API client
pub struct NotionClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: NOTION_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        debug!(method = %method, url = %url, "Notion request");

        let response = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| DigestError::remote(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DigestError::remote(
                SERVICE,
                format!("{} - {}", status, error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DigestError::remote(SERVICE, format!("unreadable response: {}", e)))
    }

    /// Create the summary database under a parent page and return its id.
    pub async fn create_database(&self, parent_page_id: &str, title: &str) -> Result<String> {
        let body = json!({
            "parent": {"type": "page_id", "page_id": parent_page_id},
            "title": [{"type": "text", "text": {"content": title}}],
            "properties": {
                "Title": {"title": {}},
                "Journal": {"select": {}},
                "Publication Date": {"date": {}},
                "Keywords": {"multi_select": {}},
                "URL": {"url": {}},
                "Research Gap": {"rich_text": {}},
                "Objective": {"rich_text": {}},
                "Research Design": {"rich_text": {}},
                "Comparative Analysis": {"rich_text": {}},
                "Implications": {"rich_text": {}},
            }
        });

        let created: CreatedObject = serde_json::from_value(
            self.send(reqwest::Method::POST, "databases", body).await?,
        )?;
        info!(database_id = %created.id, title = title, "Created Notion database");
        Ok(created.id)
    }
}

#[async_trait]
impl PageApi for NotionClient {
    async fn create_page(
        &self,
        database_id: &str,
        properties: Map<String, Value>,
        children: Vec<Value>,
    ) -> Result<String> {
        let body = json!({
            "parent": {"database_id": database_id},
            "properties": properties,
            "children": children,
        });
        let created: CreatedObject =
            serde_json::from_value(self.send(reqwest::Method::POST, "pages", body).await?)?;
        Ok(created.id)
    }

    async fn append_children(&self, block_id: &str, children: Vec<Value>) -> Result<()> {
        let path = format!("blocks/{}/children", block_id);
        self.send(reqwest::Method::PATCH, &path, json!({ "children": children }))
            .await?;
        Ok(())
    }
}

/// Split text into rich text objects of at most [`MAX_RICH_TEXT_CHARS`] each.
pub fn rich_text(content: &str) -> Vec<Value> {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(MAX_RICH_TEXT_CHARS)
        .map(|chunk| {
            let segment: String = chunk.iter().collect();
            json!({"type": "text", "text": {"content": segment}})
        })
        .collect()
}

/// "Month Day, Year" to an ISO date
fn convert_date(date: &str) -> Option<String> {
    NaiveDate::parse_from_str(date.trim(), "%B %d, %Y")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Select option names may not contain commas
fn option_name(value: &str) -> String {
    value.replace(',', "").trim().to_string()
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// A string as-is, or a list rendered as "- item" lines
fn text_or_bullets(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .filter_map(scalar_text)
                .map(|item| format!("- {}", item))
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        other => scalar_text(other),
    }
}

/// Database properties for one summary. Fails if the summary has no title.
pub fn build_properties(summary: &Value) -> Result<Map<String, Value>> {
    let title = summary
        .get("Title")
        .and_then(scalar_text)
        .ok_or_else(|| DigestError::Validation("summary has no Title".to_string()))?;

    let mut properties = Map::new();
    properties.insert("Title".to_string(), json!({ "title": rich_text(&title) }));

    if let Some(journal) = summary.get("Journal").and_then(scalar_text) {
        properties.insert(
            "Journal".to_string(),
            json!({"select": {"name": option_name(&journal)}}),
        );
    }

    if let Some(date) = summary
        .get("Publication Date")
        .and_then(Value::as_str)
        .and_then(convert_date)
    {
        properties.insert(
            "Publication Date".to_string(),
            json!({"date": {"start": date}}),
        );
    }

    if let Some(keywords) = summary.get("Keywords").and_then(Value::as_array) {
        let options: Vec<Value> = keywords
            .iter()
            .filter_map(scalar_text)
            .map(|k| json!({"name": option_name(&k)}))
            .collect();
        if !options.is_empty() {
            properties.insert("Keywords".to_string(), json!({ "multi_select": options }));
        }
    }

    if let Some(url) = summary.get("DOI or URL").and_then(scalar_text) {
        properties.insert("URL".to_string(), json!({ "url": url }));
    }

    let text_properties = [
        ("Research Gap", summary.pointer("/Research Gap Or Problem Statement/Research Gap")),
        ("Objective", summary.get("Objective")),
        ("Research Design", summary.pointer("/Methodology/Research Design")),
        ("Comparative Analysis", summary.pointer("/Experiment/Comparative Analysis")),
        ("Implications", summary.pointer("/Results And Discussions/Implications")),
    ];
    for (name, value) in text_properties {
        if let Some(text) = value.and_then(text_or_bullets) {
            properties.insert(name.to_string(), json!({ "rich_text": rich_text(&text) }));
        }
    }

    Ok(properties)
}

fn heading(text: &str, level: usize) -> Value {
    text_block(&format!("heading_{}", level.clamp(1, 3)), text)
}

fn text_block(kind: &str, text: &str) -> Value {
    json!({ "type": kind, kind: {"rich_text": rich_text(text)} })
}

/// Objects become headings, lists become bullets, scalars become paragraphs.
fn nested_blocks(value: &Value, level: usize, blocks: &mut Vec<Value>) {
    match value {
        Value::Object(fields) => {
            for (key, inner) in fields {
                if key.trim().is_empty() {
                    continue;
                }
                blocks.push(heading(key, level));
                nested_blocks(inner, level + 1, blocks);
            }
        }
        Value::Array(items) => {
            blocks.extend(
                items
                    .iter()
                    .filter_map(scalar_text)
                    .map(|item| text_block("bulleted_list_item", &item)),
            );
        }
        other => {
            if let Some(text) = scalar_text(other) {
                blocks.push(text_block("paragraph", &text));
            }
        }
    }
}

fn is_empty_section(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Page content blocks for one summary, in section order.
pub fn build_children(summary: &Value) -> Vec<Value> {
    let mut blocks = Vec::new();
    for (key, title) in CONTENT_SECTIONS {
        let Some(section) = summary.get(*key).filter(|v| !is_empty_section(v)) else {
            continue;
        };
        blocks.push(heading(title, 2));
        nested_blocks(section, 3, &mut blocks);
    }
    blocks
}

/// Create one page for a summary, appending overflow blocks in order.
///
/// Issues `ceil(blocks / 100)` requests (at least one): the first chunk goes
/// with page creation, every later chunk is appended to the new page.
pub async fn upload_summary<A>(api: &A, database_id: &str, summary: &Value) -> Result<String>
where
    A: PageApi + ?Sized,
{
    let properties = build_properties(summary)?;
    let mut children = build_children(summary);
    if children.is_empty() {
        debug!("Summary produced no content blocks");
    }

    let overflow = children.split_off(children.len().min(MAX_BLOCKS_PER_REQUEST));
    let page_id = api.create_page(database_id, properties, children).await?;

    for (idx, chunk) in overflow.chunks(MAX_BLOCKS_PER_REQUEST).enumerate() {
        debug!(page_id = %page_id, chunk = idx + 1, blocks = chunk.len(), "Appending blocks");
        api.append_children(&page_id, chunk.to_vec()).await?;
    }

    Ok(page_id)
}

async fn upload_file<A>(api: &A, database_id: &str, path: &Path) -> Result<String>
where
    A: PageApi + ?Sized,
{
    let summary: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    upload_summary(api, database_id, &summary).await
}

/// What one upload run produced
#[derive(Debug, Default)]
pub struct UploadReport {
    /// `(summary id, page id)` for every created page
    pub created: Vec<(String, String)>,
    /// `(summary id, error message)` for every skipped summary
    pub failed: Vec<(String, String)>,
}

/// Upload every `*_summary.json` in `store` as a page in `database_id`.
pub async fn upload_summaries<A>(
    api: &A,
    database_id: &str,
    store: &ArtifactStore,
) -> Result<UploadReport>
where
    A: PageApi + ?Sized,
{
    let files = store.list(SUMMARY_SUFFIX)?;
    if files.is_empty() {
        return Err(DigestError::EmptyBatch(format!(
            "no summaries in {}",
            store.root().display()
        )));
    }

    info!(total = files.len(), database_id = database_id, "Starting Notion upload");
    let mut report = UploadReport::default();

    for path in &files {
        let stem = file_stem(path);
        let id = stem.strip_suffix("_summary").unwrap_or(&stem).to_string();

        match upload_file(api, database_id, path).await {
            Ok(page_id) => {
                info!(id = %id, page_id = %page_id, "Created Notion page");
                report.created.push((id, page_id));
            }
            Err(e) => {
                error!(id = %id, error = %e, "Notion upload failed, skipping");
                report.failed.push((id, e.to_string()));
            }
        }
    }

    info!(
        created = report.created.len(),
        failed = report.failed.len(),
        "Notion upload complete"
    );
    Ok(report)
}
