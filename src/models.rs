//! Work items and extracted documents shared by every stage.

use serde::{Deserialize, Serialize};

/// Minimum size of a committed article text, in bytes.
pub const MIN_DOCUMENT_BYTES: u64 = 4096;

/// One article to scrape, summarize and upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier (DOI suffix), also the output file stem
    pub id: String,
    /// Publisher article URL, without any proxy prefix
    pub url: String,
    /// Article title
    pub title: String,
    /// Journal or venue name
    pub venue: String,
    /// Cover date as reported by the search API
    pub date: String,
    /// First author
    pub first_author: String,
}

impl WorkItem {
    /// Derive the item identifier from a DOI: everything after the last `/`.
    pub fn id_from_doi(doi: &str) -> String {
        doi.trim()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// Article text produced by one successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub item: WorkItem,
    /// Cleaned section texts in document order
    pub sections: Vec<String>,
}

impl ExtractedDocument {
    pub fn new(item: WorkItem, sections: Vec<String>) -> Self {
        Self { item, sections }
    }

    /// Render the metadata header followed by every section, blank-line separated.
    pub fn render(&self) -> String {
        let header = [
            format!("Title: {}", self.item.title),
            format!("Journal: {}", self.item.venue),
            format!("Cover Date: {}", self.item.date),
            format!("URL: {}", self.item.url),
            format!("First Author: {}", self.item.first_author),
        ];

        header
            .into_iter()
            .chain(self.sections.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem {
            id: "j.enbuild.2024.114082".to_string(),
            url: "https://www.sciencedirect.com/science/article/pii/S0378778824001981".to_string(),
            title: "Occupant behaviour in office buildings".to_string(),
            venue: "Energy and Buildings".to_string(),
            date: "2024-04-01".to_string(),
            first_author: "Kim J.".to_string(),
        }
    }

    #[test]
    fn test_id_from_doi() {
        assert_eq!(
            WorkItem::id_from_doi("10.1016/j.enbuild.2024.114082"),
            "j.enbuild.2024.114082"
        );
        assert_eq!(WorkItem::id_from_doi("plain"), "plain");
    }

    #[test]
    fn test_render_keeps_section_order() {
        let doc = ExtractedDocument::new(
            item(),
            vec!["Introduction text.".to_string(), "Methods text.".to_string()],
        );
        let text = doc.render();
        assert!(text.starts_with("Title: Occupant behaviour in office buildings\n\nJournal:"));
        assert!(text.contains("First Author: Kim J.\n\nIntroduction text.\n\nMethods text."));
    }
}
