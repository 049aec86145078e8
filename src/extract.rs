//! Article HTML to plain-text extraction.
//!
//! Pulls the top-level `<section>` elements out of the publisher's content
//! region, drops inline reference links and figures, and normalises the text.

use crate::error::{DigestError, Result};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// CSS selector of the article body container
pub const CONTENT_SELECTOR: &str = "#body > div";

/// Elements removed before text conversion: inline citation links and figures
pub const NOISE_SELECTOR: &str = "a.anchor.anchor-primary, figure";

/// Citation and whitespace normalisation.
#[derive(Debug)]
pub struct TextCleaner {
    citations: Regex,
    empty_brackets: Regex,
    whitespace: Regex,
    punctuation: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| DigestError::Parse(e.to_string()));
        Ok(Self {
            citations: compile(r"\[\d+(?:,\d+)*\]")?,
            // Brackets left behind once the linked numbers are gone: "[ , ]", "[]"
            empty_brackets: compile(r"\[\s*(?:,\s*)*\s*\]")?,
            whitespace: compile(r"\s+")?,
            punctuation: compile(r"\s+([.,;!?])")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let text = self.citations.replace_all(text, "");
        let text = self.empty_brackets.replace_all(&text, "");
        let text = self.whitespace.replace_all(&text, " ");
        let text = self.punctuation.replace_all(&text, "$1");
        text.trim().to_string()
    }
}

/// Compiled selectors plus the text cleaner.
#[derive(Debug)]
pub struct ArticleExtractor {
    content: Selector,
    section: Selector,
    noise: Selector,
    cleaner: TextCleaner,
}

impl ArticleExtractor {
    pub fn new() -> Result<Self> {
        let parse = |css: &str| Selector::parse(css).map_err(|e| DigestError::Parse(e.to_string()));
        Ok(Self {
            content: parse(CONTENT_SELECTOR)?,
            section: parse("section")?,
            noise: parse(NOISE_SELECTOR)?,
            cleaner: TextCleaner::new()?,
        })
    }

    /// Extract cleaned section texts in document order.
    ///
    /// Returns `None` when the content region is missing; the caller decides
    /// which item that error belongs to.
    pub fn extract_sections(&self, html: &str) -> Option<Vec<String>> {
        let document = Html::parse_document(html);
        let region = document.select(&self.content).next()?;

        let sections = region
            .select(&self.section)
            .filter(|section| is_outermost_section(*section, region))
            .map(|section| {
                let mut parts = Vec::new();
                self.collect_text(section, &mut parts);
                self.cleaner.clean(&parts.join("\n"))
            })
            .filter(|text| !text.is_empty())
            .collect();

        Some(sections)
    }

    /// Depth-first text collection that skips noise subtrees.
    fn collect_text(&self, element: ElementRef<'_>, parts: &mut Vec<String>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        if !self.noise.matches(&child_el) {
                            self.collect_text(child_el, parts);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Nested sections are already covered by their enclosing section.
fn is_outermost_section(section: ElementRef<'_>, region: ElementRef<'_>) -> bool {
    for ancestor in section.ancestors() {
        if ancestor.id() == region.id() {
            return true;
        }
        if ElementRef::wrap(ancestor).is_some_and(|el| el.value().name() == "section") {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ArticleExtractor {
        ArticleExtractor::new().expect("selectors compile")
    }

    #[test]
    fn test_clean_citations_and_spacing() {
        let cleaner = TextCleaner::new().expect("regex compile");
        assert_eq!(
            cleaner.clean("Energy use rose [12] sharply [3,4] .\n\n  Next   sentence ;"),
            "Energy use rose sharply. Next sentence;"
        );
        assert_eq!(cleaner.clean("Shown in [ , ] and []  here ."), "Shown in and here.");
    }

    #[test]
    fn test_missing_region() {
        let html = "<html><body><div id='login'>Please sign in</div></body></html>";
        assert!(extractor().extract_sections(html).is_none());
    }

    #[test]
    fn test_sections_in_order_without_noise() {
        let html = r##"
            <html><body><div id="body"><div>
              <section id="s1"><h2>1. Introduction</h2>
                <p>Buildings consume energy <a class="anchor anchor-primary" href="#b1">[1]</a>.</p>
                <figure><img src="f1.png"/><figcaption>Figure 1. Layout</figcaption></figure>
                <section id="s1.1"><h3>1.1 Scope</h3><p>Nested text.</p></section>
              </section>
              <section id="s2"><h2>2. Methods</h2><p>Survey of 120 offices [4,5] .</p></section>
              <section id="empty"><figure>only a figure</figure></section>
            </div></div></body></html>"##;

        let sections = extractor().extract_sections(html).expect("region present");
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0],
            "1. Introduction Buildings consume energy. 1.1 Scope Nested text."
        );
        assert_eq!(sections[1], "2. Methods Survey of 120 offices.");
    }

    #[test]
    fn test_sections_outside_region_ignored() {
        let html = r#"
            <html><body>
              <section><p>Sidebar</p></section>
              <div id="body"><div><section><p>Body text</p></section></div></div>
            </body></html>"#;
        let sections = extractor().extract_sections(html).expect("region present");
        assert_eq!(sections, vec!["Body text".to_string()]);
    }
}
