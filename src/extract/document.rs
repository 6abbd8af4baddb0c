//! Parsed HTML page with the text helpers extraction and block detection share

use scraper::{ElementRef, Html, Selector};
use std::cell::OnceCell;
use url::Url;

/// Elements whose text is never visible to a reader
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// A parsed page plus the URL it was fetched from
///
/// Lives only for the processing of one request.
pub struct PageDocument {
    html: Html,
    url: Url,
    blank: bool,
    body_text: OnceCell<String>,
}

impl PageDocument {
    /// Parses raw HTML fetched from `url`
    pub fn parse(body: &str, url: Url) -> Self {
        Self {
            html: Html::parse_document(body),
            url,
            blank: body.trim().is_empty(),
            body_text: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// True when the fetched body had no content at all
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    /// The trimmed `<title>` text, if present and non-empty
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;

        self.html
            .select(&selector)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
    }

    /// Visible body text with whitespace collapsed
    ///
    /// Text inside script, style, noscript and template elements is skipped.
    pub fn body_text(&self) -> &str {
        self.body_text.get_or_init(|| {
            let root = Selector::parse("body")
                .ok()
                .and_then(|s| self.html.select(&s).next())
                .unwrap_or_else(|| self.html.root_element());

            let mut pieces = Vec::new();
            for node in root.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };

                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| e.name()))
                    .is_some_and(|name| INVISIBLE_ELEMENTS.contains(&name));

                if !hidden {
                    pieces.push(&**text);
                }
            }

            collapse_whitespace(&pieces.join(" "))
        })
    }

    /// Iterates over elements matching `selector` in document order
    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> {
        self.html.select(selector)
    }
}

/// Text content of an element with whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
