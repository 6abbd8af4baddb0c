//! Selector Resolver
//!
//! Each record field is located through an ordered chain of named strategies.
//! The chain is evaluated front to back and stops at the first strategy that
//! yields non-empty trimmed text, so later (more generic) strategies are never
//! consulted once an earlier one matches.

use crate::extract::document::{collapse_whitespace, element_text, PageDocument};
use crate::extract::profile::{compile_pattern, Field, StrategySpec};
use crate::extract::ExtractionError;
use regex::Regex;
use scraper::Selector;
use std::collections::BTreeMap;

/// A single way of locating a value on a page
pub trait LocateStrategy: Send + Sync {
    /// Name used in logs when this strategy wins
    fn name(&self) -> &str;

    /// Returns the located raw text, if any
    fn locate(&self, page: &PageDocument) -> Option<String>;
}

/// A value located on a page and the strategy that found it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub value: String,
    pub strategy: String,
}

/// CSS selector strategy with optional keyword anchor or pattern
pub struct CssStrategy {
    name: String,
    selector: Selector,
    attr: Option<String>,
    contains: Option<String>,
    pattern: Option<Regex>,
}

impl CssStrategy {
    pub fn new(name: &str, css: &str) -> Result<Self, ExtractionError> {
        Ok(Self {
            name: name.to_string(),
            selector: compile_selector(name, css)?,
            attr: None,
            contains: None,
            pattern: None,
        })
    }

    /// Reads an attribute instead of the element text
    pub fn attr(mut self, attr: &str) -> Self {
        self.attr = Some(attr.to_string());
        self
    }

    /// Only accepts elements whose text contains `keyword` (case-insensitive)
    pub fn containing(mut self, keyword: &str) -> Self {
        self.contains = Some(keyword.to_lowercase());
        self
    }

    /// Only accepts elements whose text matches; the first capture group is returned
    pub fn matching(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

impl LocateStrategy for CssStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, page: &PageDocument) -> Option<String> {
        for element in page.select(&self.selector) {
            let text = match &self.attr {
                Some(attr) => match element.value().attr(attr) {
                    Some(value) => collapse_whitespace(value),
                    None => continue,
                },
                None => element_text(element),
            };

            if text.is_empty() {
                continue;
            }

            if let Some(keyword) = &self.contains {
                if !text.to_lowercase().contains(keyword.as_str()) {
                    continue;
                }
            }

            match &self.pattern {
                Some(pattern) => {
                    if let Some(captured) = first_capture(pattern, &text) {
                        return Some(captured);
                    }
                }
                None => return Some(text),
            }
        }

        None
    }
}

/// Regex strategy over the page's visible body text
pub struct PatternStrategy {
    name: String,
    pattern: Regex,
}

impl PatternStrategy {
    pub fn new(name: &str, pattern: &str) -> Result<Self, ExtractionError> {
        Ok(Self {
            name: name.to_string(),
            pattern: compile_pattern(name, pattern)?,
        })
    }
}

impl LocateStrategy for PatternStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, page: &PageDocument) -> Option<String> {
        first_capture(&self.pattern, page.body_text())
    }
}

/// Strategy backed by an arbitrary function
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&PageDocument) -> Option<String> + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> LocateStrategy for FnStrategy<F>
where
    F: Fn(&PageDocument) -> Option<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, page: &PageDocument) -> Option<String> {
        (self.f)(page)
    }
}

/// Ordered strategies for one field
pub struct FieldChain {
    field: Field,
    strategies: Vec<Box<dyn LocateStrategy>>,
}

impl FieldChain {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// Appends a strategy; it will be tried after all earlier ones
    pub fn push(&mut self, strategy: Box<dyn LocateStrategy>) {
        self.strategies.push(strategy);
    }

    /// Builder form of [`FieldChain::push`]
    pub fn with(mut self, strategy: impl LocateStrategy + 'static) -> Self {
        self.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Evaluates strategies in order, stopping at the first non-empty result
    pub fn resolve(&self, page: &PageDocument) -> Option<Located> {
        self.strategies.iter().find_map(|strategy| {
            let value = strategy.locate(page)?;
            let value = value.trim();
            if value.is_empty() {
                return None;
            }

            tracing::trace!(
                "{} located by strategy '{}'",
                self.field.as_str(),
                strategy.name()
            );
            Some(Located {
                value: value.to_string(),
                strategy: strategy.name().to_string(),
            })
        })
    }
}

/// Collects the text of every element matched by a list of selectors
///
/// Used for multi-valued fields such as feature lists. Items are trimmed,
/// empty ones dropped, and each distinct item kept once in page order.
#[derive(Debug, Clone, Default)]
pub struct ItemList {
    selectors: Vec<Selector>,
}

impl ItemList {
    pub fn from_selectors(rule: &str, selectors: &[String]) -> Result<Self, ExtractionError> {
        let mut compiled = Vec::with_capacity(selectors.len());
        for css in selectors {
            compiled.push(compile_selector(rule, css)?);
        }
        Ok(Self {
            selectors: compiled,
        })
    }

    pub fn collect(&self, page: &PageDocument) -> Vec<String> {
        let mut items: Vec<String> = Vec::new();

        for selector in &self.selectors {
            for element in page.select(selector) {
                let text = element_text(element);
                if !text.is_empty() && !items.contains(&text) {
                    items.push(text);
                }
            }
        }

        items
    }
}

/// Field chains for a whole record
#[derive(Default)]
pub struct SelectorResolver {
    chains: BTreeMap<Field, FieldChain>,
}

impl SelectorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a chain, replacing any previous chain for the same field
    pub fn insert(&mut self, chain: FieldChain) {
        self.chains.insert(chain.field(), chain);
    }

    /// Locates `field` on the page; None if the field has no chain or nothing matched
    pub fn resolve(&self, field: Field, page: &PageDocument) -> Option<Located> {
        self.chains.get(&field)?.resolve(page)
    }

    /// Convenience wrapper returning only the located text
    pub fn resolve_value(&self, field: Field, page: &PageDocument) -> Option<String> {
        self.resolve(field, page).map(|located| located.value)
    }
}

impl StrategySpec {
    /// Compiles this spec into a runnable strategy
    pub fn compile(&self) -> Result<Box<dyn LocateStrategy>, ExtractionError> {
        match (&self.css, &self.pattern) {
            (Some(css), pattern) => {
                let mut strategy = CssStrategy::new(&self.name, css)?;
                if let Some(attr) = &self.attr {
                    strategy = strategy.attr(attr);
                }
                if let Some(keyword) = &self.contains {
                    strategy = strategy.containing(keyword);
                }
                if let Some(pattern) = pattern {
                    strategy = strategy.matching(compile_pattern(&self.name, pattern)?);
                }
                Ok(Box::new(strategy))
            }
            (None, Some(pattern)) => Ok(Box::new(PatternStrategy::new(&self.name, pattern)?)),
            (None, None) => Err(ExtractionError::EmptyRule {
                rule: self.name.clone(),
            }),
        }
    }
}

pub(crate) fn compile_selector(rule: &str, css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        rule: rule.to_string(),
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// First capture group of the first match, or the whole match without groups
fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    let captures = pattern.captures(text)?;
    let matched = captures.get(1).or_else(|| captures.get(0))?;
    let value = matched.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}
