use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;

use crate::error::ExtractError;

/// One way of locating a field. Returns `None` when the field is not where
/// this strategy looks; never fails at lookup time.
pub trait FieldStrategy: Send + Sync {
    fn describe(&self) -> String;
    fn lookup(&self, doc: &Html, raw: &str) -> Option<String>;
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Whitespace-normalised text of an element.
pub(crate) fn element_text(el: scraper::ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the element carrying a given `id`.
pub struct ById {
    id: String,
    selector: Selector,
}

impl ById {
    pub fn new(id: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            id: id.to_string(),
            selector: parse_selector(&format!("[id=\"{id}\"]"))?,
        })
    }
}

impl FieldStrategy for ById {
    fn describe(&self) -> String {
        format!("#{}", self.id)
    }

    fn lookup(&self, doc: &Html, _raw: &str) -> Option<String> {
        doc.select(&self.selector).next().map(element_text)
    }
}

/// Text of the `nth` element matching a CSS selector.
pub struct Css {
    css: String,
    nth: usize,
    selector: Selector,
}

impl Css {
    pub fn first(css: &str) -> Result<Self, ExtractError> {
        Self::nth(css, 0)
    }

    pub fn nth(css: &str, nth: usize) -> Result<Self, ExtractError> {
        Ok(Self {
            css: css.to_string(),
            nth,
            selector: parse_selector(css)?,
        })
    }
}

impl FieldStrategy for Css {
    fn describe(&self) -> String {
        format!("{}[{}]", self.css, self.nth)
    }

    fn lookup(&self, doc: &Html, _raw: &str) -> Option<String> {
        doc.select(&self.selector).nth(self.nth).map(element_text)
    }
}

/// First capture group of a regex run over the raw document text.
pub struct TextPattern {
    pattern: Regex,
}

impl TextPattern {
    pub fn new(pattern: &str) -> Result<Self, ExtractError> {
        Ok(Self { pattern: Regex::new(pattern)? })
    }
}

impl FieldStrategy for TextPattern {
    fn describe(&self) -> String {
        format!("/{}/", self.pattern.as_str())
    }

    fn lookup(&self, _doc: &Html, raw: &str) -> Option<String> {
        self.pattern
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Ordered strategies for one field; the first non-empty answer wins.
pub struct FieldChain {
    field: &'static str,
    strategies: Vec<Box<dyn FieldStrategy>>,
}

impl FieldChain {
    pub fn new(field: &'static str) -> Self {
        Self { field, strategies: Vec::new() }
    }

    pub fn then(mut self, strategy: impl FieldStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn resolve(&self, doc: &Html, raw: &str) -> Option<String> {
        for strategy in &self.strategies {
            if let Some(value) = strategy.lookup(doc, raw) {
                let value = value.trim();
                if !value.is_empty() {
                    trace!(field = self.field, via = %strategy.describe(), value, "field resolved");
                    return Some(value.to_string());
                }
            }
        }
        trace!(field = self.field, "field not found");
        None
    }

    /// Resolve and parse; an unparsable value counts as missing.
    pub fn resolve_parsed<T: std::str::FromStr>(&self, doc: &Html, raw: &str) -> Option<T> {
        self.resolve(doc, raw).and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div class="period">3301999</div>
        <div id="times"><b>02</b><b>30</b></div>
        <p id="DADAN"> 7 </p>
    </body></html>"#;

    #[test]
    fn falls_through_to_next_strategy() {
        let doc = Html::parse_document(PAGE);
        let chain = FieldChain::new("period")
            .then(ById::new("qishu").unwrap())
            .then(Css::first(".period").unwrap());
        assert_eq!(chain.resolve(&doc, PAGE).as_deref(), Some("3301999"));
    }

    #[test]
    fn nth_css_match() {
        let doc = Html::parse_document(PAGE);
        let chain = FieldChain::new("seconds").then(Css::nth("#times b", 1).unwrap());
        assert_eq!(chain.resolve_parsed::<u32>(&doc, PAGE), Some(30));
    }

    #[test]
    fn regex_over_raw_text_is_last_resort() {
        let raw = "倒计时 03分15秒";
        let doc = Html::parse_document(raw);
        let chain = FieldChain::new("minutes")
            .then(Css::first("#times b").unwrap())
            .then(TextPattern::new(r"(\d+)\s*分\s*\d+\s*秒").unwrap());
        assert_eq!(chain.resolve_parsed::<u32>(&doc, raw), Some(3));
    }

    #[test]
    fn empty_and_unparsable_values_are_missing() {
        let raw = r#"<span id="qishu">  </span><span id="mi-num1">x</span>"#;
        let doc = Html::parse_document(raw);
        assert_eq!(FieldChain::new("p").then(ById::new("qishu").unwrap()).resolve(&doc, raw), None);
        let n = FieldChain::new("n").then(ById::new("mi-num1").unwrap());
        assert_eq!(n.resolve_parsed::<i64>(&doc, raw), None);
    }

    #[test]
    fn bad_selector_is_reported() {
        assert!(matches!(Css::first("div[["), Err(ExtractError::Selector { .. })));
        assert!(matches!(TextPattern::new("("), Err(ExtractError::Pattern(_))));
    }
}
