//! Content extraction: an ordered chain of named strategies over one page.
mod date;
mod text;

use std::ops::Range;

use chrono::NaiveDate;
use ego_tree::NodeId;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidemark_logging::ingest_debug;

use date::DateFinder;
use text::{element_text, text_around, Normalizer};

pub const DEFAULT_TITLE: &str = "Untitled Article";

/// Name reported for text produced by the whole-document fallback.
pub const WHOLE_DOCUMENT: &str = "whole-document";

/// One configured template revision.
///
/// The first configured template is the current layout; the rest are legacy
/// layouts, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSpec {
    /// First element matching a CSS selector.
    Css { name: String, selector: String },
    /// Markup captured by group 1 of an anchored pattern.
    Regex { name: String, pattern: String },
}

impl TemplateSpec {
    pub fn name(&self) -> &str {
        match self {
            TemplateSpec::Css { name, .. } | TemplateSpec::Regex { name, .. } => name,
        }
    }
}

pub fn default_templates() -> Vec<TemplateSpec> {
    vec![
        TemplateSpec::Css {
            name: "article-content".into(),
            selector: "div.article-content".into(),
        },
        TemplateSpec::Css {
            name: "article-tag".into(),
            selector: "article".into(),
        },
        TemplateSpec::Regex {
            name: "article-comment-block".into(),
            pattern: r"(?is)<!--\s*begin article\s*-->(.*?)<!--\s*end article\s*-->".into(),
        },
    ]
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("template {name}: invalid selector: {reason}")]
    InvalidSelector { name: String, reason: String },
    #[error("template {name}: invalid pattern: {reason}")]
    InvalidPattern { name: String, reason: String },
    #[error("template {name}: pattern needs a capture group for the article block")]
    MissingCaptureGroup { name: String },
    #[error("builtin pattern failed to compile: {0}")]
    Builtin(#[from] regex::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Found in the page.
    Page,
    /// Nothing matched; the run's processing date was used.
    ProcessingDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    pub text: String,
    pub title: String,
    pub date: NaiveDate,
    pub date_source: DateSource,
    /// Name of the strategy that produced `text`.
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Extracted(ExtractedItem),
    /// Nothing reached the content threshold. `best_effort` holds the longest
    /// sub-threshold text seen, if any.
    NoContent { best_effort: Option<String> },
    /// The page was fetched but the source signalled the item is gone.
    Unavailable,
}

/// Meta tags and `<time>` attributes carrying a machine-readable publish date.
const DATE_ATTRIBUTES: &str = r#"meta[property="article:published_time"], meta[name="pubdate"], meta[name="date"], meta[itemprop="datePublished"], time[datetime]"#;

/// Elements whose text is a dateline.
const DATE_ELEMENTS: &str = r#"time, [itemprop="datePublished"], .published, .dateline, .date, .post-date, .entry-date, .article-date"#;

/// Where a strategy's block sits in the page.
enum Region {
    Element(NodeId),
    /// Byte range of the captured block in the raw markup.
    Span(Range<usize>),
}

struct Matched {
    raw: String,
    region: Region,
}

enum Strategy {
    Css { name: String, selector: Selector },
    Block { name: String, pattern: Regex },
}

impl Strategy {
    fn compile(template: &TemplateSpec) -> Result<Self, ExtractError> {
        match template {
            TemplateSpec::Css { name, selector } => {
                let selector =
                    Selector::parse(selector).map_err(|err| ExtractError::InvalidSelector {
                        name: name.clone(),
                        reason: err.to_string(),
                    })?;
                Ok(Strategy::Css {
                    name: name.clone(),
                    selector,
                })
            }
            TemplateSpec::Regex { name, pattern } => {
                let pattern = Regex::new(pattern).map_err(|err| ExtractError::InvalidPattern {
                    name: name.clone(),
                    reason: err.to_string(),
                })?;
                if pattern.captures_len() < 2 {
                    return Err(ExtractError::MissingCaptureGroup { name: name.clone() });
                }
                Ok(Strategy::Block {
                    name: name.clone(),
                    pattern,
                })
            }
        }
    }

    fn name(&self) -> &str {
        match self {
            Strategy::Css { name, .. } | Strategy::Block { name, .. } => name,
        }
    }

    /// Raw text of the matched block, or `None` when the template is absent.
    fn apply(&self, doc: &Html, html: &str) -> Option<Matched> {
        match self {
            Strategy::Css { selector, .. } => {
                let element = doc.select(selector).next()?;
                Some(Matched {
                    raw: element_text(element, false),
                    region: Region::Element(element.id()),
                })
            }
            Strategy::Block { pattern, .. } => {
                let block = pattern.captures(html)?.get(1)?;
                let fragment = Html::parse_fragment(block.as_str());
                Some(Matched {
                    raw: element_text(fragment.root_element(), false),
                    region: Region::Span(block.range()),
                })
            }
        }
    }
}

pub struct ContentExtractor {
    strategies: Vec<Strategy>,
    min_content_chars: usize,
    normalizer: Normalizer,
    dates: DateFinder,
    h1: Option<Selector>,
    title: Option<Selector>,
    body: Option<Selector>,
    date_attributes: Option<Selector>,
    date_elements: Option<Selector>,
}

impl ContentExtractor {
    pub fn new(templates: &[TemplateSpec], min_content_chars: usize) -> Result<Self, ExtractError> {
        let strategies = templates
            .iter()
            .map(Strategy::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            strategies,
            min_content_chars,
            normalizer: Normalizer::new()?,
            dates: DateFinder::new()?,
            h1: Selector::parse("h1").ok(),
            title: Selector::parse("title").ok(),
            body: Selector::parse("body").ok(),
            date_attributes: Selector::parse(DATE_ATTRIBUTES).ok(),
            date_elements: Selector::parse(DATE_ELEMENTS).ok(),
        })
    }

    pub fn is_usable(&self, text: &str) -> bool {
        text.chars().count() >= self.min_content_chars
    }

    /// Run the chain over one page.
    ///
    /// Structural strategies go first, in configured order, and the first one
    /// whose text reaches the threshold wins. The whole-document fallback is
    /// consulted only when no structural strategy matched at all.
    pub fn extract(&self, html: &str, processing_date: NaiveDate) -> ExtractionResult {
        let doc = Html::parse_document(html);
        let mut best_effort: Option<String> = None;
        let mut structural_match = false;

        for strategy in &self.strategies {
            let Some(matched) = strategy.apply(&doc, html) else {
                continue;
            };
            structural_match = true;
            let text = self.normalizer.normalize(&matched.raw);
            if self.is_usable(&text) {
                return ExtractionResult::Extracted(self.finish(
                    &doc,
                    html,
                    Some(&matched.region),
                    text,
                    strategy.name(),
                    processing_date,
                ));
            }
            ingest_debug!(
                "template {} matched with {} chars, below {}",
                strategy.name(),
                text.chars().count(),
                self.min_content_chars
            );
            keep_longest(&mut best_effort, text);
        }

        if !structural_match {
            let text = self.normalizer.normalize(&self.whole_document_text(&doc));
            if self.is_usable(&text) {
                return ExtractionResult::Extracted(self.finish(
                    &doc,
                    html,
                    None,
                    text,
                    WHOLE_DOCUMENT,
                    processing_date,
                ));
            }
            keep_longest(&mut best_effort, text);
        }

        ExtractionResult::NoContent {
            best_effort: best_effort.filter(|text| !text.is_empty()),
        }
    }

    /// `<h1>` first, then `<title>` up to the first `|`.
    pub fn extract_title(&self, doc: &Html) -> String {
        let from = |selector: &Option<Selector>| {
            let selector = selector.as_ref()?;
            let element = doc.select(selector).next()?;
            let raw = element.text().collect::<String>();
            let text = self.normalizer.normalize(&raw).replace('\n', " ");
            Some(text)
        };
        if let Some(h1) = from(&self.h1).filter(|t| !t.is_empty()) {
            return h1;
        }
        from(&self.title)
            .and_then(|t| t.split('|').next().map(|part| part.trim().to_string()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    fn whole_document_text(&self, doc: &Html) -> String {
        match self.body.as_ref().and_then(|sel| doc.select(sel).next()) {
            Some(body) => element_text(body, true),
            None => element_text(doc.root_element(), true),
        }
    }

    /// Publish date of the page, looked up from the most to the least
    /// trustworthy place: date markup, the page around the article block,
    /// the article text, then anything in the raw markup.
    fn page_date(
        &self,
        doc: &Html,
        html: &str,
        region: Option<&Region>,
        text: &str,
    ) -> Option<NaiveDate> {
        self.date_from_markup(doc)
            .or_else(|| region.and_then(|region| self.date_around(doc, html, region)))
            .or_else(|| self.dates.find(text))
            .or_else(|| self.dates.find(html))
    }

    fn date_from_markup(&self, doc: &Html) -> Option<NaiveDate> {
        let from_attributes = self.date_attributes.as_ref().and_then(|selector| {
            doc.select(selector).find_map(|element| {
                let value = element.value();
                let raw = value.attr("content").or_else(|| value.attr("datetime"))?;
                self.dates.find(raw)
            })
        });
        from_attributes.or_else(|| {
            let selector = self.date_elements.as_ref()?;
            doc.select(selector)
                .find_map(|element| self.dates.find(&element.text().collect::<String>()))
        })
    }

    fn date_around(&self, doc: &Html, html: &str, region: &Region) -> Option<NaiveDate> {
        let text = match region {
            Region::Element(id) => text_around(doc.root_element(), Some(*id)),
            Region::Span(span) => {
                let rest = format!("{}{}", &html[..span.start], &html[span.end..]);
                text_around(Html::parse_document(&rest).root_element(), None)
            }
        };
        self.dates.find(&text)
    }

    fn finish(
        &self,
        doc: &Html,
        html: &str,
        region: Option<&Region>,
        text: String,
        strategy: &str,
        processing_date: NaiveDate,
    ) -> ExtractedItem {
        let found = self.page_date(doc, html, region, &text);
        let (date, date_source) = match found {
            Some(date) => (date, DateSource::Page),
            None => (processing_date, DateSource::ProcessingDate),
        };
        ExtractedItem {
            title: self.extract_title(doc),
            text,
            date,
            date_source,
            strategy: strategy.to_string(),
        }
    }
}

fn keep_longest(slot: &mut Option<String>, text: String) {
    let longer = slot
        .as_ref()
        .map_or(true, |current| text.chars().count() > current.chars().count());
    if longer {
        *slot = Some(text);
    }
}
