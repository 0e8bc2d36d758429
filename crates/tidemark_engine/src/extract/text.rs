use ego_tree::{NodeId, NodeRef};
use regex::Regex;
use scraper::node::Node;
use scraper::ElementRef;

/// Elements whose text never belongs to an article.
const ALWAYS_SKIPPED: &[&str] = &[
    "script", "style", "noscript", "iframe", "template", "svg", "button", "select",
];

/// Page chrome dropped by the whole-document fallback.
const CHROME: &[&str] = &["nav", "header", "footer", "aside", "form", "menu", "dialog"];

/// class/id fragments that mark footer-like regions in the fallback.
const CHROME_HINTS: &[&str] = &[
    "nav", "menu", "footer", "sidebar", "breadcrumb", "cookie", "share", "social", "subscribe",
    "advert", "banner",
];

const BLOCK: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "figure", "figcaption",
    "table", "tr", "td", "th", "blockquote", "address", "ul", "ol", "li", "h1", "h2", "h3", "h4",
    "h5", "h6", "pre", "dl", "dt", "dd", "center", "body",
];

/// Flatten an element to text, one line per block-level element.
///
/// With `strip_chrome` set, navigation/footer-like regions are dropped as well.
pub(crate) fn element_text(element: ElementRef, strip_chrome: bool) -> String {
    let chrome = if strip_chrome { Chrome::Strip } else { Chrome::Keep };
    let mut collector = TextCollector::new(chrome, None);
    collector.visit_children(element);
    collector.finish()
}

/// Text of `element` minus the subtree at `skip`, with chrome dropped except
/// for `<header>`, where datelines usually live.
pub(crate) fn text_around(element: ElementRef, skip: Option<NodeId>) -> String {
    let mut collector = TextCollector::new(Chrome::StripKeepingHeader, skip);
    collector.visit_children(element);
    collector.finish()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Chrome {
    Keep,
    Strip,
    StripKeepingHeader,
}

struct TextCollector {
    builder: String,
    last_char: Option<char>,
    chrome: Chrome,
    skip: Option<NodeId>,
}

impl TextCollector {
    fn new(chrome: Chrome, skip: Option<NodeId>) -> Self {
        Self {
            builder: String::new(),
            last_char: None,
            chrome,
            skip,
        }
    }

    fn finish(self) -> String {
        self.builder
    }

    fn visit_node(&mut self, node: NodeRef<'_, Node>) {
        if self.skip == Some(node.id()) {
            self.ensure_newline();
            return;
        }
        match node.value() {
            Node::Text(text) => self.append_text(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element);
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_node(child);
                }
            }
        }
    }

    fn visit_element(&mut self, element: ElementRef) {
        let tag = element.value().name().to_ascii_lowercase();
        if ALWAYS_SKIPPED.contains(&tag.as_str()) {
            return;
        }
        let strip = match self.chrome {
            Chrome::Keep => false,
            Chrome::Strip => true,
            Chrome::StripKeepingHeader => tag != "header",
        };
        if strip && is_chrome(element, &tag) {
            return;
        }
        if tag == "br" {
            self.ensure_newline();
            return;
        }
        let block = BLOCK.contains(&tag.as_str());
        if block {
            self.ensure_newline();
        }
        self.visit_children(element);
        if block {
            self.ensure_newline();
        }
    }

    fn visit_children(&mut self, element: ElementRef) {
        for child in element.children() {
            self.visit_node(child);
        }
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if matches!(self.last_char, Some(' ') | Some('\n') | None) {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    fn ensure_newline(&mut self) {
        if self.last_char == Some('\n') || self.builder.is_empty() {
            return;
        }
        if self.last_char == Some(' ') {
            self.builder.pop();
        }
        self.push_char('\n');
    }

    fn push_char(&mut self, ch: char) {
        self.builder.push(ch);
        self.last_char = Some(ch);
    }
}

fn is_chrome(element: ElementRef, tag: &str) -> bool {
    if CHROME.contains(&tag) {
        return true;
    }
    let attrs = element.value();
    let marker = format!(
        "{} {}",
        attrs.attr("class").unwrap_or_default(),
        attrs.attr("id").unwrap_or_default()
    )
    .to_ascii_lowercase();
    if marker.trim().is_empty() {
        return false;
    }
    marker
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .any(|word| CHROME_HINTS.contains(&word))
}

/// Final cleanup applied to every strategy's output: drop residual markup,
/// collapse whitespace inside lines, drop blank lines, trim.
pub(crate) struct Normalizer {
    residual_tag: Regex,
}

impl Normalizer {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            residual_tag: Regex::new(r"(?s)</?[a-zA-Z!][^<>]{0,400}>")?,
        })
    }

    pub(crate) fn normalize(&self, text: &str) -> String {
        let stripped = self.residual_tag.replace_all(text, " ");
        stripped
            .lines()
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn collapse_whitespace(line: &str) -> String {
    line.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
