#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tidemark_core::{Mode, Watermark};
use tidemark_engine::{
    EngineConfig, FailureKind, FetchFailure, FetchMetadata, FetchOutcome, FetchOutput, Fetcher,
    NotFoundSignal, PublishError, Publisher, RenderError, RenderRequest, Renderer,
};

pub const LISTING: &str = "https://news.test/";

pub fn init_logging() {
    tidemark_logging::initialize_for_tests();
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

pub fn item_url(id: u64) -> String {
    format!("https://news.test/article.cfm?recent_news_id={id}")
}

pub fn test_config(dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.source.listing_url = LISTING.into();
    config.source.item_url_template = "https://news.test/article.cfm?recent_news_id={id}".into();
    config.output.artifact_dir = dir.join("out");
    config.output.state_path = dir.join("state.json");
    config.output.min_artifact_bytes = 16;
    config.fetch.retry_delay_ms = 0;
    config
}

/// Persist a watermark at `id` whose cursor was last level `days_ago` days before [`now`].
pub fn write_state(config: &EngineConfig, id: u64, days_ago: i64) -> Watermark {
    let mut wm = Watermark::seed(id, now() - Duration::days(days_ago));
    wm.last_mode = Mode::Incremental;
    std::fs::write(&config.output.state_path, wm.to_json().unwrap()).unwrap();
    wm
}

pub fn read_state(config: &EngineConfig) -> Watermark {
    Watermark::parse(&std::fs::read_to_string(&config.output.state_path).unwrap()).unwrap()
}

pub fn listing_html(ids: &[u64]) -> String {
    let links: String = ids
        .iter()
        .map(|id| format!(r#"<li><a href="/article.cfm?recent_news_id={id}">Story {id}</a></li>"#))
        .collect();
    format!("<html><body><ul>{links}</ul></body></html>")
}

/// An item page in the current template, dated `date` (free text).
pub fn article_html(id: u64, date: &str) -> String {
    format!(
        r#"<html><head><title>Story {id} | News</title></head><body>
        <nav>Home | Archive | Contact</nav>
        <h1>Story {id}</h1>
        <div class="article-content">
          <p>Published {date}.</p>
          <p>This is the body of story number {id}, long enough to clear the threshold.</p>
        </div>
        <footer>Copyright</footer>
        </body></html>"#
    )
}

pub fn body(html: &str) -> FetchOutcome {
    FetchOutcome::Body(FetchOutput {
        bytes: html.as_bytes().to_vec(),
        metadata: FetchMetadata {
            original_url: String::new(),
            final_url: String::new(),
            redirect_count: 0,
            content_type: Some("text/html; charset=utf-8".into()),
            byte_len: html.len() as u64,
        },
    })
}

pub fn not_found() -> FetchOutcome {
    FetchOutcome::NotFound(NotFoundSignal::Status(404))
}

pub fn timeout() -> FetchOutcome {
    FetchOutcome::TransientFailure(FetchFailure::new(FailureKind::Timeout, "timed out"))
}

/// Scripted fetcher. Each URL has a queue of outcomes; the last one repeats.
/// Unknown URLs are 404.
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Vec<FetchOutcome>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: impl Into<String>, outcomes: Vec<FetchOutcome>) -> Self {
        self.responses.lock().unwrap().insert(url.into(), outcomes);
        self
    }

    pub fn listing(self, ids: &[u64]) -> Self {
        self.respond(LISTING, vec![body(&listing_html(ids))])
    }

    pub fn article(self, id: u64, date: &str) -> Self {
        self.respond(item_url(id), vec![body(&article_html(id, date))])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => not_found(),
        }
    }
}

/// Renders a tiny "%PDF-" payload; can be told to fail or to emit garbage
/// for target names containing a marker.
#[derive(Default)]
pub struct FakeRenderer {
    fail_on: Vec<String>,
    garbage_on: Vec<String>,
    pub requests: Mutex<Vec<RenderRequest>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, id: u64) -> Self {
        self.fail_on.push(format!("-{id}."));
        self
    }

    pub fn garbage_for(mut self, id: u64) -> Self {
        self.garbage_on.push(format!("-{id}."));
        self
    }

    pub fn rendered_ids(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.target_name.clone())
            .collect()
    }
}

impl Renderer for FakeRenderer {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.requests.lock().unwrap().push(request.clone());
        let name = &request.target_name;
        if self.fail_on.iter().any(|m| name.contains(m)) {
            return Err(RenderError::EmptyOutput(name.clone()));
        }
        if self.garbage_on.iter().any(|m| name.contains(m)) {
            return Ok(b"<html>not a pdf at all</html>".to_vec());
        }
        Ok(format!("%PDF-1.7\n{}\n{}\n%%EOF\n", request.title, request.body).into_bytes())
    }

    fn is_valid_artifact(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF-")
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub commits: Mutex<Vec<(Vec<PathBuf>, String)>>,
    pub fail: bool,
}

impl Publisher for RecordingPublisher {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), PublishError> {
        self.commits
            .lock()
            .unwrap()
            .push((paths.to_vec(), message.to_string()));
        if self.fail {
            return Err(PublishError::GitFailed {
                step: "commit",
                status: "exit status: 1".into(),
                stderr: "rejected".into(),
            });
        }
        Ok(())
    }
}

pub fn artifact_names(config: &EngineConfig) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(&config.output.artifact_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
