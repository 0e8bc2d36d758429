use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tidemark_logging::{ingest_debug, ingest_warn};
use url::Url;

use crate::{FailureKind, FetchFailure, FetchMetadata, FetchOutcome, FetchOutput, NotFoundSignal};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; tidemark/0.1)";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Bounded retrieval of one page.
///
/// Implementations never return `Err`; every failure is folded into a
/// [`FetchOutcome`] so callers apply one classification.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<reqwest::Client, FetchFailure> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .redirect(policy)
            .build()
            .map_err(|err| FetchFailure::new(FailureKind::Network, err.to_string()))
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn fetch_inner(&self, url: &str) -> Result<FetchOutcome, FetchFailure> {
        let parsed = Url::parse(url)
            .map_err(|err| FetchFailure::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client
            .get(parsed.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if is_not_found_status(status) {
            return Ok(FetchOutcome::NotFound(NotFoundSignal::Status(
                status.as_u16(),
            )));
        }
        if !status.is_success() {
            return Err(FetchFailure::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let final_url = response.url().clone();
        if is_removal_redirect(&parsed, &final_url) {
            ingest_debug!("{} redirected away to {}", url, final_url);
            return Ok(FetchOutcome::NotFound(NotFoundSignal::RedirectedTo(
                final_url.to_string(),
            )));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchFailure::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchFailure::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchFailure::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url: final_url.to_string(),
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutcome::Body(FetchOutput { bytes, metadata }))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.fetch_inner(url).await {
            Ok(outcome) => outcome,
            Err(failure) => FetchOutcome::TransientFailure(failure),
        }
    }
}

/// Fetch once, and once more after `retry_delay` if the first attempt failed
/// transiently. Not-found is final.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    retry_delay: Duration,
) -> FetchOutcome {
    match fetcher.fetch(url).await {
        FetchOutcome::TransientFailure(failure) if failure.is_retryable() => {
            ingest_warn!("fetch {} failed ({}), retrying once", url, failure);
            if !retry_delay.is_zero() {
                tokio::time::sleep(retry_delay).await;
            }
            fetcher.fetch(url).await
        }
        outcome => outcome,
    }
}

fn is_not_found_status(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

/// A redirect counts as removal when the final URL lost whatever identified
/// the requested item: its query string, or its last path segment when it had
/// no query.
pub fn is_removal_redirect(requested: &Url, final_url: &Url) -> bool {
    if requested == final_url {
        return false;
    }
    match requested.query().filter(|q| !q.is_empty()) {
        Some(query) => final_url.query() != Some(query),
        None => {
            let last_segment = requested
                .path_segments()
                .and_then(|mut segments| segments.rev().find(|s| !s.is_empty()));
            match last_segment {
                Some(segment) => !final_url
                    .path_segments()
                    .map(|mut segments| segments.any(|s| s == segment))
                    .unwrap_or(false),
                None => false,
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        return FetchFailure::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchFailure::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchFailure::new(FailureKind::Network, err.to_string())
}
