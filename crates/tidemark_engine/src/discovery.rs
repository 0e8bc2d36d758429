use std::time::Duration;

use tidemark_core::{probe_range, Candidate, DiscoveryError, ListingParser, Mode};
use tidemark_logging::{ingest_debug, ingest_info};

use crate::decode::decode_page;
use crate::fetch::{fetch_with_retry, Fetcher};
use crate::FetchOutcome;

/// Produces the ordered candidates for one run.
pub struct Discovery {
    listing_url: String,
    parser: ListingParser,
    probe_window: u64,
    retry_delay: Duration,
}

impl Discovery {
    pub fn new(
        listing_url: impl Into<String>,
        parser: ListingParser,
        probe_window: u64,
        retry_delay: Duration,
    ) -> Self {
        Self {
            listing_url: listing_url.into(),
            parser,
            probe_window,
            retry_delay,
        }
    }

    /// Ascending candidates strictly above `after`.
    ///
    /// INCREMENTAL reads the listing page and fails with
    /// `DiscoveryUnavailable` when it cannot. CATCHUP never touches the
    /// network.
    pub async fn candidates(
        &self,
        fetcher: &dyn Fetcher,
        mode: Mode,
        after: u64,
    ) -> Result<Vec<Candidate>, DiscoveryError> {
        match mode {
            Mode::Incremental => self.from_listing(fetcher, after).await,
            Mode::Catchup => {
                let range = probe_range(after, self.probe_window);
                ingest_info!(
                    "probing {} ids after {} (window {})",
                    range.len(),
                    after,
                    self.probe_window
                );
                Ok(range)
            }
        }
    }

    async fn from_listing(
        &self,
        fetcher: &dyn Fetcher,
        after: u64,
    ) -> Result<Vec<Candidate>, DiscoveryError> {
        let output = match fetch_with_retry(fetcher, &self.listing_url, self.retry_delay).await {
            FetchOutcome::Body(output) => output,
            FetchOutcome::NotFound(signal) => {
                return Err(DiscoveryError::DiscoveryUnavailable(format!(
                    "listing {} not found: {:?}",
                    self.listing_url, signal
                )))
            }
            FetchOutcome::TransientFailure(failure) => {
                return Err(DiscoveryError::DiscoveryUnavailable(format!(
                    "listing {} failed: {}",
                    self.listing_url, failure
                )))
            }
        };
        let page = decode_page(&output.bytes, output.metadata.content_type.as_deref());
        let candidates = self.parser.parse(&page.html, after)?;
        ingest_debug!(
            "listing {} yielded {} new ids after {}",
            self.listing_url,
            candidates.len(),
            after
        );
        Ok(candidates)
    }
}
