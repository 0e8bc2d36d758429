use std::collections::BTreeSet;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    Listing,
    Probe,
}

/// One identifier to attempt in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: u64,
    pub origin: CandidateOrigin,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),
    #[error("invalid identifier pattern: {0}")]
    InvalidPattern(String),
}

/// Pulls integer identifiers out of a listing page.
#[derive(Debug, Clone)]
pub struct ListingParser {
    pattern: Regex,
}

impl ListingParser {
    /// `pattern` must contain at least one capture group; the first one holds the id.
    pub fn new(pattern: &str) -> Result<Self, DiscoveryError> {
        let pattern =
            Regex::new(pattern).map_err(|err| DiscoveryError::InvalidPattern(err.to_string()))?;
        if pattern.captures_len() < 2 {
            return Err(DiscoveryError::InvalidPattern(
                "pattern has no capture group for the identifier".into(),
            ));
        }
        Ok(Self { pattern })
    }

    /// Every identifier embedded in `html`, in document order, duplicates kept.
    pub fn identifiers(&self, html: &str) -> Vec<u64> {
        self.pattern
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().parse::<u64>().ok())
            .collect()
    }

    /// Identifiers strictly above `after`, de-duplicated and ascending.
    ///
    /// A blank page means "nothing new". A non-blank page without a single
    /// parseable identifier means the listing is not what we expect.
    pub fn parse(&self, html: &str, after: u64) -> Result<Vec<Candidate>, DiscoveryError> {
        if html.trim().is_empty() {
            return Ok(Vec::new());
        }
        let found = self.identifiers(html);
        if found.is_empty() {
            return Err(DiscoveryError::DiscoveryUnavailable(
                "listing page contains no parseable identifiers".into(),
            ));
        }
        let fresh: BTreeSet<u64> = found.into_iter().filter(|id| *id > after).collect();
        Ok(fresh
            .into_iter()
            .map(|id| Candidate {
                id,
                origin: CandidateOrigin::Listing,
            })
            .collect())
    }
}

/// Dense range `[after + 1, after + window]`.
pub fn probe_range(after: u64, window: u64) -> Vec<Candidate> {
    let start = after.saturating_add(1);
    let end = after.saturating_add(window);
    if window == 0 || start > end {
        return Vec::new();
    }
    (start..=end)
        .map(|id| Candidate {
            id,
            origin: CandidateOrigin::Probe,
        })
        .collect()
}
