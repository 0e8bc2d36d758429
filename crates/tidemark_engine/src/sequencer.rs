use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tidemark_core::{
    is_recent, select_mode, skip_action, Candidate, DiscoveryError, ListingParser, Mode,
    RunSummary, SkipAction, SkipReason, WatermarkError,
};
use tidemark_logging::{ingest_debug, ingest_error, ingest_info, ingest_warn};

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::config::{ConfigError, EngineConfig};
use crate::decode::decode_page;
use crate::discovery::Discovery;
use crate::extract::{ContentExtractor, DateSource, ExtractError, ExtractionResult};
use crate::fetch::{fetch_with_retry, Fetcher};
use crate::filename::artifact_filename;
use crate::persist::PersistError;
use crate::render::{RenderRequest, Renderer};
use crate::store::WatermarkStore;
use crate::{FetchOutcome, NotFoundSignal, Phase};

/// Run-level failures. Per-candidate problems never end up here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Watermark(#[from] WatermarkError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

enum ItemOutcome {
    Produced {
        path: PathBuf,
        reused: bool,
        /// Publish date found in the page, if any.
        page_date: Option<NaiveDate>,
    },
    Skipped(SkipReason),
}

/// Drives one run: discovery, then each candidate through
/// fetch, extract, render, write, verify and advance, strictly in order.
pub struct Sequencer<'a> {
    fetcher: &'a dyn Fetcher,
    renderer: &'a dyn Renderer,
    discovery: Discovery,
    extractor: ContentExtractor,
    artifacts: ArtifactStore,
    item_url_template: String,
    catchup_threshold: chrono::Duration,
    max_consecutive_misses: u32,
    max_items: Option<usize>,
    retry_delay: Duration,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        config: &EngineConfig,
        fetcher: &'a dyn Fetcher,
        renderer: &'a dyn Renderer,
    ) -> Result<Self, RunError> {
        config.validate()?;
        let parser = ListingParser::new(&config.source.id_pattern)?;
        Ok(Self {
            fetcher,
            renderer,
            discovery: Discovery::new(
                config.source.listing_url.clone(),
                parser,
                config.discovery.probe_window,
                config.retry_delay(),
            ),
            extractor: ContentExtractor::new(
                &config.extract.templates,
                config.extract.min_content_chars,
            )?,
            artifacts: ArtifactStore::new(
                config.output.artifact_dir.clone(),
                config.output.quarantine_dir.clone(),
                config.output.min_artifact_bytes,
            ),
            item_url_template: config.source.item_url_template.clone(),
            catchup_threshold: config.catchup_threshold(),
            max_consecutive_misses: config.discovery.max_consecutive_misses,
            max_items: config.run.max_items,
            retry_delay: config.retry_delay(),
        })
    }

    fn item_url(&self, id: u64) -> String {
        self.item_url_template.replace("{id}", &id.to_string())
    }

    pub async fn run(
        &self,
        store: &mut WatermarkStore,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, RunError> {
        let mode = select_mode(now, store.watermark(), self.catchup_threshold);
        let before = store.last_processed_id();
        ingest_info!("run start: mode={} watermark={}", mode, before);
        let mut summary = RunSummary::new(mode, before);

        enter(Phase::Discovering, None);
        let candidates = match self.discovery.candidates(self.fetcher, mode, before).await {
            Ok(candidates) => candidates,
            Err(err) => {
                enter(Phase::Fatal, None);
                ingest_error!("discovery failed: {}", err);
                return Err(err.into());
            }
        };
        summary.candidates = candidates.len();
        if candidates.is_empty() {
            ingest_info!("nothing new after {}", before);
        } else {
            self.artifacts.prepare()?;
        }

        let caught_up = self
            .process_candidates(store, &candidates, mode, now, &mut summary)
            .await?;
        summary.caught_up = caught_up;

        if summary.halted_at.is_some() {
            store.set_last_mode(mode)?;
        } else {
            match mode {
                Mode::Incremental => store.mark_level(now, mode)?,
                Mode::Catchup if caught_up => {
                    ingest_info!("caught up with the source; next run is incremental");
                    store.mark_level(now, mode)?;
                }
                Mode::Catchup => store.set_last_mode(mode)?,
            }
        }

        summary.watermark_after = store.last_processed_id();
        enter(Phase::Idle, None);
        ingest_info!("run end: {}", summary);
        Ok(summary)
    }

    /// Returns whether a CATCHUP run reached the live edge of the source.
    async fn process_candidates(
        &self,
        store: &mut WatermarkStore,
        candidates: &[Candidate],
        mode: Mode,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<bool, RunError> {
        let limit = self.max_items.unwrap_or(usize::MAX);
        let mut caught_up = false;
        let mut trailing_not_found: u32 = 0;

        for (index, candidate) in candidates.iter().enumerate() {
            if summary.attempted >= limit {
                summary.deferred = candidates.len() - index;
                ingest_info!("per-run cap of {} reached, {} deferred", limit, summary.deferred);
                break;
            }
            summary.attempted += 1;
            let id = candidate.id;
            let reference = self.item_url(id);

            match self.process(id, &reference, now).await? {
                ItemOutcome::Produced {
                    path,
                    reused,
                    page_date,
                } => {
                    enter(Phase::Advancing, Some(id));
                    store.advance(id, &reference, now)?;
                    trailing_not_found = 0;
                    if reused {
                        summary.reused += 1;
                    } else {
                        summary.rendered += 1;
                    }
                    summary.artifacts.push(path);
                    if mode == Mode::Catchup && page_date.is_some_and(|d| is_recent(d, now)) {
                        caught_up = true;
                    }
                }
                ItemOutcome::Skipped(reason) => {
                    summary.record_skip(reason);
                    match skip_action(mode, reason) {
                        SkipAction::Advance => {
                            enter(Phase::Advancing, Some(id));
                            store.advance(id, &reference, now)?;
                            trailing_not_found = 0;
                        }
                        SkipAction::AdvanceAndRecordMiss => {
                            enter(Phase::Advancing, Some(id));
                            store.advance_past_miss(id, &reference, reason, now)?;
                            trailing_not_found = 0;
                        }
                        SkipAction::AdvanceOnLaterProgress => {
                            trailing_not_found += 1;
                            if trailing_not_found >= self.max_consecutive_misses.max(1) {
                                ingest_info!(
                                    "{} consecutive not-found probes ending at {}; end of source",
                                    trailing_not_found,
                                    id
                                );
                                caught_up = true;
                                break;
                            }
                        }
                        SkipAction::Halt => {
                            ingest_error!(
                                "halting run at {}; watermark stays at {}",
                                id,
                                store.last_processed_id()
                            );
                            summary.halted_at = Some(id);
                            break;
                        }
                    }
                }
            }
        }

        if trailing_not_found > 0 {
            ingest_debug!(
                "{} trailing not-found ids left for a later run",
                trailing_not_found
            );
        }
        Ok(caught_up)
    }

    async fn process(
        &self,
        id: u64,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, RunError> {
        // The date in a leftover artifact's name may be the processing-date
        // fallback, so a reused artifact never counts towards catching up.
        // The not-found streak still ends CATCHUP once the source runs dry.
        if let Some(path) = self.artifacts.find_existing(id, self.renderer)? {
            ingest_info!("{}: reusing existing artifact {}", id, path.display());
            return Ok(ItemOutcome::Produced {
                path,
                reused: true,
                page_date: None,
            });
        }

        enter(Phase::Fetching, Some(id));
        let extraction = match fetch_with_retry(self.fetcher, url, self.retry_delay).await {
            FetchOutcome::Body(output) => {
                enter(Phase::Extracting, Some(id));
                let page = decode_page(&output.bytes, output.metadata.content_type.as_deref());
                if page.lossy {
                    ingest_debug!("{}: lossy decode as {}", id, page.encoding_label);
                }
                self.extractor.extract(&page.html, now.date_naive())
            }
            FetchOutcome::NotFound(NotFoundSignal::RedirectedTo(target)) => {
                ingest_debug!("{}: redirected to {}", id, target);
                ExtractionResult::Unavailable
            }
            FetchOutcome::NotFound(NotFoundSignal::Status(code)) => {
                return Ok(skip(id, SkipReason::NotFound, &format!("http {code}")));
            }
            FetchOutcome::TransientFailure(failure) => {
                return Ok(skip(
                    id,
                    SkipReason::TransientFetchFailure,
                    &failure.to_string(),
                ));
            }
        };

        let item = match extraction {
            ExtractionResult::Extracted(item) => item,
            ExtractionResult::NoContent { best_effort } => {
                if let Some(text) = best_effort {
                    match self.artifacts.quarantine(id, &text) {
                        Ok(Some(path)) => ingest_debug!("{}: quarantined to {}", id, path.display()),
                        Ok(None) => {}
                        Err(err) => ingest_warn!("{}: quarantine failed: {}", id, err),
                    }
                }
                return Ok(skip(id, SkipReason::NoContent, "below content threshold"));
            }
            ExtractionResult::Unavailable => {
                return Ok(skip(id, SkipReason::Unavailable, "removed at source"));
            }
        };
        if !self.extractor.is_usable(&item.text) {
            return Ok(skip(id, SkipReason::NoContent, "below content threshold"));
        }
        ingest_debug!(
            "{}: {} chars via {}, date {} ({:?})",
            id,
            item.text.chars().count(),
            item.strategy,
            item.date,
            item.date_source
        );

        enter(Phase::Rendering, Some(id));
        let filename = artifact_filename(item.date, id, self.renderer.extension());
        let request = RenderRequest {
            title: item.title.clone(),
            body: item.text.clone(),
            target_name: filename.clone(),
        };
        let bytes = match self.renderer.render(&request) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(skip(id, SkipReason::RenderFailure, &err.to_string())),
        };

        enter(Phase::Verifying, Some(id));
        let (path, reused) = match self.artifacts.write(&filename, &bytes) {
            Ok(path) => (path, false),
            Err(ArtifactError::Persist(PersistError::AlreadyExists(path))) => (path, true),
            Err(err) => return Ok(skip(id, SkipReason::VerifyFailure, &err.to_string())),
        };
        let expected = if reused { None } else { Some(bytes.len()) };
        if let Err(err) = self.artifacts.verify(&path, expected, self.renderer) {
            if !reused {
                if let Err(remove_err) = fs::remove_file(&path) {
                    ingest_warn!(
                        "{}: could not remove rejected artifact {}: {}",
                        id,
                        path.display(),
                        remove_err
                    );
                }
            }
            return Ok(skip(id, SkipReason::VerifyFailure, &err.to_string()));
        }

        let page_date = match item.date_source {
            DateSource::Page => Some(item.date),
            DateSource::ProcessingDate => None,
        };
        Ok(ItemOutcome::Produced {
            path,
            reused,
            page_date,
        })
    }
}

fn enter(phase: Phase, id: Option<u64>) {
    match id {
        Some(id) => ingest_debug!("{}: {}", id, phase),
        None => ingest_debug!("{}", phase),
    }
}

fn skip(id: u64, reason: SkipReason, detail: &str) -> ItemOutcome {
    ingest_warn!("{}: skipped ({}): {}", id, reason, detail);
    ItemOutcome::Skipped(reason)
}
