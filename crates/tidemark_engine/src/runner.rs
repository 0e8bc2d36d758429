use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tidemark_core::{select_mode, Mode, RunSummary, Watermark};
use tidemark_logging::{ingest_info, ingest_warn};

use crate::config::EngineConfig;
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::publish::{GitPublisher, NoopPublisher, Publisher};
use crate::render::{PdfRenderer, Renderer};
use crate::sequencer::{RunError, Sequencer};
use crate::store::WatermarkStore;

/// Command-line overrides layered over the file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub baseline: Option<u64>,
    pub max_items: Option<usize>,
    pub no_publish: bool,
}

impl RunOptions {
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(baseline) = self.baseline {
            config.discovery.baseline_id = Some(baseline);
        }
        if let Some(max_items) = self.max_items {
            config.run.max_items = Some(max_items);
        }
        if self.no_publish {
            config.publish.git = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// Publishing is off or the run produced nothing new.
    Skipped,
    Committed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub summary: RunSummary,
    pub publish: PublishStatus,
}

/// One production run: HTTP fetcher, PDF renderer, git publisher if enabled.
pub async fn run_once(
    config: &EngineConfig,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let mut config = config.clone();
    options.apply(&mut config);

    let fetcher = ReqwestFetcher::new(config.fetch_settings());
    let renderer = PdfRenderer::new(config.render.clone());
    let publisher: Box<dyn Publisher> = if config.publish.git {
        let work_tree = config
            .publish
            .work_tree
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        Box::new(GitPublisher::new(work_tree))
    } else {
        Box::new(NoopPublisher)
    };
    run_with(&config, &fetcher, &renderer, publisher.as_ref(), now).await
}

/// A run with explicit collaborators.
pub async fn run_with(
    config: &EngineConfig,
    fetcher: &dyn Fetcher,
    renderer: &dyn Renderer,
    publisher: &dyn Publisher,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let sequencer = Sequencer::new(config, fetcher, renderer)?;
    let mut store =
        WatermarkStore::open_or_seed(&config.output.state_path, config.discovery.baseline_id, now)?;
    let summary = sequencer.run(&mut store, now).await?;
    let publish = publish_run(config, publisher, &summary, &store);
    Ok(RunReport { summary, publish })
}

fn publish_run(
    config: &EngineConfig,
    publisher: &dyn Publisher,
    summary: &RunSummary,
    store: &WatermarkStore,
) -> PublishStatus {
    // Recovered artifacts were never published by the run that wrote them.
    if summary.rendered + summary.reused == 0 {
        return PublishStatus::Skipped;
    }
    let mut paths = summary.artifacts.clone();
    paths.push(store.path().to_path_buf());
    let mut message = format!(
        "{}: {} new artifacts",
        config.publish.message_prefix, summary.rendered
    );
    if summary.reused > 0 {
        message.push_str(&format!(", {} recovered", summary.reused));
    }
    message.push_str(&format!(
        ", watermark {} -> {}",
        summary.watermark_before, summary.watermark_after
    ));
    match publisher.commit(&paths, &message) {
        Ok(()) => PublishStatus::Committed,
        Err(err) => {
            ingest_warn!("publish failed: {}", err);
            PublishStatus::Failed(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub watermark: Watermark,
    /// Mode a run started at `now` would select.
    pub next_mode: Mode,
}

pub fn status(config: &EngineConfig, now: DateTime<Utc>) -> Result<StatusReport, RunError> {
    let store = WatermarkStore::load(&config.output.state_path)?;
    let watermark = store.watermark().clone();
    let next_mode = select_mode(now, &watermark, config.catchup_threshold());
    Ok(StatusReport {
        watermark,
        next_mode,
    })
}

/// Seed or reset the watermark to `baseline`, never below a known value.
pub fn init(config: &EngineConfig, baseline: u64, now: DateTime<Utc>) -> Result<Watermark, RunError> {
    let store = WatermarkStore::recover_with_baseline(&config.output.state_path, baseline, now)?;
    ingest_info!(
        "watermark at {} in {}",
        store.last_processed_id(),
        store.path().display()
    );
    Ok(store.watermark().clone())
}
