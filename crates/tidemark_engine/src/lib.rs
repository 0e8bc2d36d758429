//! Tidemark engine: fetching, extraction, rendering, persistence and the run sequencer.
mod artifact;
mod config;
mod decode;
mod discovery;
mod extract;
mod fetch;
mod filename;
mod persist;
mod publish;
mod render;
mod runner;
mod sequencer;
mod store;
mod types;

pub use artifact::{ArtifactError, ArtifactStore};
pub use config::{
    ConfigError, DiscoveryConfig, EngineConfig, ExtractConfig, FetchConfig, LogConfig,
    OutputConfig, PublishConfig, RunConfig, SourceConfig, DEFAULT_CONFIG_FILENAME,
};
pub use decode::{decode_page, DecodedPage};
pub use discovery::Discovery;
pub use extract::{
    default_templates, ContentExtractor, DateSource, ExtractError, ExtractedItem,
    ExtractionResult, TemplateSpec, DEFAULT_TITLE, WHOLE_DOCUMENT,
};
pub use fetch::{
    fetch_with_retry, is_removal_redirect, FetchSettings, Fetcher, ReqwestFetcher,
    DEFAULT_USER_AGENT,
};
pub use filename::{artifact_filename, parse_artifact_filename, quarantine_filename};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use publish::{GitPublisher, NoopPublisher, PublishError, Publisher};
pub use render::{PdfLayout, PdfRenderer, RenderError, RenderRequest, Renderer};
pub use runner::{
    init, run_once, run_with, status, PublishStatus, RunOptions, RunReport, StatusReport,
};
pub use sequencer::{RunError, Sequencer};
pub use store::WatermarkStore;
pub use types::{
    FailureKind, FetchFailure, FetchMetadata, FetchOutcome, FetchOutput, NotFoundSignal, Phase,
};
