use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::extract::{default_templates, TemplateSpec};
use crate::fetch::{FetchSettings, DEFAULT_USER_AGENT};
use crate::render::PdfLayout;

pub const DEFAULT_CONFIG_FILENAME: &str = "tidemark.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("cannot serialize config: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub listing_url: String,
    /// Item locator with an `{id}` placeholder.
    pub item_url_template: String,
    /// Regex whose first capture group is an item id inside the listing page.
    pub id_pattern: String,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.prophecynewswatch.com/".into(),
            item_url_template: "https://www.prophecynewswatch.com/article.cfm?recent_news_id={id}"
                .into(),
            id_pattern: r"recent_news_id=(\d+)".into(),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 20,
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            retry_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub catchup_threshold_days: i64,
    pub probe_window: u64,
    /// Consecutive not-found probes that mean the end of the source was reached.
    pub max_consecutive_misses: u32,
    /// Seed for the very first run, when no watermark exists yet.
    pub baseline_id: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            catchup_threshold_days: 7,
            probe_window: 50,
            max_consecutive_misses: 5,
            baseline_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub min_content_chars: usize,
    /// Current template first, then legacy revisions newest first.
    pub templates: Vec<TemplateSpec>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_content_chars: 50,
            templates: default_templates(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub artifact_dir: PathBuf,
    pub state_path: PathBuf,
    pub quarantine_dir: Option<PathBuf>,
    pub min_artifact_bytes: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("PDFS"),
            state_path: PathBuf::from("data.json"),
            quarantine_dir: None,
            min_artifact_bytes: 256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub git: bool,
    pub message_prefix: String,
    /// Work tree to commit in; defaults to the current directory.
    pub work_tree: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            git: false,
            message_prefix: "ingest".into(),
            work_tree: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: "info".into(),
        }
    }
}

/// Everything a run needs, loaded from one RON file. Every field has a
/// default, so `()` is a complete config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub source: SourceConfig,
    pub fetch: FetchConfig,
    pub discovery: DiscoveryConfig,
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    pub render: PdfLayout,
    pub run: RunConfig,
    pub publish: PublishConfig,
    pub log: LogConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Load `path` if it exists, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_pretty(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
            .map_err(|err| ConfigError::Serialize(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.source.listing_url)
            .map_err(|err| ConfigError::Invalid(format!("source.listing_url: {err}")))?;
        if !self.source.item_url_template.contains("{id}") {
            return Err(ConfigError::Invalid(
                "source.item_url_template must contain {id}".into(),
            ));
        }
        Url::parse(&self.item_url(0))
            .map_err(|err| ConfigError::Invalid(format!("source.item_url_template: {err}")))?;
        if self.fetch.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.request_timeout_secs must be positive".into(),
            ));
        }
        if self.discovery.catchup_threshold_days < 0 {
            return Err(ConfigError::Invalid(
                "discovery.catchup_threshold_days must not be negative".into(),
            ));
        }
        if self.discovery.probe_window == 0 {
            return Err(ConfigError::Invalid(
                "discovery.probe_window must be positive".into(),
            ));
        }
        if self.extract.min_content_chars == 0 {
            return Err(ConfigError::Invalid(
                "extract.min_content_chars must be positive".into(),
            ));
        }
        if self.run.max_items == Some(0) {
            return Err(ConfigError::Invalid("run.max_items must be positive".into()));
        }
        Ok(())
    }

    pub fn item_url(&self, id: u64) -> String {
        self.source.item_url_template.replace("{id}", &id.to_string())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            user_agent: self.source.user_agent.clone(),
            ..FetchSettings::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch.retry_delay_ms)
    }

    pub fn catchup_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(self.discovery.catchup_threshold_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_is_all_defaults() {
        assert_eq!(EngineConfig::from_ron_str("()").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_ron_str(
            r#"(
                discovery: (probe_window: 10, baseline_id: Some(9000)),
                extract: (templates: [Css(name: "main", selector: "main")]),
                run: (max_items: Some(1)),
            )"#,
        )
        .unwrap();
        assert_eq!(config.discovery.probe_window, 10);
        assert_eq!(config.discovery.baseline_id, Some(9000));
        assert_eq!(config.discovery.catchup_threshold_days, 7);
        assert_eq!(config.extract.min_content_chars, 50);
        assert_eq!(config.extract.templates.len(), 1);
        assert_eq!(config.run.max_items, Some(1));
    }

    #[test]
    fn template_without_placeholder_is_invalid() {
        let err = EngineConfig::from_ron_str(
            r#"(source: (item_url_template: "https://example.com/article"))"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn pretty_output_parses_back() {
        let config = EngineConfig::default();
        let text = config.to_ron_pretty().unwrap();
        assert_eq!(EngineConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn item_url_substitutes_id() {
        assert_eq!(
            EngineConfig::default().item_url(9257),
            "https://www.prophecynewswatch.com/article.cfm?recent_news_id=9257"
        );
    }
}
