use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ChairsError, Result};

pub const DEFAULT_KEYWORDS: &[&str] = &["County", "Parish", "Borough"];
const DEFAULT_WINDOW: usize = 300;

/// Runtime settings: `sources.toml` layered with `CHAIRS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
    #[serde(default)]
    pub sqlite: Option<PathBuf>,
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub jurisdictions: Vec<Jurisdiction>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            concurrency: default_concurrency(),
            max_retries: default_retries(),
            base_backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// A state or territory with its expected number of subdivisions.
#[derive(Debug, Clone, Deserialize)]
pub struct Jurisdiction {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub subdivisions: Option<usize>,
}

/// One entry of the source registry.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub jurisdiction: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(flatten)]
    pub extractor: ExtractorKind,
}

impl SourceConfig {
    /// Where the raw input comes from, for provenance.
    pub fn origin(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| self.path.as_ref().map(|p| p.display().to_string()))
    }
}

/// Extraction strategy selected per source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorKind {
    StructuredList {
        #[serde(default)]
        append_keyword: Option<String>,
    },
    Table,
    FreeText {
        #[serde(default = "default_window")]
        window: usize,
    },
    EmbeddedPayload,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings> {
        let built = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("CHAIRS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let settings: Settings = built.try_deserialize()?;
        settings.validate()?;
        debug!(
            path = %path.display(),
            jurisdictions = settings.jurisdictions.len(),
            sources = settings.sources.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::Message(format!("duplicate source '{}'", source.name)).into());
            }
            if self.jurisdiction(&source.jurisdiction).is_none() {
                return Err(ChairsError::InvalidJurisdiction(source.jurisdiction.clone()));
            }
            if source.url.is_none() && source.path.is_none() {
                return Err(ConfigError::Message(format!(
                    "source '{}' needs a url or a path",
                    source.name
                ))
                .into());
            }
        }
        Ok(())
    }

    pub fn jurisdiction(&self, code: &str) -> Option<&Jurisdiction> {
        self.jurisdictions
            .iter()
            .find(|j| j.code.eq_ignore_ascii_case(code.trim()))
    }

    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ChairsError::UnknownSource(name.to_string()))
    }

    /// Sources in merge order: ascending priority, then name. Later entries
    /// win duplicate ids.
    pub fn sources_in_order(&self) -> Vec<&SourceConfig> {
        let mut sources: Vec<&SourceConfig> = self.sources.iter().collect();
        sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        sources
    }
}

fn default_artifact() -> PathBuf {
    PathBuf::from("data/county-chairs.json")
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("data/datasets")
}

fn default_concurrency() -> usize {
    4
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}
