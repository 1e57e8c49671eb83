//! Application configuration for gamma-events.
//!
//! User config lives at `~/.gamma-events/gamma-events.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EventsError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "gamma-events.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".gamma-events";

const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/clubgamma/club-gamma-frontend/refs/heads/main/JSON/events.json";

const DEFAULT_CONTENT_BASE_URL: &str =
    "https://raw.githubusercontent.com/clubgamma/club-gamma-frontend/refs/heads/main/JSON/markdowns/";

// ---------------------------------------------------------------------------
// Config structs (matching gamma-events.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote resource locations.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// HTTP behavior shared by all requests.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Content enrichment behavior.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Manifest caching.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// URL of the year-indexed events manifest.
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Directory URL the per-event content files live under.
    #[serde(default = "default_content_base_url")]
    pub content_base_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            manifest_url: default_manifest_url(),
            content_base_url: default_content_base_url(),
        }
    }
}

fn default_manifest_url() -> String {
    DEFAULT_MANIFEST_URL.into()
}
fn default_content_base_url() -> String {
    DEFAULT_CONTENT_BASE_URL.into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum content retrievals in flight at once. 0 = unbounded.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_max_concurrent() -> u32 {
    16
}

/// How the enricher treats a failed content retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any failure discards the whole batch.
    #[default]
    AllOrNothing,
    /// Failed records are kept with no content.
    Partial,
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched manifest is reused. 0 disables the cache.
    #[serde(default)]
    pub manifest_ttl_secs: u64,
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration with validated URLs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub manifest_url: Url,
    /// Always ends with `/` so filenames join beneath it.
    pub content_base_url: Url,
    pub timeout: Duration,
    /// `None` means unbounded fan-out.
    pub max_concurrent: Option<usize>,
    pub failure_policy: FailurePolicy,
    /// `None` disables manifest caching.
    pub manifest_ttl: Option<Duration>,
}

impl PipelineConfig {
    /// Build a config for the given endpoints with default fetch settings.
    pub fn new(manifest_url: Url, content_base_url: Url) -> Self {
        let fetch = FetchConfig::default();
        Self {
            manifest_url,
            content_base_url: with_trailing_slash(content_base_url),
            timeout: Duration::from_secs(fetch.timeout_secs),
            max_concurrent: Some(fetch.max_concurrent as usize),
            failure_policy: FailurePolicy::default(),
            manifest_ttl: None,
        }
    }
}

impl TryFrom<&AppConfig> for PipelineConfig {
    type Error = EventsError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let manifest_url = parse_url("sources.manifest_url", &config.sources.manifest_url)?;
        let content_base_url =
            parse_url("sources.content_base_url", &config.sources.content_base_url)?;

        if config.fetch.timeout_secs == 0 {
            return Err(EventsError::config("fetch.timeout_secs must be greater than 0"));
        }

        Ok(Self {
            manifest_url,
            content_base_url: with_trailing_slash(content_base_url),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            max_concurrent: match config.fetch.max_concurrent {
                0 => None,
                n => Some(n as usize),
            },
            failure_policy: config.enrichment.failure_policy,
            manifest_ttl: match config.cache.manifest_ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| EventsError::config(format!("{key}: '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(EventsError::config(format!(
            "{key}: unsupported scheme '{other}'"
        ))),
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.gamma-events/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EventsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.gamma-events/gamma-events.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EventsError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EventsError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EventsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EventsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EventsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("manifest_url"));
        assert!(toml_str.contains("all-or-nothing"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.timeout_secs, 10);
        assert_eq!(parsed.enrichment.failure_policy, FailurePolicy::AllOrNothing);
        assert_eq!(parsed.cache.manifest_ttl_secs, 0);
    }

    #[test]
    fn partial_sections() {
        let toml_str = r#"
[enrichment]
failure_policy = "partial"

[fetch]
max_concurrent = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.enrichment.failure_policy, FailurePolicy::Partial);
        assert_eq!(config.sources.manifest_url, DEFAULT_MANIFEST_URL);

        let pipeline = PipelineConfig::try_from(&config).expect("valid");
        assert_eq!(pipeline.max_concurrent, None);
        assert_eq!(pipeline.timeout, Duration::from_secs(10));
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::try_from(&app).expect("defaults are valid");
        assert_eq!(pipeline.max_concurrent, Some(16));
        assert_eq!(pipeline.manifest_ttl, None);
        assert!(pipeline.content_base_url.path().ends_with("/markdowns/"));
    }

    #[test]
    fn content_base_gets_trailing_slash() {
        let mut app = AppConfig::default();
        app.sources.content_base_url = "https://example.com/markdowns".into();
        app.cache.manifest_ttl_secs = 60;
        let pipeline = PipelineConfig::try_from(&app).expect("valid");
        assert_eq!(pipeline.content_base_url.as_str(), "https://example.com/markdowns/");
        assert_eq!(
            pipeline.content_base_url.join("a.md").unwrap().as_str(),
            "https://example.com/markdowns/a.md"
        );
        assert_eq!(pipeline.manifest_ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn invalid_urls_rejected() {
        let mut app = AppConfig::default();
        app.sources.manifest_url = "not a url".into();
        let err = PipelineConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("sources.manifest_url"));

        let mut app = AppConfig::default();
        app.sources.content_base_url = "file:///tmp/markdowns/".into();
        let err = PipelineConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut app = AppConfig::default();
        app.fetch.timeout_secs = 0;
        assert!(PipelineConfig::try_from(&app).is_err());
    }
}
