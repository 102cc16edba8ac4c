use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use serde::Deserialize;

use crate::flags::SUMMARIZER_API_BASE;
use crate::flags::SUMMARIZER_API_TOKEN;
use crate::flags::SUMMARIZER_HISTORY_TIMEOUT_MS;
use crate::flags::SUMMARIZER_REQUEST_MAX_RETRIES;
use crate::flags::SUMMARIZER_STREAM_IDLE_TIMEOUT_MS;
use crate::flags::SUMMARIZER_STREAM_TIMEOUT_MS;
use crate::protocol::TargetLength;

const CONFIG_TOML_FILE: &str = "config.toml";

/// Application configuration loaded from disk and merged with overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the summarization backend, without a trailing slash.
    pub api_base: String,

    /// Bearer token forwarded on every request.
    pub api_token: Option<String>,

    /// Length used when a request does not specify one.
    pub target_length: TargetLength,

    /// Upper bound on the total duration of one stream.
    pub stream_timeout: Duration,

    /// Longest silence tolerated between two chunks.
    pub stream_idle_timeout: Duration,

    /// Longest wait for the stored copy once a stream has completed.
    pub history_timeout: Duration,

    /// Retries for 429/5xx responses when opening a stream.
    pub request_max_retries: u64,

    /// Directory holding `config.toml`.
    pub summarizer_home: PathBuf,
}

/// Shape of `config.toml`. Every field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigToml {
    pub api_base: Option<String>,
    pub api_token: Option<String>,
    pub target_length: Option<TargetLength>,
    pub stream_timeout_ms: Option<u64>,
    pub stream_idle_timeout_ms: Option<u64>,
    pub history_timeout_ms: Option<u64>,
    pub request_max_retries: Option<u64>,
}

/// Optional overrides for user configuration (e.g., from CLI flags).
#[derive(Default, Debug, Clone)]
pub struct ConfigOverrides {
    pub api_base: Option<String>,
    pub api_token: Option<String>,
    pub target_length: Option<TargetLength>,
    pub stream_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration, optionally applying overrides (CLI flags). Merges
    /// `$SUMMARIZER_HOME/config.toml`, environment defaults, and any values
    /// provided in `overrides` (highest precedence).
    pub fn load_with_overrides(overrides: ConfigOverrides) -> std::io::Result<Self> {
        let summarizer_home = find_summarizer_home()?;
        let cfg = load_config_as_toml(&summarizer_home)?;
        Self::load_from_base_config_with_overrides(cfg, overrides, summarizer_home)
    }

    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        summarizer_home: PathBuf,
    ) -> std::io::Result<Self> {
        let ConfigOverrides {
            api_base,
            api_token,
            target_length,
            stream_timeout,
        } = overrides;

        let api_base = api_base
            .or(cfg.api_base)
            .unwrap_or_else(|| SUMMARIZER_API_BASE.to_string());
        let api_base = api_base.trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "api_base must not be empty",
            ));
        }

        let api_token = api_token
            .or(cfg.api_token)
            .or_else(|| (*SUMMARIZER_API_TOKEN).map(str::to_string))
            .filter(|t| !t.trim().is_empty());

        Ok(Self {
            api_base,
            api_token,
            target_length: target_length.or(cfg.target_length).unwrap_or_default(),
            stream_timeout: stream_timeout
                .or(cfg.stream_timeout_ms.map(Duration::from_millis))
                .unwrap_or(*SUMMARIZER_STREAM_TIMEOUT_MS),
            stream_idle_timeout: cfg
                .stream_idle_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(*SUMMARIZER_STREAM_IDLE_TIMEOUT_MS),
            history_timeout: cfg
                .history_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(*SUMMARIZER_HISTORY_TIMEOUT_MS),
            request_max_retries: cfg
                .request_max_retries
                .unwrap_or(*SUMMARIZER_REQUEST_MAX_RETRIES),
            summarizer_home,
        })
    }
}

/// Reads `config.toml` from `summarizer_home`. A missing file yields the
/// default (empty) configuration.
pub fn load_config_as_toml(summarizer_home: &Path) -> std::io::Result<ConfigToml> {
    let path = summarizer_home.join(CONFIG_TOML_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) => toml::from_str::<ConfigToml>(&contents).map_err(|e| {
            tracing::error!("Failed to parse {}: {e}", path.display());
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("{} not found, using defaults", path.display());
            Ok(ConfigToml::default())
        }
        Err(e) => Err(e),
    }
}

/// Returns the configuration directory: `$SUMMARIZER_HOME` when set,
/// otherwise `~/.summarizer`. Does not verify that the directory exists.
pub fn find_summarizer_home() -> std::io::Result<PathBuf> {
    if let Ok(val) = std::env::var("SUMMARIZER_HOME") {
        if !val.is_empty() {
            return Ok(PathBuf::from(val));
        }
    }

    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    p.push(".summarizer");
    Ok(p)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn toml_values_apply_and_overrides_win() {
        let cfg: ConfigToml = toml::from_str(
            r#"
api_base = "https://summaries.example.com/"
target_length = "long"
stream_timeout_ms = 60000
stream_idle_timeout_ms = 5000
history_timeout_ms = 2500
request_max_retries = 0
"#,
        )
        .expect("valid toml");

        let home = TempDir::new().unwrap();
        let config = Config::load_from_base_config_with_overrides(
            cfg,
            ConfigOverrides {
                target_length: Some(TargetLength::Short),
                ..Default::default()
            },
            home.path().to_path_buf(),
        )
        .unwrap();

        assert_eq!(config.api_base, "https://summaries.example.com");
        assert_eq!(config.target_length, TargetLength::Short);
        assert_eq!(config.stream_timeout, Duration::from_secs(60));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(5));
        assert_eq!(config.history_timeout, Duration::from_millis(2500));
        assert_eq!(config.request_max_retries, 0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let home = TempDir::new().unwrap();
        assert_eq!(
            load_config_as_toml(home.path()).unwrap(),
            ConfigToml::default()
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join(CONFIG_TOML_FILE), "api_base = [").unwrap();
        let err = load_config_as_toml(home.path()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn empty_api_base_is_rejected() {
        let home = TempDir::new().unwrap();
        let err = Config::load_from_base_config_with_overrides(
            ConfigToml::default(),
            ConfigOverrides {
                api_base: Some(" / ".to_string()),
                ..Default::default()
            },
            home.path().to_path_buf(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
