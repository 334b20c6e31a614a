use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// User-editable yt-dlp configuration, loaded from an optional JSON file:
///
/// ```json
/// {
///   "extractor_args": { "youtube": { "player_client": ["android", "web"] } },
///   "ytdlp_opts": { "retries": 3, "socket_timeout": 30 }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ExtractorConfig {
    /// Site identifier -> extractor argument -> values.
    #[serde(default)]
    pub extractor_args: BTreeMap<String, BTreeMap<String, Vec<String>>>,

    /// Additional yt-dlp options (retries, socket_timeout, ratelimit, ...).
    #[serde(default)]
    pub ytdlp_opts: BTreeMap<String, Value>,
}

impl ExtractorConfig {
    /// Load the configuration file. A missing file yields the default
    /// (empty) configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No extractor config found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            sites = config.extractor_args.len(),
            options = config.ytdlp_opts.len(),
            "Loaded extractor config"
        );
        Ok(config)
    }

    /// Render the configuration as yt-dlp command-line arguments.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (site, site_args) in &self.extractor_args {
            let rendered: Vec<String> = site_args
                .iter()
                .map(|(key, values)| format!("{}={}", key, values.join(",")))
                .collect();
            if rendered.is_empty() {
                continue;
            }
            args.push("--extractor-args".to_string());
            args.push(format!("{}:{}", site, rendered.join(";")));
        }

        for (name, value) in &self.ytdlp_opts {
            let flag = format!("--{}", option_flag_name(name));
            match value {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) => args.push(flag),
                Value::String(s) => {
                    args.push(flag);
                    args.push(s.clone());
                }
                Value::Number(n) => {
                    args.push(flag);
                    args.push(n.to_string());
                }
                Value::Array(_) | Value::Object(_) => {
                    tracing::warn!(option = %name, "Ignoring non-scalar yt-dlp option");
                }
            }
        }

        args
    }
}

/// Map a yt-dlp Python option name to its command-line spelling.
fn option_flag_name(name: &str) -> String {
    match name {
        "ratelimit" => "limit-rate".to_string(),
        "nocheckcertificate" => "no-check-certificates".to_string(),
        other => other.replace('_', "-"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
}
