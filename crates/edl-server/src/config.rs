use edl_core::{EdlError, EdlSettings, OutputFormat, RefreshRate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Top-level `edl.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdlConfig {
    pub server: ServerConfig,
    pub edl: ListConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port, either `"8080"` or a `"host:container"` mapping whose
    /// second half is the port.
    pub port: String,
    pub bind: String,
    pub data_dir: PathBuf,
    /// Write each rebuilt list to `<data_dir>/edl-cache.json` and reload it on start.
    pub persist_cache: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: "8080".into(),
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            persist_cache: true,
        }
    }
}

/// `[edl]`: what the list contains and how it is refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub indicators_query: String,
    /// text | csv | json | json-seq
    pub format: String,
    pub on_demand: bool,
    /// `"<N> <unit>"`, e.g. `"5 minutes"`.
    pub cache_refresh_rate: String,
    pub limit: Option<usize>,
    pub ip_grouping: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            indicators_query: String::new(),
            format: "text".into(),
            on_demand: false,
            cache_refresh_rate: "5 minutes".into(),
            limit: None,
            ip_grouping: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON array or JSON-lines file read at startup.
    #[default]
    File,
    /// Remote indicator store queried over HTTP.
    Http,
}

/// `[source]`: where indicators come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: PathBuf,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::File,
            path: PathBuf::from("./indicators.json"),
            url: None,
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl SourceConfig {
    /// API key from config, falling back to `EDL_SOURCE_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("EDL_SOURCE_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Parse a listen port given either as `"<port>"` or `"<host>:<port>"`.
pub fn parse_listen_port(mapping: &str) -> edl_core::Result<u16> {
    let mapping = mapping.trim();
    if mapping.is_empty() {
        return Err(EdlError::Configuration("Please provide a Listen Port.".into()));
    }
    let port = match mapping.split_once(':') {
        Some((_, port)) => port,
        None => mapping,
    };
    port.trim().parse::<u16>().map_err(|_| {
        EdlError::Configuration(format!(
            "Listen Port must be an integer. {} is not valid.",
            mapping
        ))
    })
}

impl EdlConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if it exists and parses, otherwise defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn listen_port(&self) -> edl_core::Result<u16> {
        parse_listen_port(&self.server.port)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let port = self.listen_port()?;
        let addr: SocketAddr = format!("{}:{}", self.server.bind, port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {:?}: {}", self.server.bind, e))?;
        Ok(addr)
    }

    pub fn output_format(&self) -> edl_core::Result<OutputFormat> {
        self.edl.format.parse()
    }

    /// The configured refresh rate; blank means the default of 5 minutes.
    pub fn refresh_rate(&self) -> edl_core::Result<RefreshRate> {
        if self.edl.cache_refresh_rate.trim().is_empty() {
            return Ok(RefreshRate::default());
        }
        self.edl.cache_refresh_rate.parse()
    }

    /// The checks run by `test-module`: port, refresh rate, format and, unless
    /// the list is on-demand, a non-empty query. Stops at the first problem.
    pub fn check(&self) -> edl_core::Result<()> {
        self.listen_port()?;
        self.refresh_rate()?;
        self.output_format()?;
        if !self.edl.on_demand && self.edl.indicators_query.trim().is_empty() {
            return Err(EdlError::Configuration(
                "\"Indicator Query\" cannot be empty, please provide a valid query".into(),
            ));
        }
        Ok(())
    }

    /// Every problem with the config, for `config validate`.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.listen_port() {
            errors.push(format!("[server] port: {}", e));
        }
        if let Err(e) = self.server.bind.parse::<std::net::IpAddr>() {
            errors.push(format!("[server] bind: {}", e));
        }
        if let Err(e) = self.refresh_rate() {
            errors.push(format!("[edl] cache_refresh_rate: {}", e));
        }
        if let Err(e) = self.output_format() {
            errors.push(format!("[edl] format: {}", e));
        }
        if !self.edl.on_demand && self.edl.indicators_query.trim().is_empty() {
            errors.push("[edl] indicators_query: cannot be empty unless on_demand = true".into());
        }
        if self.edl.limit == Some(0) {
            errors.push("[edl] limit: must be greater than 0".into());
        }
        match self.source.kind {
            SourceKind::Http if self.source.url.is_none() => {
                errors.push("[source] url: required when kind = \"http\"".into());
            }
            SourceKind::File if !self.source.path.exists() => {
                errors.push(format!(
                    "[source] path: {} does not exist",
                    self.source.path.display()
                ));
            }
            _ => {}
        }
        if self.source.timeout_seconds == 0 {
            errors.push("[source] timeout_seconds: must be greater than 0".into());
        }

        errors
    }

    /// Runtime settings for the EDL service.
    pub fn settings(&self) -> edl_core::Result<EdlSettings> {
        Ok(EdlSettings::new(self.edl.indicators_query.clone(), self.output_format()?)
            .with_refresh_rate(self.refresh_rate()?)
            .with_on_demand(self.edl.on_demand)
            .with_limit(self.edl.limit)
            .with_ip_grouping(self.edl.ip_grouping))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.server.data_dir.join("edl-cache.json")
    }
}
