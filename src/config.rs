//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::regions::{self, RegionCode};
use crate::worldbank::Indicator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Regions queried by `prices` and the HTTP endpoint
    #[serde(default = "default_regions")]
    pub regions: Vec<RegionCode>,

    /// Regions used by `export`, `indicators` and `pipeline`
    #[serde(default = "default_export_regions")]
    pub export_regions: Vec<RegionCode>,

    /// Games processed by `pipeline`
    #[serde(default = "default_games")]
    pub games: Vec<Game>,

    /// Steam storefront base URL
    #[serde(default = "default_steam_base_url")]
    pub steam_base_url: String,

    /// World Bank API base URL
    #[serde(default = "default_worldbank_base_url")]
    pub worldbank_base_url: String,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum spacing between calls to the same upstream, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to the spacing (0 to this value)
    #[serde(default)]
    pub delay_jitter_ms: u64,

    /// Regions fetched in parallel
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Extra attempts after a network failure
    #[serde(default)]
    pub retries: u32,

    /// Year of the PPP factor used for comparison; unset means most recent
    #[serde(default)]
    pub ppp_year: Option<i32>,

    /// Indicators downloaded by `indicators`
    #[serde(default = "default_indicators")]
    pub indicators: Vec<Indicator>,

    /// First year of the indicator download
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Last year of the indicator download
    #[serde(default = "default_end_year")]
    pub end_year: i32,

    /// Macro year joined with prices for training
    #[serde(default = "default_end_year")]
    pub train_year: i32,

    /// Directory for CSV files and the cache index
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Hours a downloaded file stays fresh; 0 always refetches
    #[serde(default = "default_cache_max_age_hours")]
    pub cache_max_age_hours: u64,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), cors_origins: default_cors_origins() }
    }
}

/// A game known to the batch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: u64,
    pub name: String,
}

fn default_regions() -> Vec<RegionCode> {
    regions::preset(regions::COMPARISON_REGIONS)
}

fn default_export_regions() -> Vec<RegionCode> {
    regions::preset(regions::EXPORT_REGIONS)
}

fn default_games() -> Vec<Game> {
    vec![Game { id: 1091500, name: "Cyberpunk_2077".to_string() }]
}

fn default_steam_base_url() -> String {
    "https://store.steampowered.com".to_string()
}

fn default_worldbank_base_url() -> String {
    "https://api.worldbank.org".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_delay_ms() -> u64 {
    200
}

fn default_max_concurrency() -> usize {
    4
}

fn default_indicators() -> Vec<Indicator> {
    Indicator::all().to_vec()
}

fn default_start_year() -> i32 {
    2000
}

fn default_end_year() -> i32 {
    2023
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_max_age_hours() -> u64 {
    24
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:4200".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            export_regions: default_export_regions(),
            games: default_games(),
            steam_base_url: default_steam_base_url(),
            worldbank_base_url: default_worldbank_base_url(),
            proxy: None,
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            delay_jitter_ms: 0,
            max_concurrency: default_max_concurrency(),
            retries: 0,
            ppp_year: None,
            indicators: default_indicators(),
            start_year: default_start_year(),
            end_year: default_end_year(),
            train_year: default_end_year(),
            data_dir: default_data_dir(),
            cache_max_age_hours: default_cache_max_age_hours(),
            format: OutputFormat::Table,
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("steam-ppp").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides. Unparseable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(regions) = std::env::var("STEAM_PPP_REGIONS") {
            if let Ok(parsed) = parse_region_list(&regions) {
                self.regions = parsed;
            }
        }

        if let Ok(proxy) = std::env::var("STEAM_PPP_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("STEAM_PPP_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(year) = std::env::var("STEAM_PPP_YEAR") {
            if let Ok(y) = year.parse() {
                self.ppp_year = Some(y);
            }
        }

        if let Ok(dir) = std::env::var("STEAM_PPP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("STEAM_PPP_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        self
    }

    /// Cache freshness in seconds.
    pub fn cache_max_age_secs(&self) -> u64 {
        self.cache_max_age_hours.saturating_mul(3600)
    }

    /// Looks up a configured game name by Steam app id.
    pub fn game_name(&self, app_id: u64) -> Option<&str> {
        self.games.iter().find(|g| g.id == app_id).map(|g| g.name.as_str())
    }
}

/// Parses a comma-separated region list such as `us,pl,de`.
pub fn parse_region_list(s: &str) -> Result<Vec<RegionCode>> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.parse::<RegionCode>().map_err(anyhow::Error::from))
        .collect()
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
