use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Headers hashed by default to identify duplicates.
pub const DEFAULT_HASH_HEADERS: &[&str] = &[
    "Date",
    "From",
    "To",
    "Subject",
    "MIME-Version",
    "Content-Type",
    "Content-Disposition",
    "User-Agent",
    "X-Priority",
    "Message-ID",
];

pub const DEFAULT_SIZE_THRESHOLD: i64 = 512;
pub const DEFAULT_CONTENT_THRESHOLD: i64 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    Maildir,
    Mbox,
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maildir" => Ok(InputFormat::Maildir),
            "mbox" => Ok(InputFormat::Mbox),
            other => Err(format!("unsupported mailbox format {other:?}")),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Maildir => write!(f, "maildir"),
            InputFormat::Mbox => write!(f, "mbox"),
        }
    }
}

/// Where a mail's timestamp comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSource {
    #[default]
    DateHeader,
    /// File modification time.
    Mtime,
}

impl FromStr for TimeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date-header" => Ok(TimeSource::DateHeader),
            "mtime" => Ok(TimeSource::Mtime),
            other => Err(format!("unsupported time source {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: Vec<String>,
    /// Forced mailbox format. Detected per source when absent.
    pub input_format: Option<InputFormat>,
    pub force_unlock: bool,
    pub hash_headers: Vec<String>,
    /// Negative disables the size check.
    pub size_threshold: i64,
    /// Negative disables the content check.
    pub content_threshold: i64,
    pub strategy: Option<String>,
    pub regexp: Option<String>,
    pub time_source: TimeSource,
    pub dry_run: bool,
    pub show_diff: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            input_format: None,
            force_unlock: false,
            hash_headers: DEFAULT_HASH_HEADERS.iter().map(|h| h.to_string()).collect(),
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            content_threshold: DEFAULT_CONTENT_THRESHOLD,
            strategy: None,
            regexp: None,
            time_source: TimeSource::default(),
            dry_run: false,
            show_diff: false,
        }
    }
}

impl AppConfig {
    /// Strategy name, with empty strings treated as unset.
    pub fn strategy_name(&self) -> Option<&str> {
        self.strategy.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("MDEDUP").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
