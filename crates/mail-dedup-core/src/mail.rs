use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use mail_parser::MessageParser;
use thiserror::Error;
use tracing::debug;

use crate::config::{AppConfig, TimeSource};
use crate::mailbox::RawMail;

/// Identifier of a mail within its source mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MailId(pub String);

impl fmt::Display for MailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MailId {
    fn from(id: &str) -> Self {
        MailId(id.to_string())
    }
}

/// A `(source, id)` pair, the unit of the final selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MailRef {
    pub source_path: PathBuf,
    pub mail_id: MailId,
}

impl fmt::Display for MailRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_path.display(), self.mail_id)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("{found} headers found out of {configured}, at least {required} required")]
    TooFewHeaders {
        found: usize,
        required: usize,
        configured: usize,
    },

    #[error("body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// A parsed mail, tied back to its source mailbox.
///
/// Equality and hashing only consider the `(source, id)` identity, so two
/// references to the same physical mail collapse into one.
#[derive(Debug, Clone)]
pub struct Mail {
    source_path: PathBuf,
    mail_id: MailId,
    path: PathBuf,
    size: u64,
    timestamp: i64,
    canonical_headers: Vec<(String, String)>,
    configured_headers: usize,
    body: Vec<u8>,
}

impl PartialEq for Mail {
    fn eq(&self, other: &Self) -> bool {
        self.source_path == other.source_path && self.mail_id == other.mail_id
    }
}

impl Eq for Mail {}

impl Hash for Mail {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_path.hash(state);
        self.mail_id.hash(state);
    }
}

impl Mail {
    pub fn parse(source_path: &Path, mail_id: MailId, raw: RawMail, conf: &AppConfig) -> Self {
        let message = MessageParser::new().parse(&raw.bytes);

        let mut canonical_headers = Vec::new();
        for name in &conf.hash_headers {
            let value = message.as_ref().and_then(|message| {
                let header = message
                    .headers()
                    .iter()
                    .find(|h| h.name.as_str().eq_ignore_ascii_case(name))?;
                let start = header.offset_start as usize;
                let end = header.offset_end as usize;
                raw.bytes
                    .get(start..end)
                    .map(|value| String::from_utf8_lossy(value).into_owned())
            });
            let Some(value) = value else {
                continue;
            };

            let value = if name.eq_ignore_ascii_case("date") {
                message
                    .as_ref()
                    .and_then(|m| m.date())
                    .and_then(|date| DateTime::from_timestamp(date.to_timestamp(), 0))
                    .map(|date| date.to_rfc3339())
                    .unwrap_or_else(|| collapse_whitespace(&value))
            } else if name.eq_ignore_ascii_case("message-id") {
                collapse_whitespace(&value)
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            } else {
                collapse_whitespace(&value)
            };
            if value.is_empty() {
                continue;
            }
            canonical_headers.push((name.to_ascii_lowercase(), value));
        }

        let modified = raw
            .modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);
        let timestamp = match conf.time_source {
            TimeSource::DateHeader => message
                .as_ref()
                .and_then(|m| m.date())
                .map(|date| date.to_timestamp())
                .or_else(|| {
                    debug!(
                        "No usable Date header in {}:{}, falling back to file time.",
                        source_path.display(),
                        mail_id
                    );
                    modified
                }),
            TimeSource::Mtime => modified,
        }
        .unwrap_or(0);

        let size = raw.bytes.len() as u64;
        let body = split_body(&raw.bytes).to_vec();

        Mail {
            source_path: source_path.to_path_buf(),
            mail_id,
            path: raw.path,
            size,
            timestamp,
            canonical_headers,
            configured_headers: conf.hash_headers.len(),
            body,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn mail_id(&self) -> &MailId {
        &self.mail_id
    }

    /// Location for display and path-based strategies.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn mail_ref(&self) -> MailRef {
        MailRef {
            source_path: self.source_path.clone(),
            mail_id: self.mail_id.clone(),
        }
    }

    pub fn canonical_headers(&self) -> &[(String, String)] {
        &self.canonical_headers
    }

    pub fn canonical_headers_text(&self) -> String {
        self.canonical_headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}\n"))
            .collect()
    }

    /// Grouping key derived from the canonical headers.
    pub fn hash_key(&self) -> Result<String, MailError> {
        let required = minimum_headers(self.configured_headers);
        if self.canonical_headers.len() < required {
            return Err(MailError::TooFewHeaders {
                found: self.canonical_headers.len(),
                required,
                configured: self.configured_headers,
            });
        }
        let digest = blake3::hash(self.canonical_headers_text().as_bytes());
        Ok(digest.to_hex().to_string())
    }

    /// Normalized body: LF line endings, every line newline-terminated.
    pub fn body_lines(&self) -> Result<Vec<String>, MailError> {
        let body = std::str::from_utf8(&self.body)?.replace("\r\n", "\n");
        Ok(body
            .split_inclusive('\n')
            .map(|line| {
                let mut line = line.to_string();
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                line
            })
            .collect())
    }
}

/// At least half of the configured headers, rounded up.
fn minimum_headers(configured: usize) -> usize {
    ((configured + 1) / 2).max(1)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything after the first empty line.
fn split_body(raw: &[u8]) -> &[u8] {
    for (i, byte) in raw.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        match &raw[i + 1..] {
            [b'\n', ..] => return &raw[i + 2..],
            [b'\r', b'\n', ..] => return &raw[i + 3..],
            _ => {}
        }
    }
    &[]
}
