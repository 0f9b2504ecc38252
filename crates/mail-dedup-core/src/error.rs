use std::path::PathBuf;

use thiserror::Error;

use crate::mail::MailId;
use crate::stats::InvariantViolation;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{} already added", .0.display())]
    DuplicateSource(PathBuf),

    #[error("cannot open {} as a mail store: {reason}", path.display())]
    UnrecognizedMailbox { path: PathBuf, reason: String },

    #[error("mailbox {} is locked by another process", .0.display())]
    Locked(PathBuf),

    #[error("mail {id} not found in {}", path.display())]
    MailNotFound { path: PathBuf, id: MailId },

    #[error("mailbox {} was modified by another process since it was opened", .0.display())]
    MailboxChanged(PathBuf),

    #[error("{} is not a registered source", .0.display())]
    UnknownSource(PathBuf),

    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),

    #[error("strategy {0} requires a regular expression")]
    MissingRegexp(String),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    /// The pipeline itself is wrong, not the input data.
    #[error("internal invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl Error {
    pub fn is_invariant(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}
