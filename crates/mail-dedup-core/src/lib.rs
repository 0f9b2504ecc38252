pub mod config;
pub mod diff;
pub mod duplicate_set;
pub mod engine;
pub mod error;
pub mod mail;
pub mod mailbox;
pub mod progress;
pub mod stats;
pub mod strategy;

pub use config::AppConfig;
pub use duplicate_set::{DuplicateSet, SetOutcome, SetResolution};
pub use engine::Deduplicate;
pub use error::Error;
pub use mail::{Mail, MailError, MailId, MailRef};
pub use progress::{ProgressReporter, SilentReporter};
pub use stats::{InvariantViolation, Stats};
pub use strategy::{SelectionStrategy, Strategy};
