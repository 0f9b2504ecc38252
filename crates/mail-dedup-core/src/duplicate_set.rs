use chrono::DateTime;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::diff::{diff_len, unified_diff};
use crate::mail::{Mail, MailError, MailRef};
use crate::stats::Stats;
use crate::strategy::SelectionStrategy;

/// How a duplicate set was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Only one mail shares the hash key.
    Ignored,
    RejectedEncoding,
    RejectedSize,
    RejectedContent,
    /// No strategy, or the strategy picked every mail.
    Skipped,
    Deduplicated(Vec<MailRef>),
}

impl SetOutcome {
    pub fn candidates(&self) -> &[MailRef] {
        match self {
            SetOutcome::Deduplicated(candidates) => candidates,
            _ => &[],
        }
    }

    /// Counters contributed by a set of `size` mails resolved this way.
    pub fn stats(&self, size: usize) -> Stats {
        let size = size as u64;
        let mut stats = Stats::default();

        if *self == SetOutcome::Ignored {
            stats.mail_unique += size;
            stats.mail_discarded += size;
            stats.set_ignored += 1;
            return stats;
        }

        stats.mail_duplicates += size;
        match self {
            SetOutcome::RejectedEncoding => {
                stats.mail_discarded += size;
                stats.set_rejected_encoding += 1;
            }
            SetOutcome::RejectedSize => {
                stats.mail_discarded += size;
                stats.set_rejected_size += 1;
            }
            SetOutcome::RejectedContent => {
                stats.mail_discarded += size;
                stats.set_rejected_content += 1;
            }
            SetOutcome::Skipped => {
                stats.mail_discarded += size;
                stats.set_skipped += 1;
            }
            SetOutcome::Deduplicated(candidates) => {
                let selected = candidates.len() as u64;
                stats.mail_selected += selected;
                stats.mail_discarded += size - selected;
                stats.set_deduplicated += 1;
            }
            SetOutcome::Ignored => {}
        }
        stats
    }
}

/// Result of resolving a set.
#[derive(Debug, Clone)]
pub struct SetResolution {
    pub outcome: SetOutcome,
    pub stats: Stats,
}

enum Divergence {
    Encoding(MailError),
    Size,
    /// Holds the diff of the offending pair when `show_diff` is set.
    Content { diff: Option<String> },
}

/// Mails sharing the same hash key.
///
/// The pool is fixed at construction and the aggregates used by
/// strategies are computed once.
#[derive(Debug)]
pub struct DuplicateSet {
    hash_key: String,
    pool: Vec<Mail>,
    size_threshold: i64,
    content_threshold: i64,
    show_diff: bool,
    newest_timestamp: i64,
    oldest_timestamp: i64,
    biggest_size: u64,
    smallest_size: u64,
}

impl DuplicateSet {
    /// Build a set, collapsing mails with the same `(source, id)` identity.
    pub fn new(hash_key: String, mails: Vec<Mail>, conf: &AppConfig) -> Self {
        let mut pool: Vec<Mail> = Vec::with_capacity(mails.len());
        for mail in mails {
            if !pool.contains(&mail) {
                pool.push(mail);
            }
        }

        let timestamps = pool.iter().map(Mail::timestamp);
        let newest_timestamp = timestamps.clone().max().unwrap_or(0);
        let oldest_timestamp = timestamps.min().unwrap_or(0);
        let sizes = pool.iter().map(Mail::size);
        let biggest_size = sizes.clone().max().unwrap_or(0);
        let smallest_size = sizes.min().unwrap_or(0);

        Self {
            hash_key,
            pool,
            size_threshold: conf.size_threshold,
            content_threshold: conf.content_threshold,
            show_diff: conf.show_diff,
            newest_timestamp,
            oldest_timestamp,
            biggest_size,
            smallest_size,
        }
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    pub fn mails(&self) -> &[Mail] {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn newest_timestamp(&self) -> i64 {
        self.newest_timestamp
    }

    pub fn oldest_timestamp(&self) -> i64 {
        self.oldest_timestamp
    }

    pub fn biggest_size(&self) -> u64 {
        self.biggest_size
    }

    pub fn smallest_size(&self) -> u64 {
        self.smallest_size
    }

    /// Compare every pair of mails, size first, then content. The first
    /// violation found rejects the whole set.
    fn check_differences(&self) -> Result<(), Divergence> {
        let check_size = self.size_threshold >= 0;
        let check_content = self.content_threshold >= 0;
        if !check_size {
            info!("Skip checking for size differences.");
        }
        if !check_content {
            info!("Skip checking for content differences.");
        }
        if !check_size && !check_content {
            return Ok(());
        }

        let mut bodies: Vec<Option<Vec<String>>> = vec![None; self.pool.len()];
        for i in 0..self.pool.len() {
            for j in i + 1..self.pool.len() {
                let (a, b) = (&self.pool[i], &self.pool[j]);

                if check_size {
                    let size_difference = a.size().abs_diff(b.size());
                    debug!(
                        "{} and {} differ by {} bytes in size.",
                        a.mail_ref(),
                        b.mail_ref(),
                        size_difference
                    );
                    if size_difference > self.size_threshold as u64 {
                        return Err(Divergence::Size);
                    }
                }

                if check_content {
                    for index in [i, j] {
                        if bodies[index].is_none() {
                            let lines = self.pool[index]
                                .body_lines()
                                .map_err(Divergence::Encoding)?;
                            bodies[index] = Some(lines);
                        }
                    }
                    let a_lines = bodies[i].as_deref().unwrap_or_default();
                    let b_lines = bodies[j].as_deref().unwrap_or_default();

                    let content_difference = diff_len(a_lines, b_lines);
                    debug!(
                        "{} and {} differ by {} bytes in content.",
                        a.mail_ref(),
                        b.mail_ref(),
                        content_difference
                    );
                    if content_difference as i64 > self.content_threshold {
                        let diff = self
                            .show_diff
                            .then(|| pretty_diff(a, a_lines, b, b_lines));
                        return Err(Divergence::Content { diff });
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the consistency checks, then apply the strategy.
    pub fn select_candidates(&self, strategy: Option<&dyn SelectionStrategy>) -> SetResolution {
        let outcome = self.resolve(strategy);
        let stats = outcome.stats(self.pool.len());
        SetResolution { outcome, stats }
    }

    fn resolve(&self, strategy: Option<&dyn SelectionStrategy>) -> SetOutcome {
        if self.pool.len() == 1 {
            debug!("Ignore set: only one message found.");
            return SetOutcome::Ignored;
        }

        match self.check_differences() {
            Err(Divergence::Encoding(err)) => {
                warn!("Reject set: unparseable mails due to bad encoding.");
                debug!("{}", err);
                return SetOutcome::RejectedEncoding;
            }
            Err(Divergence::Size) => {
                warn!("Reject set: mails are too dissimilar in size.");
                return SetOutcome::RejectedSize;
            }
            Err(Divergence::Content { diff }) => {
                warn!("Reject set: mails are too dissimilar in content.");
                if let Some(diff) = diff {
                    info!("\n{}", diff);
                }
                return SetOutcome::RejectedContent;
            }
            Ok(()) => {}
        }

        let Some(strategy) = strategy else {
            warn!("No strategy selected, skip selection.");
            return SetOutcome::Skipped;
        };

        let chosen = strategy.choose(self);
        let candidates: Vec<MailRef> = self
            .pool
            .iter()
            .filter(|mail| chosen.contains(mail))
            .map(Mail::mail_ref)
            .collect();

        if candidates.len() == self.pool.len() {
            warn!(
                "Skip whole set, all {} mails within were selected by {}.",
                candidates.len(),
                strategy.name()
            );
            return SetOutcome::Skipped;
        }

        info!("{} mail candidates selected for action.", candidates.len());
        SetOutcome::Deduplicated(candidates)
    }
}

fn display_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|date| date.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

fn pretty_diff(a: &Mail, a_lines: &[String], b: &Mail, b_lines: &[String]) -> String {
    unified_diff(
        a_lines,
        b_lines,
        &format!("Normalized body of {}", a.path().display()),
        &format!("Normalized body of {}", b.path().display()),
        &display_date(a.timestamp()),
        &display_date(b.timestamp()),
    )
}
