use std::ops::{Add, AddAssign};

use tabled::settings::Style;
use tabled::{Table, Tabled};
use thiserror::Error;

/// Mail-level and set-level counters of a deduplication run.
///
/// Each stage produces its own `Stats` value and the engine merges them
/// with `+=`, so merge order never matters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Total number of mails encountered from all mail sources.
    pub mail_found: u64,
    /// Mails ignored because they were faulty or unparseable.
    pub mail_rejected: u64,
    /// Valid mails parsed and retained for deduplication.
    pub mail_retained: u64,
    /// Mails which ended up alone in their duplicate set.
    pub mail_unique: u64,
    /// Sum of mails in all duplicate sets with at least 2 mails.
    pub mail_duplicates: u64,
    /// Mails kept out of the final selection.
    pub mail_discarded: u64,
    /// Mails in the final selection.
    pub mail_selected: u64,
    pub mail_copied: u64,
    pub mail_moved: u64,
    /// Mails deleted in-place from their mailbox.
    pub mail_deleted: u64,

    pub set_total: u64,
    /// Sets holding a single, unique mail.
    pub set_ignored: u64,
    /// Valid sets on which no decision was taken.
    pub set_skipped: u64,
    pub set_rejected_encoding: u64,
    pub set_rejected_size: u64,
    pub set_rejected_content: u64,
    pub set_deduplicated: u64,
}

impl Add for Stats {
    type Output = Stats;

    fn add(mut self, rhs: Stats) -> Stats {
        self += rhs;
        self
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, rhs: Stats) {
        self.mail_found += rhs.mail_found;
        self.mail_rejected += rhs.mail_rejected;
        self.mail_retained += rhs.mail_retained;
        self.mail_unique += rhs.mail_unique;
        self.mail_duplicates += rhs.mail_duplicates;
        self.mail_discarded += rhs.mail_discarded;
        self.mail_selected += rhs.mail_selected;
        self.mail_copied += rhs.mail_copied;
        self.mail_moved += rhs.mail_moved;
        self.mail_deleted += rhs.mail_deleted;
        self.set_total += rhs.set_total;
        self.set_ignored += rhs.set_ignored;
        self.set_skipped += rhs.set_skipped;
        self.set_rejected_encoding += rhs.set_rejected_encoding;
        self.set_rejected_size += rhs.set_rejected_size;
        self.set_rejected_content += rhs.set_rejected_content;
        self.set_deduplicated += rhs.set_deduplicated;
    }
}

/// A consistency equation over the counters that does not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{check} does not hold ({details})")]
pub struct InvariantViolation {
    pub check: &'static str,
    pub details: String,
}

impl InvariantViolation {
    pub fn new(check: &'static str, details: impl Into<String>) -> Self {
        Self {
            check,
            details: details.into(),
        }
    }
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    label: &'static str,
    #[tabled(rename = "Counter")]
    counter: &'static str,
    #[tabled(rename = "Value")]
    value: u64,
}

impl Stats {
    /// Run the high-level consistency checks on the counters.
    ///
    /// Meant for a completed run: grouping, selection and removal.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        let s = self;

        if s.mail_found != s.mail_rejected + s.mail_retained {
            return Err(InvariantViolation::new(
                "mail_found == mail_rejected + mail_retained",
                format!("{} != {} + {}", s.mail_found, s.mail_rejected, s.mail_retained),
            ));
        }
        if s.mail_retained != s.mail_unique + s.mail_duplicates {
            return Err(InvariantViolation::new(
                "mail_retained == mail_unique + mail_duplicates",
                format!("{} != {} + {}", s.mail_retained, s.mail_unique, s.mail_duplicates),
            ));
        }
        if s.mail_retained != s.mail_discarded + s.mail_selected {
            return Err(InvariantViolation::new(
                "mail_retained == mail_discarded + mail_selected",
                format!("{} != {} + {}", s.mail_retained, s.mail_discarded, s.mail_selected),
            ));
        }
        if s.mail_selected != s.mail_copied + s.mail_moved + s.mail_deleted {
            return Err(InvariantViolation::new(
                "mail_selected == mail_copied + mail_moved + mail_deleted",
                format!(
                    "{} != {} + {} + {}",
                    s.mail_selected, s.mail_copied, s.mail_moved, s.mail_deleted
                ),
            ));
        }
        if s.mail_retained < s.mail_deleted {
            return Err(InvariantViolation::new(
                "mail_retained >= mail_deleted",
                format!("{} < {}", s.mail_retained, s.mail_deleted),
            ));
        }
        if s.mail_duplicates != 0 && s.mail_duplicates <= s.mail_deleted {
            return Err(InvariantViolation::new(
                "mail_duplicates == 0 or mail_duplicates > mail_deleted",
                format!("{} <= {}", s.mail_duplicates, s.mail_deleted),
            ));
        }
        if s.set_ignored != s.mail_unique {
            return Err(InvariantViolation::new(
                "set_ignored == mail_unique",
                format!("{} != {}", s.set_ignored, s.mail_unique),
            ));
        }
        let set_outcomes = s.set_ignored
            + s.set_rejected_encoding
            + s.set_rejected_size
            + s.set_rejected_content
            + s.set_skipped
            + s.set_deduplicated;
        if s.set_total != set_outcomes {
            return Err(InvariantViolation::new(
                "set_total == sum of set outcomes",
                format!("{} != {}", s.set_total, set_outcomes),
            ));
        }

        Ok(())
    }

    fn mail_rows(&self) -> Vec<StatRow> {
        vec![
            row("Found", "mail_found", self.mail_found),
            row("Rejected", "mail_rejected", self.mail_rejected),
            row("Retained", "mail_retained", self.mail_retained),
            row("Unique", "mail_unique", self.mail_unique),
            row("Duplicates", "mail_duplicates", self.mail_duplicates),
            row("Discarded", "mail_discarded", self.mail_discarded),
            row("Selected", "mail_selected", self.mail_selected),
            row("Copied", "mail_copied", self.mail_copied),
            row("Moved", "mail_moved", self.mail_moved),
            row("Deleted", "mail_deleted", self.mail_deleted),
        ]
    }

    fn set_rows(&self) -> Vec<StatRow> {
        vec![
            row("Total", "set_total", self.set_total),
            row("Ignored", "set_ignored", self.set_ignored),
            row("Skipped", "set_skipped", self.set_skipped),
            row("Rejected (bad encoding)", "set_rejected_encoding", self.set_rejected_encoding),
            row("Rejected (too dissimilar in size)", "set_rejected_size", self.set_rejected_size),
            row(
                "Rejected (too dissimilar in content)",
                "set_rejected_content",
                self.set_rejected_content,
            ),
            row("Deduplicated", "set_deduplicated", self.set_deduplicated),
        ]
    }

    /// Text report of the mail counters followed by the duplicate set counters.
    pub fn report(&self) -> String {
        let mut mails = Table::new(self.mail_rows());
        mails.with(Style::modern());

        let mut sets = Table::new(self.set_rows());
        sets.with(Style::modern());

        format!("Mails\n{mails}\nDuplicate sets\n{sets}")
    }
}

fn row(label: &'static str, counter: &'static str, value: u64) -> StatRow {
    StatRow {
        label,
        counter,
        value,
    }
}
