use std::cell::RefCell;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mail_dedup_core::ProgressReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars, one per stage:
/// hashing mails, resolving duplicate sets, removing the selection.
pub struct CliReporter {
    bar: RefCell<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: RefCell::new(None),
        }
    }

    fn start_bar(&self, label: &str, unit: &str, total: usize) {
        let template =
            format!("  {{spinner:.cyan}} {label} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {unit}");
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Some(old) = self.bar.replace(Some(pb)) {
            old.finish_and_clear();
        }
    }

    fn advance(&self, done: usize) {
        if let Some(pb) = self.bar.borrow().as_ref() {
            pb.set_position(done as u64);
        }
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_hash_start(&self, total_mails: usize) {
        self.start_bar("Hashing", "mails", total_mails);
    }

    fn on_hash_progress(&self, mails_hashed: usize, _total_mails: usize) {
        self.advance(mails_hashed);
    }

    fn on_hash_complete(&self, total_sets: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Hash complete: {} distinct hashes in {:.2}s",
            total_sets, duration_secs
        );
    }

    fn on_select_start(&self, total_sets: usize) {
        self.start_bar("Selecting", "sets", total_sets);
    }

    fn on_select_progress(&self, sets_done: usize, _total_sets: usize) {
        self.advance(sets_done);
    }

    fn on_select_complete(&self, selected: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Selection complete: {} mails selected in {:.2}s",
            selected, duration_secs
        );
    }

    fn on_remove_start(&self, total_mails: usize) {
        self.start_bar("Removing", "mails", total_mails);
    }

    fn on_remove_progress(&self, mails_done: usize, _total_mails: usize) {
        self.advance(mails_done);
    }

    fn on_remove_complete(&self, removed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Removal complete: {} mails processed in {:.2}s",
            removed, duration_secs
        );
    }
}
