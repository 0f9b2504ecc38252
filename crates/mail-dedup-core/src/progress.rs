/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. Reporting is a passive side
/// channel: the engine never depends on what a reporter does.
/// All methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_hash_start(&self, _total_mails: usize) {}
    fn on_hash_progress(&self, _mails_hashed: usize, _total_mails: usize) {}
    fn on_hash_complete(&self, _total_sets: usize, _duration_secs: f64) {}
    fn on_select_start(&self, _total_sets: usize) {}
    fn on_select_progress(&self, _sets_done: usize, _total_sets: usize) {}
    fn on_select_complete(&self, _selected: usize, _duration_secs: f64) {}
    fn on_remove_start(&self, _total_mails: usize) {}
    fn on_remove_progress(&self, _mails_done: usize, _total_mails: usize) {}
    fn on_remove_complete(&self, _removed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
