use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::duplicate_set::DuplicateSet;
use crate::error::Error;
use crate::mail::{Mail, MailId, MailRef};
use crate::mailbox::{open_box, Mailbox};
use crate::progress::ProgressReporter;
use crate::stats::{InvariantViolation, Stats};
use crate::strategy::{SelectionStrategy, Strategy};

struct Source {
    path: PathBuf,
    mailbox: Box<dyn Mailbox>,
}

/// Mails sharing a hash key, in visiting order.
struct Bucket {
    hash_key: String,
    mails: Vec<Mail>,
}

/// Deduplication run over a set of registered mail sources.
///
/// Stages run in order: `add_source`, `hash_all`, `select_all`,
/// `remove_selection`, then `check_stats`. `run` chains all of them.
pub struct Deduplicate {
    conf: AppConfig,
    strategy: Option<Box<dyn SelectionStrategy>>,
    sources: Vec<Source>,
    buckets: Vec<Bucket>,
    bucket_index: HashMap<String, usize>,
    selection: Vec<MailRef>,
    stats: Stats,
    sources_closed: bool,
}

impl Deduplicate {
    /// Resolves the configured strategy, if any.
    pub fn new(conf: AppConfig) -> Result<Self, Error> {
        let strategy = match conf.strategy_name() {
            Some(name) => {
                let strategy = Strategy::resolve(name, conf.regexp.as_deref())?;
                Some(Box::new(strategy) as Box<dyn SelectionStrategy>)
            }
            None => None,
        };

        Ok(Self {
            conf,
            strategy,
            sources: Vec::new(),
            buckets: Vec::new(),
            bucket_index: HashMap::new(),
            selection: Vec::new(),
            stats: Stats::default(),
            sources_closed: false,
        })
    }

    /// Replace the configured strategy with a custom one.
    pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.conf
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Mails chosen for removal, in bucket order.
    pub fn selection(&self) -> &[MailRef] {
        &self.selection
    }

    pub fn source_paths(&self) -> Vec<&Path> {
        self.sources.iter().map(|source| source.path.as_path()).collect()
    }

    pub fn add_source(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = fs::canonicalize(path.as_ref())?;
        if self.sources.iter().any(|source| source.path == path) {
            return Err(Error::DuplicateSource(path));
        }

        let mailbox = open_box(&path, self.conf.input_format, self.conf.force_unlock)?;
        let found = mailbox.len();
        info!("{} mails found in {}", found, path.display());

        self.stats.mail_found += found as u64;
        self.sources.push(Source { path, mailbox });
        Ok(())
    }

    /// Parse every mail of every source and group them by hash key.
    pub fn hash_all(&mut self, reporter: &dyn ProgressReporter) -> Result<(), Error> {
        info!(
            "Use [{}] headers to compute hashes.",
            self.conf.hash_headers.join(", ")
        );
        let start = Instant::now();
        let total: usize = self.sources.iter().map(|source| source.mailbox.len()).sum();
        reporter.on_hash_start(total);

        let mut done = 0;
        for source in &self.sources {
            for mail_id in source.mailbox.ids() {
                let raw = source.mailbox.read(&mail_id)?;
                let mail = Mail::parse(&source.path, mail_id, raw, &self.conf);

                match mail.hash_key() {
                    Ok(hash_key) => {
                        debug!("{} hashed to {}", mail.mail_ref(), hash_key);
                        insert_into_bucket(
                            &mut self.buckets,
                            &mut self.bucket_index,
                            hash_key,
                            mail,
                        );
                        self.stats.mail_retained += 1;
                    }
                    Err(err) => {
                        warn!("Rejecting {}: {}", mail.mail_ref(), err);
                        self.stats.mail_rejected += 1;
                    }
                }

                done += 1;
                reporter.on_hash_progress(done, total);
            }
        }

        info!(
            "{} unique hashes found out of {} mails.",
            self.buckets.len(),
            self.stats.mail_retained
        );
        reporter.on_hash_complete(self.buckets.len(), start.elapsed().as_secs_f64());
        Ok(())
    }

    /// Resolve each duplicate set in turn and collect the mails to remove.
    /// Sources are closed once every set is resolved.
    pub fn select_all(&mut self, reporter: &dyn ProgressReporter) -> Result<(), Error> {
        let start = Instant::now();
        let buckets = std::mem::take(&mut self.buckets);
        self.bucket_index.clear();

        let total = buckets.len();
        self.stats.set_total += total as u64;
        reporter.on_select_start(total);

        let strategy = self.strategy.as_deref();
        for (done, bucket) in buckets.into_iter().enumerate() {
            let count = bucket.mails.len();
            if count > 1 {
                info!("◼ {} mails sharing hash {}", count, bucket.hash_key);
            } else {
                debug!("◼ {} mail with hash {}", count, bucket.hash_key);
            }

            let set = DuplicateSet::new(bucket.hash_key, bucket.mails, &self.conf);
            let resolution = set.select_candidates(strategy);
            self.selection
                .extend(resolution.outcome.candidates().iter().cloned());
            self.stats += resolution.stats;

            reporter.on_select_progress(done + 1, total);
        }

        self.close_sources()?;
        info!("{} mails selected for removal.", self.selection.len());
        reporter.on_select_complete(self.selection.len(), start.elapsed().as_secs_f64());
        Ok(())
    }

    fn close_sources(&mut self) -> Result<(), Error> {
        if self.sources_closed {
            return Ok(());
        }
        for source in &mut self.sources {
            source.mailbox.close()?;
        }
        self.sources_closed = true;
        Ok(())
    }

    /// Delete the selected mails in place, or only log them in dry-run mode.
    pub fn remove_selection(&mut self, reporter: &dyn ProgressReporter) -> Result<(), Error> {
        let mut seen = HashSet::with_capacity(self.selection.len());
        if let Some(twice) = self.selection.iter().find(|mail_ref| !seen.insert(*mail_ref)) {
            let violation = InvariantViolation::new(
                "selection holds each mail at most once",
                format!("{} selected twice", twice),
            );
            error!("{}", violation);
            return Err(violation.into());
        }

        let start = Instant::now();
        let total = self.selection.len();
        reporter.on_remove_start(total);
        if self.conf.dry_run {
            warn!("DRY RUN: no mail will be removed.");
        }

        // One batch per source, in order of first appearance.
        let mut batches: Vec<(usize, Vec<MailId>)> = Vec::new();
        for mail_ref in &self.selection {
            let index = self
                .sources
                .iter()
                .position(|source| source.path == mail_ref.source_path)
                .ok_or_else(|| Error::UnknownSource(mail_ref.source_path.clone()))?;
            match batches.iter_mut().find(|(batch, _)| *batch == index) {
                Some((_, ids)) => ids.push(mail_ref.mail_id.clone()),
                None => batches.push((index, vec![mail_ref.mail_id.clone()])),
            }
        }

        let mut done = 0;
        for (index, ids) in batches {
            let Source { path, mailbox } = &mut self.sources[index];
            if self.conf.dry_run {
                for id in &ids {
                    warn!("DRY RUN: skip deletion of {}:{}.", path.display(), id);
                    self.stats.mail_deleted += 1;
                    done += 1;
                    reporter.on_remove_progress(done, total);
                }
                continue;
            }

            debug!("Deleting {} mails in-place from {}...", ids.len(), path.display());
            let stats = &mut self.stats;
            mailbox.remove_many(&ids, &mut |id| {
                info!("{}:{} deleted.", path.display(), id);
                stats.mail_deleted += 1;
                done += 1;
                reporter.on_remove_progress(done, total);
            })?;
        }

        reporter.on_remove_complete(total, start.elapsed().as_secs_f64());
        Ok(())
    }

    pub fn check_stats(&self) -> Result<(), Error> {
        self.stats.check().map_err(|violation| {
            error!("{}", violation);
            Error::Invariant(violation)
        })
    }

    pub fn report(&self) -> String {
        self.stats.report()
    }

    /// Full pipeline: register sources, group, select, remove, then verify
    /// the counters.
    pub fn run<P: AsRef<Path>>(
        &mut self,
        sources: &[P],
        reporter: &dyn ProgressReporter,
    ) -> Result<Stats, Error> {
        for source in sources {
            self.add_source(source)?;
        }
        self.hash_all(reporter)?;
        self.select_all(reporter)?;
        self.remove_selection(reporter)?;
        self.check_stats()?;
        Ok(self.stats)
    }
}

fn insert_into_bucket(
    buckets: &mut Vec<Bucket>,
    index: &mut HashMap<String, usize>,
    hash_key: String,
    mail: Mail,
) {
    match index.get(&hash_key) {
        Some(&position) => {
            let bucket = &mut buckets[position];
            if !bucket.mails.contains(&mail) {
                bucket.mails.push(mail);
            }
        }
        None => {
            index.insert(hash_key.clone(), buckets.len());
            buckets.push(Bucket {
                hash_key,
                mails: vec![mail],
            });
        }
    }
}
