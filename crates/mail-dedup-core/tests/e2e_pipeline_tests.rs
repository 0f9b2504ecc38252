use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use mail_dedup_core::{
    AppConfig, Deduplicate, DuplicateSet, Mail, SelectionStrategy, SilentReporter, Stats,
};

fn mail(message_id: &str, body: &str) -> String {
    format!(
        "Date: Tue, 1 Jun 2021 10:00:00 +0000\n\
         From: alice@example.com\n\
         To: bob@example.com\n\
         Subject: Meeting notes\n\
         MIME-Version: 1.0\n\
         Content-Type: text/plain\n\
         Message-ID: <{message_id}@example.com>\n\
         \n\
         {body}"
    )
}

/// Create a maildir holding the given `(file name, content)` mails in `cur/`.
fn create_maildir(root: &Path, mails: &[(&str, String)]) -> PathBuf {
    for sub in ["cur", "new", "tmp"] {
        fs::create_dir_all(root.join(sub)).unwrap();
    }
    for (name, content) in mails {
        fs::write(root.join("cur").join(name), content).unwrap();
    }
    root.to_path_buf()
}

fn create_mbox(path: &Path, mails: &[String]) -> PathBuf {
    let content: String = mails
        .iter()
        .map(|mail| format!("From alice@example.com Tue Jun  1 10:00:00 2021\n{mail}\n"))
        .collect();
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

fn count_mails(maildir: &Path) -> usize {
    fs::read_dir(maildir.join("cur")).unwrap().count()
}

fn run(conf: AppConfig, sources: &[PathBuf]) -> (Stats, Deduplicate) {
    let mut dedup = Deduplicate::new(conf).unwrap();
    let stats = dedup.run(sources, &SilentReporter).unwrap();
    (stats, dedup)
}

fn with_strategy(name: &str) -> AppConfig {
    AppConfig {
        strategy: Some(name.to_string()),
        ..Default::default()
    }
}

/// Picks every mail of a set.
struct Greedy;

impl SelectionStrategy for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn choose<'a>(&self, set: &'a DuplicateSet) -> Vec<&'a Mail> {
        set.mails().iter().collect()
    }
}

#[test]
fn test_duplicate_across_two_sources() {
    let tmp = tempdir().unwrap();
    let first = create_maildir(&tmp.path().join("first"), &[("1", mail("a", "hello\n"))]);
    let second = create_maildir(&tmp.path().join("second"), &[("1", mail("a", "hello\n"))]);

    let (stats, dedup) = run(with_strategy("select-one"), &[first.clone(), second.clone()]);

    assert_eq!(stats.mail_found, 2);
    assert_eq!(stats.set_total, 1);
    assert_eq!(stats.mail_duplicates, 2);
    assert_eq!(stats.mail_selected, 1);
    assert_eq!(stats.mail_discarded, 1);
    assert_eq!(stats.set_deduplicated, 1);
    assert_eq!(stats.mail_deleted, 1);
    assert_eq!(dedup.selection().len(), 1);

    // select-one orders by source path, so the first maildir loses its copy.
    assert_eq!(count_mails(&first), 0, "Copy in first source should be removed");
    assert_eq!(count_mails(&second), 1, "Copy in second source should be kept");
}

#[test]
fn test_unique_mail_is_ignored() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(&tmp.path().join("inbox"), &[("1", mail("a", "hello\n"))]);

    let (stats, dedup) = run(with_strategy("select-one"), &[inbox.clone()]);

    assert_eq!(stats.mail_unique, 1);
    assert_eq!(stats.set_ignored, 1);
    assert_eq!(stats.mail_selected, 0);
    assert!(dedup.selection().is_empty());
    assert_eq!(count_mails(&inbox), 1);
}

#[test]
fn test_content_divergence_rejects_the_set() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[
            ("1", mail("a", "hello world\n")),
            ("2", mail("a", "goodbye world\n")),
        ],
    );
    let conf = AppConfig {
        content_threshold: 5,
        ..with_strategy("select-one")
    };

    let (stats, _) = run(conf, &[inbox.clone()]);

    assert_eq!(stats.set_rejected_content, 1);
    assert_eq!(stats.mail_discarded, 2);
    assert_eq!(stats.mail_selected, 0);
    assert_eq!(count_mails(&inbox), 2);
}

#[test]
fn test_size_divergence_rejects_the_set() {
    let tmp = tempdir().unwrap();
    let long_body = "padding\n".repeat(100);
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[("1", mail("a", "short\n")), ("2", mail("a", &long_body))],
    );

    let (stats, _) = run(with_strategy("select-one"), &[inbox.clone()]);

    assert_eq!(stats.set_rejected_size, 1);
    assert_eq!(stats.mail_discarded, 2);
    assert_eq!(count_mails(&inbox), 2);
}

#[test]
fn test_no_strategy_skips_the_set() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[
            ("1", mail("a", "hello\n")),
            ("2", mail("a", "hello\n")),
            ("3", mail("a", "hello\n")),
        ],
    );

    let (stats, _) = run(AppConfig::default(), &[inbox.clone()]);

    assert_eq!(stats.set_skipped, 1);
    assert_eq!(stats.mail_discarded, 3);
    assert_eq!(stats.mail_deleted, 0);
    assert_eq!(count_mails(&inbox), 3);
}

#[test]
fn test_strategy_selecting_everything_is_skipped() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[("1", mail("a", "hello\n")), ("2", mail("a", "hello\n"))],
    );

    let mut dedup = Deduplicate::new(AppConfig::default())
        .unwrap()
        .with_strategy(Box::new(Greedy));
    let stats = dedup.run(&[inbox.clone()], &SilentReporter).unwrap();

    assert_eq!(stats.set_skipped, 1);
    assert_eq!(stats.mail_selected, 0);
    assert_eq!(stats.mail_deleted, 0);
    assert_eq!(count_mails(&inbox), 2);
}

#[test]
fn test_dry_run_leaves_the_store_unchanged() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[("1", mail("a", "hello\n")), ("2", mail("a", "hello\n"))],
    );
    let conf = AppConfig {
        dry_run: true,
        ..with_strategy("select-one")
    };

    let (stats, _) = run(conf.clone(), &[inbox.clone()]);
    assert_eq!(stats.mail_selected, 1);
    assert_eq!(stats.mail_deleted, 1);
    assert_eq!(count_mails(&inbox), 2);

    // A second pass finds the very same duplicate set.
    let (rerun, _) = run(conf, &[inbox.clone()]);
    assert_eq!(rerun, stats);
}

#[test]
fn test_rerun_after_removal_finds_no_duplicates() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[
            ("1", mail("a", "hello\n")),
            ("2", mail("a", "hello\n")),
            ("3", mail("b", "other\n")),
        ],
    );

    let (first, _) = run(with_strategy("select-all-but-one"), &[inbox.clone()]);
    assert_eq!(first.mail_deleted, 1);
    assert_eq!(count_mails(&inbox), 2);

    let (second, dedup) = run(with_strategy("select-all-but-one"), &[inbox.clone()]);
    assert_eq!(second.mail_duplicates, 0);
    assert_eq!(second.mail_unique, 2);
    assert_eq!(second.mail_deleted, 0);
    assert!(dedup.selection().is_empty());
    assert_eq!(count_mails(&inbox), 2);
}

#[test]
fn test_mbox_source() {
    let tmp = tempdir().unwrap();
    let mbox = create_mbox(
        &tmp.path().join("archive.mbox"),
        &[
            mail("a", "hello\n"),
            mail("b", "something else\n"),
            mail("a", "hello\n"),
        ],
    );

    let (stats, _) = run(with_strategy("discard-one"), &[mbox.clone()]);

    assert_eq!(stats.mail_found, 3);
    assert_eq!(stats.set_deduplicated, 1);
    assert_eq!(stats.set_ignored, 1);
    assert_eq!(stats.mail_deleted, 1);

    let content = fs::read_to_string(&mbox).unwrap();
    assert_eq!(content.matches("Message-ID: <a@example.com>").count(), 1);
    assert_eq!(content.matches("Message-ID: <b@example.com>").count(), 1);
    assert!(
        !tmp.path().join("archive.mbox.lock").exists(),
        "Lock should be released after the run"
    );
}

#[test]
fn test_mbox_removals_from_one_set() {
    let tmp = tempdir().unwrap();
    let mbox = create_mbox(
        &tmp.path().join("archive.mbox"),
        &[
            mail("a", "hello\n"),
            mail("a", "hello\n"),
            mail("b", "something else\n"),
            mail("a", "hello\n"),
            mail("a", "hello\n"),
        ],
    );

    let (stats, _) = run(with_strategy("select-all-but-one"), &[mbox.clone()]);

    assert_eq!(stats.mail_selected, 3);
    assert_eq!(stats.mail_deleted, 3);
    let content = fs::read_to_string(&mbox).unwrap();
    assert_eq!(content.matches("Message-ID: <a@example.com>").count(), 1);
    assert_eq!(content.matches("Message-ID: <b@example.com>").count(), 1);
    assert!(
        !tmp.path().join("archive.mbox.mdedup-tmp").exists(),
        "Temporary rewrite file should be renamed over the mbox"
    );
}

#[test]
fn test_mixed_maildir_and_mbox() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(&tmp.path().join("inbox"), &[("1", mail("a", "hello\n"))]);
    let mbox = create_mbox(&tmp.path().join("archive.mbox"), &[mail("a", "hello\n")]);
    let conf = AppConfig {
        regexp: Some(r"\.mbox$".to_string()),
        ..with_strategy("select-matching-path")
    };

    let (stats, _) = run(conf, &[inbox.clone(), mbox.clone()]);

    assert_eq!(stats.mail_deleted, 1);
    assert_eq!(count_mails(&inbox), 1);
    assert!(!fs::read_to_string(&mbox).unwrap().contains("Message-ID"));
}

#[test]
fn test_mails_with_too_few_headers_are_rejected() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[
            ("1", "Subject: bare\n\nno headers to speak of\n".to_string()),
            ("2", mail("a", "hello\n")),
        ],
    );

    let (stats, _) = run(with_strategy("select-one"), &[inbox.clone()]);

    assert_eq!(stats.mail_found, 2);
    assert_eq!(stats.mail_rejected, 1);
    assert_eq!(stats.mail_retained, 1);
    assert_eq!(count_mails(&inbox), 2);
}

#[test]
fn test_report_lists_every_counter() {
    let tmp = tempdir().unwrap();
    let inbox = create_maildir(
        &tmp.path().join("inbox"),
        &[("1", mail("a", "hello\n")), ("2", mail("a", "hello\n"))],
    );

    let (_, dedup) = run(with_strategy("select-newest"), &[inbox]);
    let report = dedup.report();
    for counter in [
        "mail_found",
        "mail_rejected",
        "mail_retained",
        "mail_unique",
        "mail_duplicates",
        "mail_discarded",
        "mail_selected",
        "mail_copied",
        "mail_moved",
        "mail_deleted",
        "set_total",
        "set_ignored",
        "set_skipped",
        "set_rejected_encoding",
        "set_rejected_size",
        "set_rejected_content",
        "set_deduplicated",
    ] {
        assert!(report.contains(counter), "Report should mention {counter}");
    }
}
