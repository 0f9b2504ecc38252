use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mail_dedup_core::config::{InputFormat, TimeSource};
use mail_dedup_core::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "mdedup")]
#[command(about = "Find and remove duplicate mails in maildirs and mbox files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Group duplicate mails of the given sources and remove the selected ones
    Dedup(DedupArgs),
    /// Print the canonical headers and hash key of a single raw mail file
    Hash {
        mail_file: PathBuf,
    },
    /// List selection strategies and their aliases
    Strategies,
    /// Print configuration values
    PrintConfig,
}

/// Flags override values from `Config.toml` and the environment.
#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Maildir folders or mbox files
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Force the format of every source instead of detecting it
    #[arg(short, long)]
    pub input_format: Option<InputFormat>,

    /// Remove stale mbox lock files
    #[arg(short = 'u', long)]
    pub force_unlock: bool,

    /// Headers used to compute the hash of each mail
    #[arg(long = "hash-header", value_delimiter = ',')]
    pub hash_headers: Vec<String>,

    /// Maximum size difference in bytes within a set, negative to disable
    #[arg(short = 'S', long, allow_negative_numbers = true)]
    pub size_threshold: Option<i64>,

    /// Maximum content difference in bytes within a set, negative to disable
    #[arg(short = 'C', long, allow_negative_numbers = true)]
    pub content_threshold: Option<i64>,

    /// Strategy selecting the mails to remove from each duplicate set
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Regular expression for path-based strategies
    #[arg(short, long)]
    pub regexp: Option<String>,

    /// Source of mail timestamps: date-header or mtime
    #[arg(short, long)]
    pub time_source: Option<TimeSource>,

    /// Log the removals without performing them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Log the diff of mails rejected for their content
    #[arg(short = 'd', long)]
    pub show_diff: bool,
}

impl DedupArgs {
    pub fn apply(self, config: &mut AppConfig) {
        config.sources = self.sources;
        if self.input_format.is_some() {
            config.input_format = self.input_format;
        }
        config.force_unlock |= self.force_unlock;
        if !self.hash_headers.is_empty() {
            config.hash_headers = self.hash_headers;
        }
        if let Some(threshold) = self.size_threshold {
            config.size_threshold = threshold;
        }
        if let Some(threshold) = self.content_threshold {
            config.content_threshold = threshold;
        }
        if self.strategy.is_some() {
            config.strategy = self.strategy;
        }
        if self.regexp.is_some() {
            config.regexp = self.regexp;
        }
        if let Some(time_source) = self.time_source {
            config.time_source = time_source;
        }
        config.dry_run |= self.dry_run;
        config.show_diff |= self.show_diff;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> DedupArgs {
        match Cli::parse_from(args).command {
            Some(Commands::Dedup(args)) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "mdedup",
            "dedup",
            "--strategy",
            "discard-newest",
            "--size-threshold",
            "-1",
            "--hash-header",
            "From,Subject",
            "--dry-run",
            "inbox",
            "archive.mbox",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.sources, vec!["inbox", "archive.mbox"]);
        assert_eq!(config.strategy_name(), Some("discard-newest"));
        assert_eq!(config.size_threshold, -1);
        assert_eq!(config.content_threshold, 768);
        assert_eq!(config.hash_headers, vec!["From", "Subject"]);
        assert!(config.dry_run);
    }

    #[test]
    fn test_typed_flags() {
        let args = parse(&["mdedup", "dedup", "-i", "mbox", "-t", "mtime", "archive.mbox"]);
        assert_eq!(args.input_format, Some(InputFormat::Mbox));
        assert_eq!(args.time_source, Some(TimeSource::Mtime));
    }
}
