mod commands;
mod logging;
mod progress;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use mail_dedup_core::config::load_configuration;
use mail_dedup_core::mailbox::RawMail;
use mail_dedup_core::strategy::{ALIASES, STRATEGIES};
use mail_dedup_core::{AppConfig, Deduplicate, Error, Mail, MailId};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::from(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Dedup(dedup_args)) => {
            dedup_args.apply(&mut config);
            run_dedup(&config)
        }
        Some(Commands::Hash { mail_file }) => run_hash(&config, &mail_file),
        Some(Commands::Strategies) => {
            print_strategies();
            Ok(())
        }
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let invariant = err
                .downcast_ref::<Error>()
                .is_some_and(Error::is_invariant);
            if invariant {
                error!("Internal error, please report it: {:#}", err);
                ExitCode::from(2)
            } else {
                error!("Error: {:#}", err);
                ExitCode::from(1)
            }
        }
    }
}

fn run_dedup(config: &AppConfig) -> anyhow::Result<()> {
    if config.sources.is_empty() {
        bail!("no mail source given");
    }
    if config.dry_run {
        warn!("{}", "DRY RUN: mails will not be removed.".yellow());
    }

    let mut dedup = Deduplicate::new(config.clone())?;
    let reporter = CliReporter::new();
    let result = dedup.run(config.sources.as_slice(), &reporter);

    println!();
    println!("{}", dedup.report());
    let stats = result?;

    info!(
        "{} mails found, {} duplicates in {} sets, {} deleted",
        format!("{}", stats.mail_found).green(),
        format!("{}", stats.mail_duplicates).red(),
        format!("{}", stats.set_deduplicated).red(),
        format!("{}", stats.mail_deleted).cyan(),
    );
    Ok(())
}

fn run_hash(config: &AppConfig, mail_file: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(mail_file)
        .with_context(|| format!("cannot read {}", mail_file.display()))?;
    let modified = fs::metadata(mail_file)?.modified().ok();
    let source_path = mail_file.parent().map(Path::to_path_buf).unwrap_or_default();
    let mail_id = MailId(
        mail_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );

    let raw = RawMail {
        bytes,
        path: PathBuf::from(mail_file),
        modified,
    };
    let mail = Mail::parse(&source_path, mail_id, raw, config);

    println!("{}", "Canonical headers:".bold());
    print!("{}", mail.canonical_headers_text());
    let hash_key = mail
        .hash_key()
        .with_context(|| format!("cannot hash {}", mail_file.display()))?;
    println!("{} {}", "Hash key:".bold(), hash_key.as_str().green());
    Ok(())
}

fn print_strategies() {
    println!("{}", "Strategies:".bold());
    for info in STRATEGIES {
        println!("  {:<26} {}", info.name.green(), info.description);
    }
    println!("{}", "Aliases:".bold());
    for (alias, target) in ALIASES {
        println!("  {:<26} same as {}", alias.cyan(), target);
    }
}

fn print_config(config: &AppConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string(config).context("cannot render configuration")?;
    println!("{}", rendered);
    Ok(())
}
