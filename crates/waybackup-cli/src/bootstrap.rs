//! Composition root: configuration derivation and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use waybackup_core::{BackupConfig, Mode, default_output_dir};

use crate::parser::Cli;

/// Derive the immutable job configuration from the parsed arguments.
pub fn build_config(cli: &Cli) -> Result<BackupConfig> {
    let mode = if cli.all {
        Mode::All
    } else if cli.first {
        Mode::First
    } else {
        Mode::Last
    };

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let output = cli
        .output
        .as_ref()
        .map_or_else(|| default_output_dir(&cwd), PathBuf::from);
    let output = absolutize(&output, &cwd);
    let metadata = cli
        .metadata
        .as_ref()
        .map_or_else(|| output.clone(), |m| absolutize(Path::new(m), &cwd));

    let config = BackupConfig {
        url: cli.url.clone(),
        mode,
        explicit: cli.explicit,
        range_years: cli.range,
        start: cli.start.clone(),
        end: cli.end.clone(),
        limit: cli.limit,
        filetypes: split_list(cli.filetype.as_deref()),
        statuscodes: split_list(cli.statuscode.as_deref()),
        output,
        metadata,
        no_redirect: cli.no_redirect,
        retry: cli.retry,
        workers: cli.workers.max(1),
        delay_secs: cli.delay,
        keep: cli.keep,
        reset: cli.reset,
    };

    config.validate()?;
    Ok(config)
}

/// Initialize the tracing stack: env-filtered stderr output, plus an
/// optional plain-text log file.
pub fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(())
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["waybackup"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn filter_lists_are_split_and_lowercased() {
        let cli = cli(&[
            "-u",
            "http://h.example",
            "--all",
            "--filetype",
            "JPG, css,,js",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.filetypes, vec!["jpg", "css", "js"]);
        assert!(config.statuscodes.is_empty());
    }

    #[test]
    fn output_defaults_under_the_working_directory() {
        let cli = cli(&["-u", "http://h.example", "--last"]);
        let config = build_config(&cli).unwrap();
        assert!(config.output.is_absolute());
        assert!(config.output.ends_with("waybackup_snapshots"));
        // metadata defaults to the output folder
        assert_eq!(config.metadata, config.output);
    }

    #[test]
    fn mode_flags_map_to_modes() {
        assert_eq!(
            build_config(&cli(&["-u", "http://h.example", "--all"]))
                .unwrap()
                .mode,
            Mode::All
        );
        assert_eq!(
            build_config(&cli(&["-u", "http://h.example", "--first"]))
                .unwrap()
                .mode,
            Mode::First
        );
        assert_eq!(
            build_config(&cli(&["-u", "http://h.example", "--last"]))
                .unwrap()
                .mode,
            Mode::Last
        );
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let cli = cli(&["-u", "http://h.example", "--all", "--start", "2020"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let cli = cli(&["-u", "http://h.example", "--all", "--workers", "0"]);
        assert_eq!(build_config(&cli).unwrap().workers, 1);
    }
}
