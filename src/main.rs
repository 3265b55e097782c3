// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! ClawTrap: low-interaction shell honeypot.
//!
//! This is the main entry point. It handles CLI argument parsing, logging
//! setup, and starts the async runtime for the listener:
//!
//! - **transport**: accepts TCP connections and runs the login exchange
//! - **shell**: emulates a shell against a synthetic filesystem
//! - **transcript**: appends one JSONL record per finished session
//! - **behavior**: labels each session from its command sequence
//! - **core**: app state, listener loop, per-session driver, alerts
//!
//! The architecture is a channel pipeline:
//! Session tasks → raw_tx → orchestrator → tracing log

mod behavior;
mod config;
mod core;
mod shell;
mod transcript;
mod transport;
mod vfs;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::behavior::BehaviorClassifier;
use crate::config::Config;
use crate::core::app_state::AppState;
use crate::core::orchestrator::run_honeypot;

const DEFAULT_CONFIG_PATH: &str = "/etc/clawtrap/config.toml";

fn print_help() {
    eprintln!(r#"ClawTrap: low-interaction shell honeypot

USAGE:
    clawtrap [COMMAND] [OPTIONS]

COMMANDS:
    run [CONFIG]                   Start the honeypot listener (default)
    classify [LOG] [--config P]    Label every session recorded in a transcript log
    write-config PATH              Write the built-in default config to PATH
    help                           Show this help message
    version                        Show version info

EXAMPLES:
    clawtrap                                   Listen with /etc/clawtrap/config.toml
    clawtrap run ./clawtrap.toml               Listen with a local config
    clawtrap classify /var/log/clawtrap/sessions.jsonl
    clawtrap write-config ./clawtrap.toml      Start a config from the defaults

CONFIG:
    Default config path: {}
    Missing config file: built-in defaults are used
    Log filter:          RUST_LOG overrides general.log_level
"#, DEFAULT_CONFIG_PATH);
}

fn print_version() {
    eprintln!("ClawTrap v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Low-interaction shell honeypot");
}

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|pos| args.get(pos + 1))
        .map(|s| s.as_str())
}

/// First argument that is neither a flag nor a flag's value.
fn positional<'a>(args: &'a [String], flags_with_values: &[&str]) -> Option<&'a str> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if flags_with_values.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg.as_str());
        }
    }
    None
}

fn run_classify(rest_args: &[String]) -> Result<()> {
    let config_path = PathBuf::from(flag_value(rest_args, "--config").unwrap_or(DEFAULT_CONFIG_PATH));
    let config = Config::load_or_default(&config_path)?;
    init_logging(&config.general.log_level);

    let log_path = positional(rest_args, &["--config"])
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.general.log_file));

    let classifier = BehaviorClassifier::from_config(&config.behavior);
    let records = transcript::read_records(&log_path)?;
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

    for record in &records {
        let label = classifier.classify(&record.commands);
        *counts.entry(label.as_str()).or_default() += 1;
        let started = chrono::DateTime::from_timestamp(record.timestamp as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| record.timestamp.to_string());
        println!("{}  {:<15}  {:<12}  {:>3} cmds  {}",
            started, record.source_ip, record.username, record.commands.len(), label);
    }

    eprintln!("\n{} sessions in {}", records.len(), log_path.display());
    for (label, count) in &counts {
        eprintln!("  {:<26} {}", label, count);
    }
    Ok(())
}

fn run_write_config(rest_args: &[String]) -> Result<()> {
    let Some(path) = positional(rest_args, &[]) else {
        anyhow::bail!("write-config needs a destination path");
    };
    let path = Path::new(path);
    if path.exists() {
        anyhow::bail!("{} already exists, refusing to overwrite", path.display());
    }
    Config::default().save(path)?;
    eprintln!("Default config written to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let subcommand = args.get(1).map(|s| s.as_str()).unwrap_or("run");
    let rest_args: Vec<String> = args.iter().skip(2).cloned().collect();

    match subcommand {
        "help" | "--help" | "-h" => {
            print_help();
            return Ok(());
        }
        "version" | "--version" | "-V" => {
            print_version();
            return Ok(());
        }
        "classify" => return run_classify(&rest_args),
        "write-config" => return run_write_config(&rest_args),
        _ => {
            // Fall through to listener startup
        }
    }

    // ── Listener startup ────────────────────────────────────────────────────
    // Called as `clawtrap run [config]` or `clawtrap /path/to/config.toml`
    let run_args: &[String] = if subcommand == "run" { &rest_args } else { &args[1..] };
    let config_path = positional(run_args, &[])
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = Config::load_or_default(&config_path)?;
    init_logging(&config.general.log_level);
    eprintln!("Config loaded from {}", config_path.display());

    let (state, alert_rx) = AppState::build(config, config_path);
    run_honeypot(state, alert_rx).await
}
