//! Command-line interface: argument definitions and the `list` command.

use crate::config::ConfigManager;
use crate::models::{App, Settings};
use crate::services::AppList;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::io::Write;

/// Exit status when every query matched (or all apps were listed).
pub const EXIT_OK: u8 = 0;

/// Exit status when none of the queries matched an app.
pub const EXIT_NOT_FOUND: u8 = 1;

/// Exit status for an unknown information key.
pub const EXIT_INVALID_KEY: u8 = 2;

/// Lists installed iOS App Store apps.
#[derive(Parser, Debug)]
#[command(name = "iosapplist", version, about)]
pub struct Cli {
    /// Mobile home, Containers, Applications, or simulator data directory
    #[arg(short, long, global = true)]
    pub root: Option<Utf8PathBuf>,

    /// Directory containing iosapplist.yaml
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: Utf8PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Shows information about one or more App Store apps (all apps by default)
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Shows the effective settings
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Write the effective settings to iosapplist.yaml
    #[arg(long)]
    pub save: bool,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// List more information about each app
    #[arg(short, long)]
    pub long: bool,

    /// Show a list of valid information keys
    #[arg(long = "list-keys", visible_alias = "keys")]
    pub list_keys: bool,

    /// Show only this information key for each app
    #[arg(short, long)]
    pub key: Option<String>,

    /// Bundle IDs or container UUIDs to show
    pub queries: Vec<String>,
}

impl Cli {
    /// Apply command-line flags on top of loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(root) = &self.root {
            settings.root = root.clone();
        }
        settings.json |= self.json;
        settings.debug |= self.debug;
    }
}

/// Runs the `config` command: prints the effective settings as YAML and
/// optionally saves them to the configuration directory.
pub fn run_config<W: Write>(
    manager: &ConfigManager,
    settings: &Settings,
    args: &ConfigArgs,
    out: &mut W,
) -> Result<u8> {
    write!(out, "{}", serde_yaml_ng::to_string(settings)?)?;
    if args.save {
        manager.save_settings(settings)?;
        writeln!(out, "# saved to {}", manager.settings_path())?;
    }
    Ok(EXIT_OK)
}

/// Runs the `list` command, writing results to `out` and per-item errors to `err`.
///
/// Returns the process exit status.
pub fn run_list<W: Write, E: Write>(
    list: &AppList,
    args: &ListArgs,
    json: bool,
    out: &mut W,
    err: &mut E,
) -> Result<u8> {
    if args.list_keys {
        tracing::debug!("listing available keys");
        let mut keys: Vec<&str> = App::keys().collect();
        keys.sort_unstable();
        if json {
            writeln!(out, "{}", serde_json::to_string(&keys)?)?;
        } else {
            for key in keys {
                writeln!(out, "{}", key.replace('_', "-"))?;
            }
        }
        return Ok(EXIT_OK);
    }

    let key = match &args.key {
        Some(raw) => {
            let key = if json { raw.clone() } else { raw.replace('-', "_") };
            if App::label(&key).is_none() {
                writeln!(err, "invalid key {:?}", raw)?;
                return Ok(EXIT_INVALID_KEY);
            }
            Some(key)
        }
        None => None,
    };

    if !list.is_populated() {
        tracing::debug!("populating the app list");
        list.scan().context("Failed to scan for apps")?;
    }

    let apps = if args.queries.is_empty() {
        list.sorted()
    } else {
        let mut matches = Vec::new();
        for query in &args.queries {
            match list.get(query)? {
                Some(app) => matches.push(app),
                None => {
                    writeln!(err, "could not find an app that matches {:?}", query)?;
                }
            }
        }
        if matches.is_empty() {
            return Ok(EXIT_NOT_FOUND);
        }
        matches
    };

    match (&key, json) {
        (Some(key), true) => {
            let values: Vec<_> = apps.iter().filter_map(|app| app.get(key)).collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&values)?)?;
        }
        (Some(key), false) => {
            for app in &apps {
                if let Some(value) = app.get(key) {
                    writeln!(out, "{}", value)?;
                }
            }
        }
        (None, true) => {
            let records: Vec<&App> = apps.iter().map(|app| app.as_ref()).collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
        }
        (None, false) => {
            for app in &apps {
                let info = app.info_str(args.long);
                writeln!(out, "{}", info.trim_end())?;
            }
        }
    }

    Ok(EXIT_OK)
}
