//! iosapplist - lists installed iOS App Store apps.
//!
//! Main entry point for the command-line tool.
//!
//! # Execution Flow
//!
//! 1. Parse arguments
//! 2. Load settings (`iosapplist.yaml`, `IOSAPPLIST_*` environment), then
//!    apply command-line overrides
//! 3. Initialize logging (stderr, plus a daily log file if `log_dir` is set)
//! 4. Run the requested command (`list` resolves the container root first)

use anyhow::{Context, Result};
use clap::Parser;
use iosapplist::cli::{self, Cli, Command};
use iosapplist::services::AppList;
use iosapplist::{APP_NAME, ConfigManager, VERSION};
use std::io;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let manager = ConfigManager::new(&cli.config_dir);
    let mut settings = manager.load_settings()?;
    cli.apply_to(&mut settings);

    let _log_guard =
        iosapplist::logging::setup_logging(settings.log_dir.as_deref(), settings.debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let stdout = io::stdout();
    let status = match &cli.command {
        Command::List(args) => {
            let list = AppList::new(&settings.root)
                .with_context(|| format!("Could not find apps under {}", settings.root))?;
            let stderr = io::stderr();
            cli::run_list(
                &list,
                args,
                settings.json,
                &mut stdout.lock(),
                &mut stderr.lock(),
            )?
        }
        Command::Config(args) => cli::run_config(&manager, &settings, args, &mut stdout.lock())?,
    };

    Ok(ExitCode::from(status))
}
