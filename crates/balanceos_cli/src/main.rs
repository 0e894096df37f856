//! Developer CLI for the BalanceOS core.
//!
//! # Responsibility
//! - Verify `balanceos_core` linkage without the Flutter/FFI runtime.
//! - Inspect a local database: daily summary, period analytics, blocker
//!   status and CSV export.

use balanceos_core::db::{open_db, open_db_in_memory};
use balanceos_core::{
    init_logging_from_config, AnalyticsService, BlockerService, CoreConfig, ExportService, Period,
    Repositories,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "balanceos", version, about = "BalanceOS core probe")]
struct Cli {
    /// SQLite file; in-memory when omitted.
    #[arg(long, global = true, env = "BALANCEOS_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print ping and core version.
    Ping,
    /// Daily analytics as JSON.
    Summary {
        /// `YYYY-MM-DD`; defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Period analytics (`today|month|all`) as JSON.
    Period {
        #[arg(default_value = "month")]
        period: String,
    },
    /// Blocking status right now.
    Blocker,
    /// Write the four CSV files into `out_dir`.
    Export {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    if let Command::Ping = cli.command {
        println!("balanceos_core ping={}", balanceos_core::ping());
        println!("balanceos_core version={}", balanceos_core::core_version());
        return Ok(());
    }

    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config).map_err(|err| err.to_string())?;
    if let Command::Config = cli.command {
        println!("{config:#?}");
        return Ok(());
    }

    let conn = match database_path(cli.db.as_deref(), &config) {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;
    let repos = Repositories::sqlite(&conn).map_err(|err| err.to_string())?;
    let now = Local::now().naive_local();
    let today = now.date();

    match cli.command {
        Command::Ping | Command::Config => Ok(()),
        Command::Summary { date } => {
            let daily = AnalyticsService::new(&repos)
                .daily(date.unwrap_or(today))
                .map_err(|err| err.to_string())?;
            print_json(serde_json::to_value(daily))
        }
        Command::Period { period } => {
            let period =
                Period::parse(&period).ok_or_else(|| format!("unknown period `{period}`"))?;
            let report = AnalyticsService::new(&repos)
                .period(period, today)
                .map_err(|err| err.to_string())?;
            print_json(serde_json::to_value(report))
        }
        Command::Blocker => {
            let status = BlockerService::new(&repos)
                .status(now)
                .map_err(|err| err.to_string())?;
            print_json(serde_json::to_value(status))
        }
        Command::Export {
            start,
            end,
            out_dir,
        } => {
            let bundle = ExportService::new(&repos)
                .export(start, end, today)
                .map_err(|err| err.to_string())?;
            fs::create_dir_all(&out_dir).map_err(|err| err.to_string())?;
            let suffix = format!("{}_{}", bundle.start_date, bundle.end_date);
            for (name, csv) in [
                ("nutrition", &bundle.nutrition_csv),
                ("vitals", &bundle.vitals_csv),
                ("sport", &bundle.sport_csv),
                ("finance", &bundle.finance_csv),
            ] {
                let path = out_dir.join(format!("balanceos_{name}_{suffix}.csv"));
                fs::write(&path, csv).map_err(|err| format!("{}: {err}", path.display()))?;
                println!("wrote {}", path.display());
            }
            print_json(serde_json::to_value(bundle.counts))
        }
    }
}

/// `--db` wins over the configured path.
fn database_path<'a>(flag: Option<&'a Path>, config: &'a CoreConfig) -> Option<&'a Path> {
    flag.or(config.db_path.as_deref())
}

fn print_json(value: serde_json::Result<Value>) -> Result<(), String> {
    let value = value.map_err(|err| err.to_string())?;
    let text = serde_json::to_string_pretty(&value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}
