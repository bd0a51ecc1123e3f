//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a family tree database (file path argument, or in-memory).
//! - Print the core version and stored person/relationship counts.
//! - Write rolling log files when `FAMILYTREE_LOG_DIR` names a directory.

use familytree_core::{Repository, SqliteUnitOfWork, UnitOfWork};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "FAMILYTREE_LOG_DIR";

/// Blank values disable file logging.
fn log_dir_from(value: Option<String>) -> Option<String> {
    value
        .map(|dir| dir.trim().to_string())
        .filter(|dir| !dir.is_empty())
}

fn main() -> ExitCode {
    if let Some(dir) = log_dir_from(std::env::var(LOG_DIR_ENV).ok()) {
        if let Err(err) = familytree_core::init_logging(familytree_core::default_log_level(), &dir)
        {
            eprintln!("logging disabled: {err}");
        }
    }

    let path = std::env::args().nth(1);
    let opened = match path.as_deref() {
        Some(path) => SqliteUnitOfWork::open(path),
        None => SqliteUnitOfWork::open_in_memory(),
    };
    let uow = match opened {
        Ok(uow) => uow,
        Err(err) => {
            log::error!("event=cli_open module=cli status=error error={err}");
            eprintln!("failed to open database: {err}");
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "event=cli_open module=cli status=ok session={}",
        uow.session_id()
    );

    println!("familytree_core version={}", familytree_core::core_version());
    println!("database={}", path.as_deref().unwrap_or(":memory:"));

    let counts = uow
        .persons()
        .count()
        .and_then(|persons| Ok((persons, uow.relationships().count()?)));
    match counts {
        Ok((persons, relationships)) => {
            println!("persons={persons} relationships={relationships}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("event=cli_counts module=cli status=error error={err}");
            eprintln!("failed to read counts: {err}");
            ExitCode::FAILURE
        }
    }
}
