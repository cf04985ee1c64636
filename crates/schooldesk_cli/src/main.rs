//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a store (SQLite file when a path is given, memory otherwise).
//! - Seed sample data once and print the derived dashboard stats.
//!
//! Usage: `schooldesk_cli [DB_PATH] [CONFIG_JSON]`
//! Set `SCHOOLDESK_LOG_DIR` (absolute) to enable file logging.

use schooldesk_core::collections::ALL;
use schooldesk_core::sample::seed_defaults;
use schooldesk_core::stats::default_entries;
use schooldesk_core::{
    core_version, default_log_level, init_logging, StatsAggregator, Store, StoreConfig,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("schooldesk_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    if let Ok(log_dir) = std::env::var("SCHOOLDESK_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let mut args = std::env::args().skip(1);
    let db_path = args.next();
    let config = match args.next() {
        Some(path) => StoreConfig::load(&path).map_err(|err| err.to_string())?,
        None => StoreConfig::default(),
    };

    let store = match db_path.as_deref() {
        Some(path) => Store::open(path, config).map_err(|err| err.to_string())?,
        None => Store::in_memory(config),
    };

    println!("schooldesk_core version={}", core_version());
    log::info!(
        "event=cli_start module=cli status=ok persistent={}",
        db_path.is_some()
    );

    let today = store.clock().today();
    let outcomes = seed_defaults(&store, today).map_err(|err| err.to_string())?;
    for (name, outcome) in outcomes {
        println!("seed collection={name} outcome={outcome:?}");
    }
    for name in ALL {
        let snapshot = store.get_all(name).map_err(|err| err.to_string())?;
        println!(
            "collection={name} records={} version={}",
            snapshot.len(),
            snapshot.version()
        );
    }

    let aggregator =
        StatsAggregator::with_entries(&store, default_entries(), None).map_err(|err| err.to_string())?;
    let stats = aggregator.stats();
    println!("stats as_of={}", stats.as_of.format("%Y-%m-%d"));
    for (name, value) in &stats.values {
        println!("stat {name}={value}");
    }
    aggregator.stop();

    for notification in store.notifications().notifications() {
        println!(
            "notification level={} title={} message={}",
            notification.level.as_str(),
            notification.title,
            notification.message
        );
    }
    Ok(())
}
