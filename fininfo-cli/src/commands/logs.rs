//! Logs command - inspect request logs

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_fininfo_dir;
use crate::output;
use fininfo_core::{EntryPoint, LogEntry, LoggingService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries grouped by request
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only failures
        #[arg(long)]
        errors: bool,
        /// Show every entry of one request
        #[arg(long)]
        request_id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old log entries
    Clear {
        /// Delete entries older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Show failure counts per error kind
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: LogsCommands) -> Result<()> {
    let data_dir = get_fininfo_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    let service = LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            request_id,
            json,
        } => {
            let entries = match (&request_id, errors) {
                (Some(id), _) => service.get_by_request(id)?,
                (None, true) => service.get_errors(limit)?,
                (None, false) => service.get_recent(limit)?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_entries(&entries);
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
        } => {
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Delete log entries older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }

            let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
            let deleted = service.delete_before(cutoff.timestamp_millis())?;
            output::success(&format!("Deleted {} log entries", deleted));
        }
        LogsCommands::Stats { json } => {
            let total = service.count()?;
            let failures = failures_by_kind(&service.get_errors(1000)?);
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "totalEntries": total,
                        "failuresByKind": failures,
                        "databasePath": db_path.to_string_lossy(),
                        "databaseSizeBytes": size_bytes,
                    }))?
                );
                return Ok(());
            }

            println!("{} {}", "Entries:".bold(), total);
            if failures.is_empty() {
                output::info("No failures recorded.");
            } else {
                let mut table = output::create_table();
                table.set_header(vec!["Error kind", "Failures"]);
                for (kind, count) in &failures {
                    table.add_row(vec![kind.clone(), count.to_string()]);
                }
                println!("{}", table);
            }
            println!(
                "{} {} ({})",
                "Database:".bold(),
                db_path.display(),
                output::format_size(size_bytes)
            );
        }
    }

    Ok(())
}

fn print_entries(entries: &[LogEntry]) {
    if entries.is_empty() {
        output::info("No log entries found.");
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Request", "Provider", "Event", "Failure"]);

    for entry in entries {
        let failure = match (&entry.error_kind, &entry.error_message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message).red().to_string(),
            (Some(kind), None) => kind.red().to_string(),
            (None, Some(message)) => message.red().to_string(),
            (None, None) => String::new(),
        };

        table.add_row(vec![
            format_timestamp(entry.timestamp),
            short_request_id(entry.request_id.as_deref()),
            entry.provider.clone().unwrap_or_else(|| "-".to_string()),
            entry.event.clone(),
            failure,
        ]);
    }

    println!("{}", table);
    println!(
        "{} entries across {} request(s)",
        entries.len(),
        count_requests(entries)
    );
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// First block of a uuid request id, or "-" for entries outside a request
fn short_request_id(request_id: Option<&str>) -> String {
    match request_id {
        Some(id) => id.split('-').next().unwrap_or(id).to_string(),
        None => "-".to_string(),
    }
}

fn count_requests(entries: &[LogEntry]) -> usize {
    let mut ids: Vec<&str> = entries.iter().filter_map(|e| e.request_id.as_deref()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

fn failures_by_kind(errors: &[LogEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in errors {
        let kind = entry.error_kind.clone().unwrap_or_else(|| "unknown".to_string());
        *counts.entry(kind).or_insert(0) += 1;
    }
    counts
}
