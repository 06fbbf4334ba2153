//! textbook-ledger-report: Read-only ledger reports
//!
//! Opens the configured store and prints one report as JSON on stdout.
//!
//! ## Usage
//! ```text
//! textbook-ledger-report pending-check
//! textbook-ledger-report not-returned [GRADE]
//! textbook-ledger-report not-issued [GRADE]
//! textbook-ledger-report summary [GRADE]
//! textbook-ledger-report damage-stats
//! textbook-ledger-report damage-summary [GRADE] [CATEGORY] [STATUS]
//! textbook-ledger-report found-stats
//! ```
//!
//! ## Configuration
//! - TEXTBOOK_LEDGER_CONFIG: Path to the config file (default: config.yaml)
//! - TEXTBOOK_LEDGER_LOG: Log filter (default: info), logs go to stderr

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use textbook_ledger::config::Config;
use textbook_ledger::model::{DamageCategory, ReviewStatus};
use textbook_ledger::utils::bootstrap::init_tracing;
use textbook_ledger::Ledger;

const USAGE: &str = "usage: textbook-ledger-report \
<pending-check|not-returned|not-issued|summary|damage-stats|damage-summary|found-stats> \
[GRADE] [CATEGORY] [STATUS]";

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    // An empty or "-" argument leaves that filter unset.
    let mut optional = move || args.next().filter(|a| !a.is_empty() && a != "-");
    let grade = optional();

    let config = Config::load(None)?;
    info!(storage = %config.storage.storage_type, command = %command, "Running report");
    let (ledger, _worker) = Ledger::from_config(&config).await?;

    match command.as_str() {
        "pending-check" => print_json(&ledger.pending_check(Utc::now()).await?)?,
        "not-returned" => print_json(&ledger.not_returned(grade.as_deref()).await?)?,
        "not-issued" => print_json(&ledger.not_issued(grade.as_deref()).await?)?,
        "summary" => print_json(&ledger.issue_summary(grade.as_deref()).await?)?,
        "damage-stats" => print_json(&ledger.damage_statistics().await?)?,
        "damage-summary" => {
            let category = optional().map(|c| c.parse::<DamageCategory>()).transpose()?;
            let status = optional().map(|s| s.parse::<ReviewStatus>()).transpose()?;
            print_json(
                &ledger
                    .damage_summary(grade.as_deref(), category, status)
                    .await?,
            )?
        }
        "found-stats" => print_json(&ledger.found_statistics().await?)?,
        other => {
            eprintln!("unknown report {:?}\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
