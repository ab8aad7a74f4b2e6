pub mod config;
pub mod reminders;
pub mod settings;

use fitplan_core::{Config, LocalReminderService, ReconcileReport};

/// Exit code when some reminders could not be registered.
pub const EXIT_PARTIAL: i32 = 2;

pub type CommandResult = Result<i32, Box<dyn std::error::Error>>;

pub fn open_service() -> Result<LocalReminderService, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    Ok(LocalReminderService::open(&config)?)
}

/// Print a reconciliation outcome and map it to an exit code.
pub fn print_report(report: &ReconcileReport, json: bool) -> CommandResult {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.summary());
        for failure in &report.failed {
            println!("  failed: {} ({})", failure.id, failure.error);
        }
        for id in &report.uncancelled {
            println!("  not cancelled: {id}");
        }
    }
    Ok(if report.is_clean() { 0 } else { EXIT_PARTIAL })
}
