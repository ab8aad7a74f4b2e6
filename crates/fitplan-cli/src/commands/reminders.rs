use clap::Subcommand;
use fitplan_core::storage::Database;
use fitplan_core::LocalAlarmTable;

use super::{open_service, print_report, CommandResult};

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Show the reminders planned for the current goals
    Plan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile registered alarms with the plan
    Sync {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Boot path: re-establish alarms after a restart
    Boot {
        /// Wipe the alarm table first, as a device reboot would
        #[arg(long)]
        simulate_reboot: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List alarms currently held by the local alarm table
    Alarms {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: RemindersAction) -> CommandResult {
    match action {
        RemindersAction::Plan { json } => {
            let planned = open_service()?.planned();
            if json {
                println!("{}", serde_json::to_string_pretty(&planned)?);
            } else {
                for reminder in &planned {
                    println!(
                        "{}  {:<20} {}",
                        reminder.time_of_day, reminder.id, reminder.payload
                    );
                }
            }
        }
        RemindersAction::Sync { json } => {
            let report = open_service()?.resync()?;
            return print_report(&report, json);
        }
        RemindersAction::Boot {
            simulate_reboot,
            json,
        } => {
            if simulate_reboot {
                let cleared = LocalAlarmTable::new(Database::open()?).clear()?;
                tracing::info!(cleared, "alarm table wiped");
            }
            let report = open_service()?.on_boot()?;
            return print_report(&report, json);
        }
        RemindersAction::Alarms { json } => {
            let alarms = LocalAlarmTable::new(Database::open()?).list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&alarms)?);
            } else if alarms.is_empty() {
                println!("no alarms registered");
            } else {
                for alarm in &alarms {
                    println!(
                        "{}  every {}h  {:<20} {}",
                        alarm.fire_at.format("%Y-%m-%d %H:%M"),
                        alarm.interval_secs / 3600,
                        alarm.id,
                        alarm.payload
                    );
                }
            }
        }
    }
    Ok(0)
}
