use clap::Subcommand;
use fitplan_core::Setting;

use super::{open_service, print_report, CommandResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Get a goal value
    Get {
        /// Setting key ("protein", "su", "porsiyon")
        key: String,
    },
    /// Set a single goal value (clamped to its range) without rescheduling
    Set {
        /// Setting key
        key: String,
        /// New value
        value: i64,
    },
    /// List all goal values
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save goals and reschedule reminders
    Save {
        /// Daily protein target in grams
        #[arg(long)]
        protein: Option<i64>,
        /// Daily water target in ml
        #[arg(long)]
        water: Option<i64>,
        /// Portion size percentage
        #[arg(long)]
        portion: Option<i64>,
        /// Output the reconciliation report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SettingsAction) -> CommandResult {
    let service = open_service()?;
    let store = service.store();

    match action {
        SettingsAction::Get { key } => {
            let setting =
                Setting::from_key(&key).ok_or_else(|| format!("unknown setting: {key}"))?;
            println!("{}", store.get(setting));
        }
        SettingsAction::Set { key, value } => {
            let stored = store.put_int(&key, value)?;
            if stored != value {
                println!("{stored} (clamped)");
            } else {
                println!("{stored}");
            }
        }
        SettingsAction::List { json } => {
            let goals = store.load_goals();
            if json {
                println!("{}", serde_json::to_string_pretty(&goals)?);
            } else {
                for setting in Setting::ALL {
                    let range = setting.range();
                    println!(
                        "{:<9} {:>5} {:<2}  ({}..={})",
                        setting.key(),
                        goals.get(setting),
                        setting.unit(),
                        range.start(),
                        range.end()
                    );
                }
            }
        }
        SettingsAction::Save {
            protein,
            water,
            portion,
            json,
        } => {
            let mut draft = service.draft();
            for (setting, value) in [
                (Setting::Protein, protein),
                (Setting::Water, water),
                (Setting::Portion, portion),
            ] {
                if let Some(value) = value {
                    draft.set(setting, value);
                }
            }
            let report = service.commit(&draft)?;
            return print_report(&report, json);
        }
    }
    Ok(0)
}
