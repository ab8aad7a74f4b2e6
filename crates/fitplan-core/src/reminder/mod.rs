//! Reminder scheduling: planning, alarm registration and reconciliation.

mod alarm;
mod definition;
mod ledger;
mod local;
mod planner;
mod registrar;
mod service;

pub use alarm::{AlarmFacility, AlarmHandle, InMemoryAlarmFacility, ScheduledAlarm};
pub use definition::{Recurrence, ReminderDefinition, ReminderId, ReminderKind, TimeOfDay};
pub use ledger::{EntryStatus, LedgerEntry, MemoryLedger, RegistrationLedger, RegistrationSet};
pub use local::LocalAlarmTable;
pub use planner::{plan, MealPolicy, Planner, PlannerPolicy, MEAL_ID_PREFIX, WATER_ID_PREFIX};
pub use registrar::{ReconcileReport, Registrar};
pub use service::{LocalReminderService, ReminderService};
