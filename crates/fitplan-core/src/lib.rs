//! # fitplan Core Library
//!
//! Goal settings and daily reminder scheduling for the fitplan nutrition
//! planner. All operations are available through the `fitplan-cli` binary;
//! app front-ends are thin layers over the same library.
//!
//! ## Architecture
//!
//! - **Settings**: three clamped integer goals (protein, water, portion)
//!   persisted in a key-value store
//! - **Planner**: a pure function from goals to reminder definitions
//! - **Registrar**: reconciles planned reminders with the host alarm
//!   service, idempotently, on settings save and on boot
//! - **Storage**: SQLite for settings and the registration ledger, TOML for
//!   application configuration
//!
//! ## Key Components
//!
//! - [`SettingsStore`]: domain-enforcing goal persistence
//! - [`Planner`]: reminder planning policy
//! - [`Registrar`]: alarm reconciliation
//! - [`ReminderService`]: save and boot entry points
//! - [`Config`]: application configuration management

pub mod error;
pub mod reminder;
pub mod settings;
pub mod storage;

pub use error::{
    AlarmError, ConfigError, CoreError, DatabaseError, LedgerError, ReconcileError,
    RegistrationFailure, StoreError, ValidationError,
};
pub use reminder::{
    plan, AlarmFacility, InMemoryAlarmFacility, LocalAlarmTable, LocalReminderService,
    MemoryLedger, Planner, PlannerPolicy, ReconcileReport, Recurrence, Registrar,
    ReminderDefinition, ReminderId, ReminderKind, ReminderService, TimeOfDay,
};
pub use settings::{Goals, GoalsDraft, MemoryBackend, Setting, SettingsBackend, SettingsStore};
pub use storage::{Config, Database};
