//! Settings-save and boot entry points.
//!
//! Both paths end in the same call: load goals, plan, reconcile.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use super::alarm::AlarmFacility;
use super::definition::ReminderDefinition;
use super::ledger::RegistrationLedger;
use super::local::LocalAlarmTable;
use super::planner::Planner;
use super::registrar::{ReconcileReport, Registrar};
use crate::error::{CoreError, ReconcileError};
use crate::settings::{GoalsDraft, SettingsBackend, SettingsStore};
use crate::storage::{Config, Database};

pub struct ReminderService<B, F, L> {
    store: SettingsStore<B>,
    planner: Planner,
    registrar: Arc<Registrar<F, L>>,
    /// Held from a settings write until its reconciliation is issued.
    saving: Mutex<()>,
}

/// Service wired to the on-disk database and local alarm table.
pub type LocalReminderService = ReminderService<Database, LocalAlarmTable, Database>;

impl LocalReminderService {
    /// Open the default database and build a service from `config`.
    pub fn open(config: &Config) -> Result<Self, CoreError> {
        Self::open_at(&Database::default_path()?, config)
    }

    /// Open a service over the database at `path`.
    ///
    /// Settings, ledger and alarm table each get their own connection.
    pub fn open_at(path: &Path, config: &Config) -> Result<Self, CoreError> {
        let store = SettingsStore::new(Database::open_at(path)?);
        let alarms = LocalAlarmTable::new(Database::open_at(path)?);
        let ledger = Database::open_at(path)?;
        Ok(Self::new(
            store,
            Planner::new(config.reminder_policy()),
            Arc::new(Registrar::new(alarms, ledger)),
        ))
    }
}

impl<B, F, L> ReminderService<B, F, L>
where
    B: SettingsBackend,
    F: AlarmFacility,
    L: RegistrationLedger,
{
    pub fn new(store: SettingsStore<B>, planner: Planner, registrar: Arc<Registrar<F, L>>) -> Self {
        Self {
            store,
            planner,
            registrar,
            saving: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SettingsStore<B> {
        &self.store
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn registrar(&self) -> &Arc<Registrar<F, L>> {
        &self.registrar
    }

    /// A draft seeded with the persisted goals.
    pub fn draft(&self) -> GoalsDraft {
        GoalsDraft::new(self.store.load_goals())
    }

    /// Reminders for the persisted goals.
    pub fn planned(&self) -> Vec<ReminderDefinition> {
        self.planner.plan(&self.store.load_goals())
    }

    /// Persist all three goals from `draft`, then plan and reconcile.
    ///
    /// A failed write returns before anything is planned.
    pub fn commit(&self, draft: &GoalsDraft) -> Result<ReconcileReport, CoreError> {
        let _saving = self.lock_saving();
        let stored = self.store.save_goals(&draft.goals())?;
        tracing::info!(
            protein = stored.protein_target_grams,
            water = stored.water_target_ml,
            portion = stored.portion_percent,
            "goals saved"
        );
        Ok(self.registrar.reconcile(&self.planner.plan(&stored))?)
    }

    fn lock_saving(&self) -> MutexGuard<'_, ()> {
        self.saving
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Plan from persisted goals and reconcile.
    pub fn resync(&self) -> Result<ReconcileReport, ReconcileError> {
        self.registrar.reconcile(&self.planned())
    }

    /// Boot path. Alarms do not survive a reboot; this re-establishes them.
    pub fn on_boot(&self) -> Result<ReconcileReport, ReconcileError> {
        tracing::info!("boot signal received, re-establishing reminders");
        self.resync()
    }
}

impl<B, F, L> ReminderService<B, F, L>
where
    B: SettingsBackend,
    F: AlarmFacility + 'static,
    L: RegistrationLedger + 'static,
{
    /// Persist the draft now and reconcile on the blocking pool.
    ///
    /// Returns once the goals are written; the caller need not await the
    /// handle. Background commits take effect in call order: a run that
    /// reaches the registrar after a later one has been applied does nothing.
    /// Must be called from within a tokio runtime.
    pub fn commit_in_background(
        &self,
        draft: &GoalsDraft,
    ) -> Result<JoinHandle<Result<ReconcileReport, ReconcileError>>, CoreError> {
        let _saving = self.lock_saving();
        let stored = self.store.save_goals(&draft.goals())?;
        Ok(self.registrar.spawn_reconcile(self.planner.plan(&stored)))
    }
}
