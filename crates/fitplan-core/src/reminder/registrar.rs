//! Reconciles planned reminders against the alarm facility.
//!
//! A reconciliation runs in five steps:
//! 1. load the ledger (failure aborts before any alarm call)
//! 2. write ahead: persist the old set plus every newly planned id as
//!    `Pending` (failure aborts before any alarm call)
//! 3. cancel ids that are no longer planned
//! 4. register ids that are new, pending, changed, or missing from the
//!    facility, collecting per-id failures
//! 5. persist the resulting set in one write
//!
//! Step 4 asks the facility whether each otherwise-unchanged id is still
//! held, so the same call restores everything after a reboot. Running it
//! twice with the same plan makes no alarm calls the second time.
//!
//! Reconciliations on one registrar are serialised by the ledger lock. Each
//! call takes a ticket when it is issued; a run whose ticket is older than
//! the last applied one is skipped, so plans are applied in issue order even
//! when queued runs acquire the lock out of order.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::alarm::AlarmFacility;
use super::definition::{ReminderDefinition, ReminderId};
use super::ledger::{EntryStatus, LedgerEntry, RegistrationLedger, RegistrationSet};
use crate::error::{ReconcileError, RegistrationFailure};

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Ids registered for the first time.
    pub added: Vec<ReminderId>,
    /// Ids re-registered because their time, recurrence or payload changed.
    pub rescheduled: Vec<ReminderId>,
    /// Ids re-registered because the facility no longer held them.
    pub restored: Vec<ReminderId>,
    /// Ids already registered as planned; no call made.
    pub unchanged: Vec<ReminderId>,
    /// Ids cancelled because they are no longer planned.
    pub cancelled: Vec<ReminderId>,
    /// Stale ids whose cancellation failed; retried next run.
    pub uncancelled: Vec<ReminderId>,
    /// Registrations the facility refused.
    pub failed: Vec<RegistrationFailure>,
    /// A newer plan was already applied; nothing was done.
    pub superseded: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.uncancelled.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&ReminderId> {
        self.failed.iter().map(|f| &f.id).collect()
    }

    /// Number of register calls made, successful or not.
    pub fn registration_attempts(&self) -> usize {
        self.added.len() + self.rescheduled.len() + self.restored.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        if self.superseded {
            return "superseded by a newer plan".to_string();
        }
        let mut line = format!(
            "{} added, {} rescheduled, {} restored, {} unchanged, {} cancelled",
            self.added.len(),
            self.rescheduled.len(),
            self.restored.len(),
            self.unchanged.len(),
            self.cancelled.len()
        );
        if !self.failed.is_empty() {
            line.push_str(&format!(", {} failed", self.failed.len()));
        }
        if !self.uncancelled.is_empty() {
            line.push_str(&format!(", {} not cancelled", self.uncancelled.len()));
        }
        line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Reschedule,
    Restore,
    Keep,
}

pub struct Registrar<F, L> {
    facility: F,
    ledger: Mutex<L>,
    clock: Clock,
    issued: AtomicU64,
    /// Ticket of the last applied plan. Only touched with `ledger` held.
    applied: AtomicU64,
}

impl<F: AlarmFacility, L: RegistrationLedger> Registrar<F, L> {
    pub fn new(facility: F, ledger: L) -> Self {
        Self {
            facility,
            ledger: Mutex::new(ledger),
            clock: Box::new(|| Local::now().naive_local()),
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    /// Replace the wall clock used to compute first fire times.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Current contents of the ledger. Waits for any running reconciliation.
    pub fn registrations(&self) -> Result<RegistrationSet, ReconcileError> {
        let ledger = self.ledger.lock().map_err(|_| ReconcileError::Poisoned)?;
        ledger.load().map_err(ReconcileError::Aborted)
    }

    /// Bring the facility in line with `planned`.
    ///
    /// Blocks while another reconciliation on this registrar is running.
    pub fn reconcile(
        &self,
        planned: &[ReminderDefinition],
    ) -> Result<ReconcileReport, ReconcileError> {
        let ticket = self.next_ticket();
        self.reconcile_ticketed(planned, ticket)
    }

    fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reconcile_ticketed(
        &self,
        planned: &[ReminderDefinition],
        ticket: u64,
    ) -> Result<ReconcileReport, ReconcileError> {
        let ledger = self.ledger.lock().map_err(|_| ReconcileError::Poisoned)?;
        if ticket < self.applied.load(Ordering::SeqCst) {
            tracing::debug!(ticket, "skipping reconciliation, a newer plan was applied");
            return Ok(ReconcileReport {
                superseded: true,
                ..ReconcileReport::default()
            });
        }
        let previous = ledger.load().map_err(ReconcileError::Aborted)?;
        let planned = dedupe(planned);
        let planned_ids: BTreeSet<&ReminderId> = planned.iter().map(|&d| &d.id).collect();

        let mut intent = previous.clone();
        for def in &planned {
            intent
                .entry(def.id.clone())
                .or_insert_with(|| LedgerEntry::from_definition(def, EntryStatus::Pending));
        }
        if intent != previous {
            ledger.replace_all(&intent).map_err(ReconcileError::Aborted)?;
        }

        let mut report = ReconcileReport::default();
        let mut next = RegistrationSet::new();

        for (id, entry) in previous.iter().filter(|(id, _)| !planned_ids.contains(id)) {
            match self.facility.cancel(id) {
                Ok(()) => {
                    tracing::debug!(%id, "cancelled stale reminder");
                    report.cancelled.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(%id, "failed to cancel stale reminder: {e}");
                    let mut kept = entry.clone();
                    kept.status = EntryStatus::Pending;
                    next.insert(id.clone(), kept);
                    report.uncancelled.push(id.clone());
                }
            }
        }

        let now = (self.clock)();
        for &def in &planned {
            let id = &def.id;
            let previous_entry = previous.get(id);
            let action = match previous_entry {
                None => Action::Add,
                Some(entry) if entry.status == EntryStatus::Pending => Action::Add,
                Some(entry) if entry.differs_from(def) => Action::Reschedule,
                Some(entry) if entry.status == EntryStatus::Lost => Action::Restore,
                Some(_) => match self.facility.is_registered(id) {
                    Ok(true) => Action::Keep,
                    Ok(false) => Action::Restore,
                    Err(e) => {
                        tracing::warn!(%id, "could not query alarm, re-registering: {e}");
                        Action::Restore
                    }
                },
            };

            if action == Action::Keep {
                if let Some(entry) = previous_entry {
                    next.insert(id.clone(), entry.clone());
                }
                report.unchanged.push(id.clone());
                continue;
            }

            let fire_at = def.next_fire_after(now);
            match self
                .facility
                .register(id, fire_at, def.recurrence.interval(), &def.payload)
            {
                Ok(_) => {
                    tracing::debug!(%id, ?action, %fire_at, "registered reminder");
                    next.insert(
                        id.clone(),
                        LedgerEntry::from_definition(def, EntryStatus::Registered),
                    );
                    match action {
                        Action::Add => report.added.push(id.clone()),
                        Action::Reschedule => report.rescheduled.push(id.clone()),
                        Action::Restore | Action::Keep => report.restored.push(id.clone()),
                    }
                }
                Err(error) => {
                    tracing::warn!(%id, ?action, "registration failed: {error}");
                    // A failed reschedule leaves the old alarm in place; keep
                    // its record so the next run sees the difference again.
                    // A failed restore is marked lost and retried as a restore.
                    let kept = match (action, previous_entry) {
                        (Action::Reschedule, Some(old)) => old.clone(),
                        (Action::Restore, _) => {
                            LedgerEntry::from_definition(def, EntryStatus::Lost)
                        }
                        _ => LedgerEntry::from_definition(def, EntryStatus::Pending),
                    };
                    next.insert(id.clone(), kept);
                    report.failed.push(RegistrationFailure {
                        id: id.clone(),
                        error,
                    });
                }
            }
        }

        self.applied.store(ticket, Ordering::SeqCst);
        ledger.replace_all(&next).map_err(ReconcileError::Persist)?;

        if report.is_clean() {
            tracing::info!("reminders reconciled: {}", report.summary());
        } else {
            tracing::warn!("reminders reconciled with failures: {}", report.summary());
        }
        Ok(report)
    }
}

impl<F, L> Registrar<F, L>
where
    F: AlarmFacility + 'static,
    L: RegistrationLedger + 'static,
{
    /// Run [`reconcile`](Self::reconcile) on tokio's blocking pool.
    ///
    /// The run is ordered by when this is called, not by when the blocking
    /// pool gets to it: if a later call has already been applied, this one
    /// is skipped and reports `superseded`.
    ///
    /// Must be called from within a tokio runtime. The handle may be
    /// dropped; the outcome is logged either way.
    pub fn spawn_reconcile(
        self: &Arc<Self>,
        planned: Vec<ReminderDefinition>,
    ) -> JoinHandle<Result<ReconcileReport, ReconcileError>> {
        let registrar = Arc::clone(self);
        let ticket = self.next_ticket();
        tokio::task::spawn_blocking(move || {
            let result = registrar.reconcile_ticketed(&planned, ticket);
            if let Err(e) = &result {
                tracing::error!("background reconciliation failed: {e}");
            }
            result
        })
    }
}

/// Drop repeated ids, keeping the first definition.
fn dedupe(planned: &[ReminderDefinition]) -> Vec<&ReminderDefinition> {
    let mut seen = BTreeSet::new();
    let mut unique = Vec::with_capacity(planned.len());
    for def in planned {
        if seen.insert(&def.id) {
            unique.push(def);
        } else {
            tracing::warn!(id = %def.id, "duplicate reminder id in plan, ignoring");
        }
    }
    unique
}
