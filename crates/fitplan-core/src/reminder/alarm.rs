//! Boundary to the host alarm service.
//!
//! The host fires registered alarms on its own; this crate only registers
//! and cancels them. Contract assumed of every implementation:
//! - registering an id that is already registered replaces it
//! - cancelling an unknown id succeeds
//! - registrations survive process death but not a device reboot

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::definition::ReminderId;
use crate::error::AlarmError;

/// Receipt for a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmHandle {
    pub id: ReminderId,
    pub fire_at: NaiveDateTime,
}

/// An alarm as held by a facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAlarm {
    pub id: ReminderId,
    /// Local wall-clock time of the first firing.
    pub fire_at: NaiveDateTime,
    pub interval_secs: i64,
    pub payload: String,
}

pub trait AlarmFacility: Send + Sync {
    /// Register (or replace) the alarm for `id`.
    fn register(
        &self,
        id: &ReminderId,
        fire_at: NaiveDateTime,
        interval: Duration,
        payload: &str,
    ) -> Result<AlarmHandle, AlarmError>;

    /// Cancel the alarm for `id`. Unknown ids are not an error.
    fn cancel(&self, id: &ReminderId) -> Result<(), AlarmError>;

    /// Whether the facility currently holds an alarm for `id`.
    fn is_registered(&self, id: &ReminderId) -> Result<bool, AlarmError>;
}

impl<T: AlarmFacility + ?Sized> AlarmFacility for Arc<T> {
    fn register(
        &self,
        id: &ReminderId,
        fire_at: NaiveDateTime,
        interval: Duration,
        payload: &str,
    ) -> Result<AlarmHandle, AlarmError> {
        (**self).register(id, fire_at, interval, payload)
    }

    fn cancel(&self, id: &ReminderId) -> Result<(), AlarmError> {
        (**self).cancel(id)
    }

    fn is_registered(&self, id: &ReminderId) -> Result<bool, AlarmError> {
        (**self).is_registered(id)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    alarms: BTreeMap<ReminderId, ScheduledAlarm>,
    failing: HashSet<ReminderId>,
    failing_cancels: HashSet<ReminderId>,
    register_calls: usize,
    cancel_calls: usize,
}

/// In-process alarm facility with call counters and failure injection.
#[derive(Debug, Default)]
pub struct InMemoryAlarmFacility {
    state: Mutex<FakeState>,
}

impl InMemoryAlarmFacility {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every registration of `id` fail until cleared.
    pub fn fail_registration_for(&self, id: impl Into<ReminderId>) {
        self.state().failing.insert(id.into());
    }

    pub fn fail_cancellation_for(&self, id: impl Into<ReminderId>) {
        self.state().failing_cancels.insert(id.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.failing_cancels.clear();
    }

    /// Drop every alarm, as a device reboot does. Counters are kept.
    pub fn simulate_reboot(&self) {
        self.state().alarms.clear();
    }

    pub fn reset_counters(&self) {
        let mut state = self.state();
        state.register_calls = 0;
        state.cancel_calls = 0;
    }

    pub fn register_calls(&self) -> usize {
        self.state().register_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.state().cancel_calls
    }

    pub fn registered_ids(&self) -> Vec<ReminderId> {
        self.state().alarms.keys().cloned().collect()
    }

    pub fn alarm(&self, id: &ReminderId) -> Option<ScheduledAlarm> {
        self.state().alarms.get(id).cloned()
    }
}

impl AlarmFacility for InMemoryAlarmFacility {
    fn register(
        &self,
        id: &ReminderId,
        fire_at: NaiveDateTime,
        interval: Duration,
        payload: &str,
    ) -> Result<AlarmHandle, AlarmError> {
        let mut state = self.state();
        state.register_calls += 1;
        if state.failing.contains(id) {
            return Err(AlarmError::Refused(format!("injected failure for {id}")));
        }
        state.alarms.insert(
            id.clone(),
            ScheduledAlarm {
                id: id.clone(),
                fire_at,
                interval_secs: interval.num_seconds(),
                payload: payload.to_string(),
            },
        );
        Ok(AlarmHandle {
            id: id.clone(),
            fire_at,
        })
    }

    fn cancel(&self, id: &ReminderId) -> Result<(), AlarmError> {
        let mut state = self.state();
        state.cancel_calls += 1;
        if state.failing_cancels.contains(id) {
            return Err(AlarmError::Unavailable(format!("cannot cancel '{id}'")));
        }
        state.alarms.remove(id);
        Ok(())
    }

    fn is_registered(&self, id: &ReminderId) -> Result<bool, AlarmError> {
        Ok(self.state().alarms.contains_key(id))
    }
}
