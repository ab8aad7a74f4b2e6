//! Durable record of what the registrar has handed to the alarm facility.
//!
//! Only the registrar reads or writes the ledger. Every write replaces the
//! whole set in one step so a reader never sees half of a reconciliation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::definition::{Recurrence, ReminderDefinition, ReminderId, TimeOfDay};
use crate::error::{DatabaseError, LedgerError};
use crate::storage::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Written ahead of the alarm call; not known to be held by the facility.
    Pending,
    /// The facility accepted the registration.
    Registered,
    /// Was registered, but the facility no longer holds it and re-registering failed.
    Lost,
}

impl EntryStatus {
    fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Registered => "registered",
            EntryStatus::Lost => "lost",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntryStatus::Pending),
            "registered" => Some(EntryStatus::Registered),
            "lost" => Some(EntryStatus::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub time_of_day: TimeOfDay,
    pub recurrence: Recurrence,
    pub payload: String,
    pub status: EntryStatus,
}

impl LedgerEntry {
    pub fn from_definition(def: &ReminderDefinition, status: EntryStatus) -> Self {
        Self {
            time_of_day: def.time_of_day,
            recurrence: def.recurrence,
            payload: def.payload.clone(),
            status,
        }
    }

    /// Whether the facility's copy would differ from `def`.
    pub fn differs_from(&self, def: &ReminderDefinition) -> bool {
        self.time_of_day != def.time_of_day
            || self.recurrence != def.recurrence
            || self.payload != def.payload
    }
}

pub type RegistrationSet = BTreeMap<ReminderId, LedgerEntry>;

pub trait RegistrationLedger: Send {
    fn load(&self) -> Result<RegistrationSet, LedgerError>;

    /// Atomically replace the stored set with `entries`.
    fn replace_all(&self, entries: &RegistrationSet) -> Result<(), LedgerError>;
}

impl<T: RegistrationLedger + Sync + ?Sized> RegistrationLedger for Arc<T> {
    fn load(&self) -> Result<RegistrationSet, LedgerError> {
        (**self).load()
    }

    fn replace_all(&self, entries: &RegistrationSet) -> Result<(), LedgerError> {
        (**self).replace_all(entries)
    }
}

impl RegistrationLedger for Database {
    fn load(&self) -> Result<RegistrationSet, LedgerError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, hour, minute, recurrence, payload, status FROM registrations ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let corrupt = |id: &str, message: String| {
            LedgerError::Storage(DatabaseError::CorruptRow {
                table: "registrations".into(),
                message: format!("{id}: {message}"),
            })
        };

        let mut entries = RegistrationSet::new();
        for row in rows {
            let (id, hour, minute, recurrence, payload, status) = row?;
            let time_of_day = TimeOfDay::new(hour, minute).map_err(|e| corrupt(&id, e.to_string()))?;
            let recurrence = recurrence
                .parse::<Recurrence>()
                .map_err(|e| corrupt(&id, e.to_string()))?;
            let status = EntryStatus::parse(&status)
                .ok_or_else(|| corrupt(&id, format!("unknown status '{status}'")))?;
            entries.insert(
                ReminderId::new(id),
                LedgerEntry {
                    time_of_day,
                    recurrence,
                    payload,
                    status,
                },
            );
        }
        Ok(entries)
    }

    fn replace_all(&self, entries: &RegistrationSet) -> Result<(), LedgerError> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute("DELETE FROM registrations", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO registrations (id, hour, minute, recurrence, payload, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (id, entry) in entries {
                insert.execute(params![
                    id.as_str(),
                    entry.time_of_day.hour(),
                    entry.time_of_day.minute(),
                    entry.recurrence.to_string(),
                    entry.payload,
                    entry.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// In-memory ledger with failure injection.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<RegistrationSet>,
    fail_loads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current contents, bypassing failure injection.
    pub fn snapshot(&self) -> RegistrationSet {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl RegistrationLedger for MemoryLedger {
    fn load(&self) -> Result<RegistrationSet, LedgerError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("injected ledger read failure".into()).into());
        }
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .map_err(|_| LedgerError::Poisoned)
    }

    fn replace_all(&self, entries: &RegistrationSet) -> Result<(), LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("injected ledger write failure".into()).into());
        }
        let mut stored = self.entries.lock().map_err(|_| LedgerError::Poisoned)?;
        *stored = entries.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderKind;
    use chrono::Weekday;

    fn entry(hour: u32, recurrence: Recurrence, status: EntryStatus) -> LedgerEntry {
        LedgerEntry {
            time_of_day: TimeOfDay::new(hour, 15).unwrap(),
            recurrence,
            payload: format!("payload {hour}"),
            status,
        }
    }

    fn sample() -> RegistrationSet {
        let mut set = RegistrationSet::new();
        set.insert(
            "meal-1".into(),
            entry(8, Recurrence::Daily, EntryStatus::Registered),
        );
        set.insert(
            "water-checkpoint-1".into(),
            entry(
                9,
                Recurrence::Weekly {
                    weekday: Weekday::Wed,
                },
                EntryStatus::Pending,
            ),
        );
        set.insert(
            "water-checkpoint-2".into(),
            entry(12, Recurrence::Daily, EntryStatus::Lost),
        );
        set
    }

    #[test]
    fn sqlite_ledger_round_trips() {
        let db = Database::open_memory().unwrap();
        assert!(db.load().unwrap().is_empty());

        db.replace_all(&sample()).unwrap();
        assert_eq!(db.load().unwrap(), sample());
    }

    #[test]
    fn replace_all_drops_missing_ids() {
        let db = Database::open_memory().unwrap();
        db.replace_all(&sample()).unwrap();

        let mut smaller = sample();
        smaller.remove(&ReminderId::from("meal-1"));
        db.replace_all(&smaller).unwrap();

        assert_eq!(db.load().unwrap(), smaller);
    }

    #[test]
    fn corrupt_row_is_reported() {
        let db = Database::open_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO registrations (id, hour, minute, recurrence, payload, status)
                 VALUES ('meal-1', 8, 0, 'hourly', 'x', 'registered')",
                [],
            )
            .unwrap();
        assert!(matches!(
            db.load(),
            Err(LedgerError::Storage(DatabaseError::CorruptRow { .. }))
        ));
    }

    #[test]
    fn memory_ledger_failure_injection() {
        let ledger = MemoryLedger::new();
        ledger.replace_all(&sample()).unwrap();

        ledger.set_fail_loads(true);
        assert!(ledger.load().is_err());
        ledger.set_fail_writes(true);
        assert!(ledger.replace_all(&RegistrationSet::new()).is_err());

        assert_eq!(ledger.snapshot(), sample());
    }

    #[test]
    fn differs_from_checks_time_recurrence_and_payload() {
        let def = ReminderDefinition {
            id: "meal-1".into(),
            kind: ReminderKind::Meal,
            time_of_day: TimeOfDay::new(8, 15).unwrap(),
            recurrence: Recurrence::Daily,
            payload: "payload 8".into(),
        };
        let same = LedgerEntry::from_definition(&def, EntryStatus::Registered);
        assert!(!same.differs_from(&def));

        let mut moved = def.clone();
        moved.time_of_day = TimeOfDay::new(8, 45).unwrap();
        assert!(same.differs_from(&moved));

        let mut reworded = def.clone();
        reworded.payload = "other".into();
        assert!(same.differs_from(&reworded));
    }
}
