//! SQLite-backed alarm table.
//!
//! Hosts without a native alarm service (the CLI) record alarms in the
//! `alarms` table, where a notifier process can pick them up. Clearing the
//! table stands in for a reboot.

use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, OptionalExtension};

use super::alarm::{AlarmFacility, AlarmHandle, ScheduledAlarm};
use super::definition::ReminderId;
use crate::error::{AlarmError, DatabaseError};
use crate::storage::Database;

const FIRE_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct LocalAlarmTable {
    db: Mutex<Database>,
}

impl LocalAlarmTable {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, AlarmError> {
        self.db
            .lock()
            .map_err(|_| AlarmError::Unavailable("alarm table lock poisoned".into()))
    }

    /// All alarms, soonest first.
    pub fn list(&self) -> Result<Vec<ScheduledAlarm>, DatabaseError> {
        let db = self
            .db
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("alarm table lock poisoned".into()))?;
        let mut stmt = db.conn().prepare(
            "SELECT id, fire_at, interval_secs, payload FROM alarms ORDER BY fire_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut alarms = Vec::new();
        for row in rows {
            let (id, fire_at, interval_secs, payload) = row?;
            let fire_at = NaiveDateTime::parse_from_str(&fire_at, FIRE_AT_FORMAT).map_err(|e| {
                DatabaseError::CorruptRow {
                    table: "alarms".into(),
                    message: format!("{id}: {e}"),
                }
            })?;
            alarms.push(ScheduledAlarm {
                id: ReminderId::new(id),
                fire_at,
                interval_secs,
                payload,
            });
        }
        Ok(alarms)
    }

    /// Remove every alarm, as a reboot would.
    pub fn clear(&self) -> Result<usize, DatabaseError> {
        let db = self
            .db
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("alarm table lock poisoned".into()))?;
        Ok(db.conn().execute("DELETE FROM alarms", [])?)
    }
}

impl AlarmFacility for LocalAlarmTable {
    fn register(
        &self,
        id: &ReminderId,
        fire_at: NaiveDateTime,
        interval: Duration,
        payload: &str,
    ) -> Result<AlarmHandle, AlarmError> {
        self.db()?
            .conn()
            .execute(
                "INSERT OR REPLACE INTO alarms (id, fire_at, interval_secs, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.as_str(),
                    fire_at.format(FIRE_AT_FORMAT).to_string(),
                    interval.num_seconds(),
                    payload
                ],
            )
            .map_err(|e| AlarmError::Unavailable(e.to_string()))?;
        Ok(AlarmHandle {
            id: id.clone(),
            fire_at,
        })
    }

    fn cancel(&self, id: &ReminderId) -> Result<(), AlarmError> {
        self.db()?
            .conn()
            .execute("DELETE FROM alarms WHERE id = ?1", params![id.as_str()])
            .map_err(|e| AlarmError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn is_registered(&self, id: &ReminderId) -> Result<bool, AlarmError> {
        let found = self
            .db()?
            .conn()
            .query_row(
                "SELECT 1 FROM alarms WHERE id = ?1",
                params![id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| AlarmError::Unavailable(e.to_string()))?;
        Ok(found.is_some())
    }
}
