//! Goal settings: protein target, water target and portion percentage.
//!
//! The store is the authority on value domains. Callers (sliders, CLI
//! arguments) are not trusted: out-of-range writes are clamped to the
//! nearest bound and a warning is logged.

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, StoreError, ValidationError};
use crate::storage::Database;

/// One of the three persisted goal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Setting {
    Protein,
    Water,
    Portion,
}

impl Setting {
    pub const ALL: [Setting; 3] = [Setting::Protein, Setting::Water, Setting::Portion];

    /// Storage key.
    pub fn key(self) -> &'static str {
        match self {
            Setting::Protein => "protein",
            Setting::Water => "su",
            Setting::Portion => "porsiyon",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    pub fn range(self) -> RangeInclusive<i64> {
        match self {
            Setting::Protein => 60..=220,
            Setting::Water => 1500..=5000,
            Setting::Portion => 50..=150,
        }
    }

    pub fn default_value(self) -> i64 {
        match self {
            Setting::Protein => 130,
            Setting::Water => 3000,
            Setting::Portion => 100,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Setting::Protein => "g",
            Setting::Water => "ml",
            Setting::Portion => "%",
        }
    }

    pub fn clamp(self, value: i64) -> i64 {
        let range = self.range();
        value.clamp(*range.start(), *range.end())
    }

    /// Strict check, for callers that want to reject rather than clamp.
    pub fn validate(self, value: i64) -> Result<i64, ValidationError> {
        let range = self.range();
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError::OutOfRange {
                key: self.key().to_string(),
                value,
                min: *range.start(),
                max: *range.end(),
            })
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Snapshot of all three goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goals {
    pub protein_target_grams: i64,
    pub water_target_ml: i64,
    pub portion_percent: i64,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            protein_target_grams: Setting::Protein.default_value(),
            water_target_ml: Setting::Water.default_value(),
            portion_percent: Setting::Portion.default_value(),
        }
    }
}

impl Goals {
    pub fn get(&self, setting: Setting) -> i64 {
        match setting {
            Setting::Protein => self.protein_target_grams,
            Setting::Water => self.water_target_ml,
            Setting::Portion => self.portion_percent,
        }
    }

    fn slot(&mut self, setting: Setting) -> &mut i64 {
        match setting {
            Setting::Protein => &mut self.protein_target_grams,
            Setting::Water => &mut self.water_target_ml,
            Setting::Portion => &mut self.portion_percent,
        }
    }

    /// Copy with every field forced into its domain.
    pub fn clamped(mut self) -> Self {
        for setting in Setting::ALL {
            let slot = self.slot(setting);
            *slot = setting.clamp(*slot);
        }
        self
    }
}

/// Uncommitted edits to the goals, as held by a settings dialog.
///
/// Nothing is persisted until the draft is committed through
/// [`ReminderService::commit`](crate::reminder::ReminderService::commit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalsDraft {
    goals: Goals,
}

impl GoalsDraft {
    pub fn new(current: Goals) -> Self {
        Self { goals: current }
    }

    /// Update one field, clamped the same way the store would.
    pub fn set(&mut self, setting: Setting, value: i64) -> &mut Self {
        *self.goals.slot(setting) = setting.clamp(value);
        self
    }

    pub fn goals(&self) -> Goals {
        self.goals
    }
}

/// Raw integer persistence underneath [`SettingsStore`].
pub trait SettingsBackend {
    fn read(&self, key: &str) -> Result<Option<i64>, DatabaseError>;
    fn write(&self, key: &str, value: i64) -> Result<(), DatabaseError>;
}

impl SettingsBackend for Database {
    fn read(&self, key: &str) -> Result<Option<i64>, DatabaseError> {
        self.kv_get(key)
    }

    fn write(&self, key: &str, value: i64) -> Result<(), DatabaseError> {
        self.kv_set(key, value)
    }
}

/// Process-local backend, used by tests and previews.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<i64>, DatabaseError> {
        let values = self
            .values
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("settings lock poisoned".into()))?;
        Ok(values.get(key).copied())
    }

    fn write(&self, key: &str, value: i64) -> Result<(), DatabaseError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("settings lock poisoned".into()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Domain-enforcing settings store.
pub struct SettingsStore<B> {
    backend: B,
}

impl<B: SettingsBackend> SettingsStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read an integer by raw key. Never fails.
    ///
    /// Unknown keys and read errors yield `default`; stored values outside a
    /// known setting's domain are clamped on the way out.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        let stored = match self.backend.read(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, "settings read failed, using default: {e}");
                None
            }
        };
        match (stored, Setting::from_key(key)) {
            (Some(v), Some(setting)) => setting.clamp(v),
            (Some(v), None) => v,
            (None, _) => default,
        }
    }

    /// Write an integer by raw key, returning the value actually stored.
    pub fn put_int(&self, key: &str, value: i64) -> Result<i64, StoreError> {
        let setting =
            Setting::from_key(key).ok_or_else(|| StoreError::UnknownKey(key.to_string()))?;
        self.set(setting, value)
    }

    pub fn get(&self, setting: Setting) -> i64 {
        self.get_int(setting.key(), setting.default_value())
    }

    /// Clamp and persist one setting, returning the stored value.
    ///
    /// The write is visible to subsequent reads on return.
    pub fn set(&self, setting: Setting, value: i64) -> Result<i64, StoreError> {
        let stored = setting.clamp(value);
        if stored != value {
            tracing::warn!(
                key = setting.key(),
                requested = value,
                stored,
                "setting out of range, clamped"
            );
        }
        self.backend
            .write(setting.key(), stored)
            .map_err(|e| StoreError::WriteFailed {
                key: setting.key().to_string(),
                message: e.to_string(),
            })?;
        Ok(stored)
    }

    pub fn load_goals(&self) -> Goals {
        Goals {
            protein_target_grams: self.get(Setting::Protein),
            water_target_ml: self.get(Setting::Water),
            portion_percent: self.get(Setting::Portion),
        }
    }

    /// Persist all three goals. Returns the goals as stored.
    ///
    /// Stops at the first failed write; the caller must not plan from a
    /// partially written snapshot.
    pub fn save_goals(&self, goals: &Goals) -> Result<Goals, StoreError> {
        let mut stored = *goals;
        for setting in Setting::ALL {
            *stored.slot(setting) = self.set(setting, goals.get(setting))?;
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl SettingsBackend for FailingBackend {
        fn read(&self, _key: &str) -> Result<Option<i64>, DatabaseError> {
            Err(DatabaseError::Locked)
        }

        fn write(&self, _key: &str, _value: i64) -> Result<(), DatabaseError> {
            Err(DatabaseError::Locked)
        }
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let store = SettingsStore::new(MemoryBackend::new());
        assert_eq!(store.load_goals(), Goals::default());
        assert_eq!(store.get_int("protein", 130), 130);
    }

    #[test]
    fn protein_below_domain_is_clamped_to_lower_bound() {
        let store = SettingsStore::new(MemoryBackend::new());
        let stored = store.put_int("protein", 10).unwrap();
        assert_eq!(stored, 60);
        assert_eq!(store.get_int("protein", 130), 60);
    }

    #[test]
    fn water_above_domain_is_clamped_to_upper_bound() {
        let store = SettingsStore::new(MemoryBackend::new());
        assert_eq!(store.set(Setting::Water, 9000).unwrap(), 5000);
        assert_eq!(store.get(Setting::Water), 5000);
    }

    #[test]
    fn in_range_values_are_stored_verbatim() {
        let store = SettingsStore::new(MemoryBackend::new());
        assert_eq!(store.put_int("porsiyon", 75).unwrap(), 75);
        assert_eq!(store.get(Setting::Portion), 75);
    }

    #[test]
    fn unknown_key_write_is_rejected() {
        let store = SettingsStore::new(MemoryBackend::new());
        assert!(matches!(
            store.put_int("kalori", 2000),
            Err(StoreError::UnknownKey(_))
        ));
    }

    #[test]
    fn out_of_range_value_in_backend_is_clamped_on_read() {
        let backend = MemoryBackend::new();
        backend.write("su", 100).unwrap();
        let store = SettingsStore::new(backend);
        assert_eq!(store.get(Setting::Water), 1500);
    }

    #[test]
    fn read_failure_returns_default() {
        let store = SettingsStore::new(FailingBackend);
        assert_eq!(store.get_int("su", 3000), 3000);
        assert_eq!(store.load_goals(), Goals::default());
    }

    #[test]
    fn write_failure_is_reported() {
        let store = SettingsStore::new(FailingBackend);
        assert!(matches!(
            store.set(Setting::Protein, 100),
            Err(StoreError::WriteFailed { .. })
        ));
    }

    #[test]
    fn save_goals_writes_all_three_clamped() {
        let store = SettingsStore::new(MemoryBackend::new());
        let goals = Goals {
            protein_target_grams: 300,
            water_target_ml: 4000,
            portion_percent: 20,
        };
        let stored = store.save_goals(&goals).unwrap();
        assert_eq!(stored, goals.clamped());
        assert_eq!(store.load_goals(), stored);
        assert_eq!(stored.protein_target_grams, 220);
        assert_eq!(stored.portion_percent, 50);
    }

    #[test]
    fn sqlite_backend_round_trips_goals() {
        let store = SettingsStore::new(Database::open_memory().unwrap());
        let goals = Goals {
            protein_target_grams: 150,
            water_target_ml: 4000,
            portion_percent: 100,
        };
        store.save_goals(&goals).unwrap();
        assert_eq!(store.load_goals(), goals);
    }

    #[test]
    fn validate_reports_out_of_range() {
        assert_eq!(Setting::Portion.validate(100), Ok(100));
        let err = Setting::Protein.validate(10).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                key: "protein".into(),
                value: 10,
                min: 60,
                max: 220,
            }
        );
    }

    #[test]
    fn draft_clamps_and_does_not_persist() {
        let mut draft = GoalsDraft::new(Goals::default());
        draft.set(Setting::Water, 1000).set(Setting::Protein, 150);
        assert_eq!(draft.goals().water_target_ml, 1500);
        assert_eq!(draft.goals().protein_target_grams, 150);
    }

    #[test]
    fn from_key_matches_storage_keys() {
        for setting in Setting::ALL {
            assert_eq!(Setting::from_key(setting.key()), Some(setting));
        }
        assert_eq!(Setting::from_key("water"), None);
    }
}
