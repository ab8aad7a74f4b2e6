//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Reminder policy (meal slots, water window, checkpoint sizing)
//! - Logging level
//!
//! Configuration is stored at `<data_dir>/config.toml`. The three goal
//! values live in the settings store, not here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::reminder::{PlannerPolicy, TimeOfDay};

/// A fixed meal reminder slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSlot {
    pub label: String,
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

/// Reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_meals")]
    pub meals: Vec<MealSlot>,
    #[serde(default = "default_water_start_hour")]
    pub water_start_hour: u32,
    #[serde(default = "default_water_end_hour")]
    pub water_end_hour: u32,
    #[serde(default = "default_ml_per_checkpoint")]
    pub ml_per_checkpoint: u32,
    #[serde(default = "default_min_checkpoints")]
    pub min_checkpoints: u32,
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}
fn default_meals() -> Vec<MealSlot> {
    vec![
        MealSlot {
            label: "Breakfast".into(),
            hour: 8,
            minute: 30,
        },
        MealSlot {
            label: "Dinner".into(),
            hour: 19,
            minute: 0,
        },
    ]
}
fn default_water_start_hour() -> u32 {
    9
}
fn default_water_end_hour() -> u32 {
    21
}
fn default_ml_per_checkpoint() -> u32 {
    500
}
fn default_min_checkpoints() -> u32 {
    2
}
fn default_max_checkpoints() -> u32 {
    12
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            meals: default_meals(),
            water_start_hour: default_water_start_hour(),
            water_end_hour: default_water_end_hour(),
            ml_per_checkpoint: default_ml_per_checkpoint(),
            min_checkpoints: default_min_checkpoints(),
            max_checkpoints: default_max_checkpoints(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RemindersConfig {
    /// Check the policy fields, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: format!("reminders.{key}"),
            message,
        };

        if self.water_end_hour > 23 {
            return Err(invalid("water_end_hour", "must be below 24".into()));
        }
        if self.water_start_hour >= self.water_end_hour {
            return Err(invalid(
                "water_start_hour",
                format!("must be before water_end_hour ({})", self.water_end_hour),
            ));
        }
        if self.ml_per_checkpoint == 0 {
            return Err(invalid("ml_per_checkpoint", "must be positive".into()));
        }
        if self.min_checkpoints == 0 || self.min_checkpoints > self.max_checkpoints {
            return Err(invalid(
                "min_checkpoints",
                format!("must be between 1 and max_checkpoints ({})", self.max_checkpoints),
            ));
        }
        for (i, meal) in self.meals.iter().enumerate() {
            if TimeOfDay::new(meal.hour, meal.minute).is_err() {
                return Err(invalid(
                    &format!("meals[{i}]"),
                    format!("{:02}:{:02} is not a valid time", meal.hour, meal.minute),
                ));
            }
        }
        Ok(())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of the config file inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::DataDir(e.to_string()))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the defaults there on first use.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// The value is parsed according to the type of the existing value.
    /// Reminder policy values are validated before the change is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.reminders.validate()?;
        *self = updated;
        Ok(())
    }

    /// Planner policy derived from the `[reminders]` section.
    ///
    /// An invalid section falls back to the default policy so a bad edit
    /// never stops reminders from being scheduled.
    pub fn reminder_policy(&self) -> PlannerPolicy {
        match self.reminders.validate() {
            Ok(()) => PlannerPolicy::from_config(&self.reminders),
            Err(e) => {
                tracing::warn!("invalid reminder policy, using defaults: {e}");
                PlannerPolicy::default()
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("failed to load config, using defaults: {e}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed.reminders.enabled);
        assert_eq!(parsed.reminders.meals.len(), 2);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[reminders]\nml_per_checkpoint = 250\n").unwrap();
        assert_eq!(parsed.reminders.ml_per_checkpoint, 250);
        assert_eq!(parsed.reminders.water_start_hour, 9);
        assert_eq!(parsed.reminders.meals, default_meals());
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("reminders.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("reminders.water_end_hour").as_deref(), Some("21"));
        assert_eq!(cfg.get("logging.level").as_deref(), Some("info"));
        assert!(cfg.get("reminders.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("reminders.enabled", "false").unwrap();
        cfg.set("reminders.ml_per_checkpoint", "400").unwrap();
        cfg.set("logging.level", "debug").unwrap();
        assert!(!cfg.reminders.enabled);
        assert_eq!(cfg.reminders.ml_per_checkpoint, 400);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn set_accepts_json_for_meal_list() {
        let mut cfg = Config::default();
        cfg.set(
            "reminders.meals",
            r#"[{"label":"Lunch","hour":12,"minute":15}]"#,
        )
        .unwrap();
        assert_eq!(cfg.reminders.meals.len(), 1);
        assert_eq!(cfg.reminders.meals[0].label, "Lunch");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("reminders.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("reminders.enabled", "not_a_bool").is_err());
        assert!(cfg.set("reminders.water_start_hour", "nine").is_err());
    }

    #[test]
    fn set_rejects_inverted_water_window() {
        let mut cfg = Config::default();
        let result = cfg.set("reminders.water_start_hour", "22");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert_eq!(cfg.reminders.water_start_hour, 9);
    }

    #[test]
    fn invalid_policy_falls_back_to_default() {
        let mut cfg = Config::default();
        cfg.reminders.ml_per_checkpoint = 0;
        assert_eq!(cfg.reminder_policy(), PlannerPolicy::default());
    }

    #[test]
    fn load_from_writes_defaults_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(cfg.reminders.enabled);

        let mut changed = cfg.clone();
        changed.set("reminders.max_checkpoints", "8").unwrap();
        changed.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.reminders.max_checkpoints, 8);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "reminders = 5").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
