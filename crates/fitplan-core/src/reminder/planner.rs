//! Reminder planning: a pure projection from goals to reminder definitions.
//!
//! Policy:
//! - one daily reminder per configured meal slot (`meal-1`, `meal-2`, ...),
//!   with the protein target split evenly across meals
//! - `n = clamp(ceil(water_ml / ml_per_checkpoint), min, max)` daily water
//!   checkpoints (`water-checkpoint-1` ..= `water-checkpoint-n`), spread evenly
//!   from the window start to the window end inclusive
//!
//! `portion_percent` only appears in payload text. Output is sorted by time
//! of day, then id.

use crate::settings::Goals;
use crate::storage::RemindersConfig;

use super::definition::{Recurrence, ReminderDefinition, ReminderId, ReminderKind, TimeOfDay};

/// Prefix of meal reminder ids.
pub const MEAL_ID_PREFIX: &str = "meal-";
/// Prefix of water checkpoint ids.
pub const WATER_ID_PREFIX: &str = "water-checkpoint-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealPolicy {
    pub label: String,
    pub time: TimeOfDay,
}

/// Fixed product parameters the planner applies to the goals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerPolicy {
    pub enabled: bool,
    pub meals: Vec<MealPolicy>,
    pub water_start: TimeOfDay,
    pub water_end: TimeOfDay,
    pub ml_per_checkpoint: u32,
    pub min_checkpoints: u32,
    pub max_checkpoints: u32,
}

impl Default for PlannerPolicy {
    fn default() -> Self {
        Self::from_config(&RemindersConfig::default())
    }
}

impl PlannerPolicy {
    /// Build from a config section. Expects `config.validate()` to pass;
    /// out-of-range times are wrapped rather than rejected.
    pub fn from_config(config: &RemindersConfig) -> Self {
        Self {
            enabled: config.enabled,
            meals: config
                .meals
                .iter()
                .map(|m| MealPolicy {
                    label: m.label.clone(),
                    time: TimeOfDay::from_minutes(m.hour * 60 + m.minute),
                })
                .collect(),
            water_start: TimeOfDay::from_minutes(config.water_start_hour * 60),
            water_end: TimeOfDay::from_minutes(config.water_end_hour * 60),
            ml_per_checkpoint: config.ml_per_checkpoint.max(1),
            min_checkpoints: config.min_checkpoints.max(1),
            max_checkpoints: config.max_checkpoints.max(config.min_checkpoints.max(1)),
        }
    }

    /// Number of water checkpoints for a daily target. Non-decreasing in
    /// `water_ml` and never zero.
    pub fn checkpoint_count(&self, water_ml: i64) -> u32 {
        let per = i64::from(self.ml_per_checkpoint.max(1));
        let needed = (water_ml.max(0) + per - 1) / per;
        let needed = u32::try_from(needed).unwrap_or(u32::MAX);
        needed
            .max(self.min_checkpoints.max(1))
            .min(self.max_checkpoints.max(1))
    }

    /// Checkpoint times, evenly spaced over the window inclusive of both ends.
    pub fn checkpoint_times(&self, count: u32) -> Vec<TimeOfDay> {
        let start = self.water_start.minutes_since_midnight();
        let end = self.water_end.minutes_since_midnight().max(start);
        if count <= 1 {
            return vec![self.water_start];
        }
        let span = end - start;
        (0..count)
            .map(|i| TimeOfDay::from_minutes(start + i * span / (count - 1)))
            .collect()
    }
}

/// Turns goals into reminder definitions.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    policy: PlannerPolicy,
}

impl Planner {
    pub fn new(policy: PlannerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PlannerPolicy {
        &self.policy
    }

    pub fn plan(&self, goals: &Goals) -> Vec<ReminderDefinition> {
        if !self.policy.enabled {
            return Vec::new();
        }

        let goals = goals.clamped();
        let mut planned = self.meal_reminders(&goals);
        planned.extend(self.water_reminders(&goals));
        planned.sort_by(|a, b| {
            a.time_of_day
                .cmp(&b.time_of_day)
                .then_with(|| a.id.cmp(&b.id))
        });
        planned
    }

    fn meal_reminders(&self, goals: &Goals) -> Vec<ReminderDefinition> {
        let meals = self.policy.meals.len() as i64;
        if meals == 0 {
            return Vec::new();
        }
        let protein_per_meal = (goals.protein_target_grams + meals / 2) / meals;

        self.policy
            .meals
            .iter()
            .enumerate()
            .map(|(i, meal)| ReminderDefinition {
                id: ReminderId::new(format!("{MEAL_ID_PREFIX}{}", i + 1)),
                kind: ReminderKind::Meal,
                time_of_day: meal.time,
                recurrence: Recurrence::Daily,
                payload: format!(
                    "{}: aim for {} g protein, portion {}% (daily target {} g)",
                    meal.label,
                    protein_per_meal,
                    goals.portion_percent,
                    goals.protein_target_grams
                ),
            })
            .collect()
    }

    fn water_reminders(&self, goals: &Goals) -> Vec<ReminderDefinition> {
        let count = self.policy.checkpoint_count(goals.water_target_ml);
        let per_checkpoint = (goals.water_target_ml + i64::from(count) / 2) / i64::from(count);

        self.policy
            .checkpoint_times(count)
            .into_iter()
            .enumerate()
            .map(|(i, time)| ReminderDefinition {
                id: ReminderId::new(format!("{WATER_ID_PREFIX}{}", i + 1)),
                kind: ReminderKind::Water,
                time_of_day: time,
                recurrence: Recurrence::Daily,
                payload: format!(
                    "Water {}/{}: drink about {} ml (daily target {} ml)",
                    i + 1,
                    count,
                    per_checkpoint,
                    goals.water_target_ml
                ),
            })
            .collect()
    }
}

/// Plan with the default policy.
pub fn plan(goals: &Goals) -> Vec<ReminderDefinition> {
    Planner::default().plan(goals)
}
