use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable identity of a logical reminder (e.g. `meal-1`, `water-checkpoint-3`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReminderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Local wall-clock time of day, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTimeOfDay { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    /// Build from minutes since midnight, wrapping past 24h.
    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = minutes % (24 * 60);
        Self {
            hour: minutes / 60,
            minute: minutes % 60,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// How often a reminder repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly { weekday: Weekday },
}

impl Recurrence {
    /// Repeat interval handed to the alarm facility.
    pub fn interval(&self) -> Duration {
        match self {
            Recurrence::Daily => Duration::days(1),
            Recurrence::Weekly { .. } => Duration::weeks(1),
        }
    }

    /// First occurrence of `time` strictly after `now`.
    pub fn next_fire_after(&self, time: TimeOfDay, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        match self {
            Recurrence::Daily => {
                let candidate = time.on(today);
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            Recurrence::Weekly { weekday } => {
                let ahead = (7 + weekday.num_days_from_monday() as i64
                    - today.weekday().num_days_from_monday() as i64)
                    % 7;
                let candidate = time.on(today) + Duration::days(ahead);
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::weeks(1)
                }
            }
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Daily => f.write_str("daily"),
            Recurrence::Weekly { weekday } => {
                write!(f, "weekly:{}", weekday.to_string().to_lowercase())
            }
        }
    }
}

impl FromStr for Recurrence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidValue {
            field: "recurrence".into(),
            message: format!("unrecognised recurrence '{s}'"),
        };
        match s.split_once(':') {
            None if s == "daily" => Ok(Recurrence::Daily),
            Some(("weekly", day)) => day
                .parse::<Weekday>()
                .map(|weekday| Recurrence::Weekly { weekday })
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Meal,
    Water,
}

/// One recurring reminder as produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderDefinition {
    pub id: ReminderId,
    pub kind: ReminderKind,
    pub time_of_day: TimeOfDay,
    pub recurrence: Recurrence,
    /// Message shown when the reminder fires.
    pub payload: String,
}

impl ReminderDefinition {
    pub fn next_fire_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.recurrence.next_fire_after(self.time_of_day, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn time_of_day_rejects_invalid() {
        assert!(TimeOfDay::new(24, 0).is_err());
        assert!(TimeOfDay::new(12, 60).is_err());
        assert_eq!(TimeOfDay::new(7, 5).unwrap().to_string(), "07:05");
    }

    #[test]
    fn from_minutes_splits_hours() {
        let t = TimeOfDay::from_minutes(13 * 60 + 48);
        assert_eq!((t.hour(), t.minute()), (13, 48));
        assert_eq!(t.minutes_since_midnight(), 13 * 60 + 48);
    }

    #[test]
    fn daily_fires_later_today_when_time_not_passed() {
        let now = at(2026, 3, 10, 7, 0);
        let next = Recurrence::Daily.next_fire_after(TimeOfDay::new(8, 30).unwrap(), now);
        assert_eq!(next, at(2026, 3, 10, 8, 30));
    }

    #[test]
    fn daily_rolls_to_tomorrow_when_time_passed_or_equal() {
        let time = TimeOfDay::new(8, 30).unwrap();
        assert_eq!(
            Recurrence::Daily.next_fire_after(time, at(2026, 3, 10, 8, 30)),
            at(2026, 3, 11, 8, 30)
        );
        assert_eq!(
            Recurrence::Daily.next_fire_after(time, at(2026, 12, 31, 23, 0)),
            at(2027, 1, 1, 8, 30)
        );
    }

    #[test]
    fn weekly_finds_next_matching_weekday() {
        // 2026-03-10 is a Tuesday.
        let rec = Recurrence::Weekly {
            weekday: Weekday::Fri,
        };
        let time = TimeOfDay::new(18, 0).unwrap();
        assert_eq!(rec.next_fire_after(time, at(2026, 3, 10, 9, 0)), at(2026, 3, 13, 18, 0));

        let same_day = Recurrence::Weekly {
            weekday: Weekday::Tue,
        };
        assert_eq!(
            same_day.next_fire_after(time, at(2026, 3, 10, 19, 0)),
            at(2026, 3, 17, 18, 0)
        );
    }

    #[test]
    fn recurrence_text_form_parses_back() {
        let weekly = Recurrence::Weekly {
            weekday: Weekday::Mon,
        };
        assert_eq!(weekly.to_string(), "weekly:mon");
        assert_eq!("weekly:mon".parse::<Recurrence>().unwrap(), weekly);
        assert_eq!("daily".parse::<Recurrence>().unwrap(), Recurrence::Daily);
        assert!("hourly".parse::<Recurrence>().is_err());
        assert!("weekly:someday".parse::<Recurrence>().is_err());
    }

    #[test]
    fn intervals() {
        assert_eq!(Recurrence::Daily.interval(), Duration::hours(24));
        assert_eq!(
            Recurrence::Weekly {
                weekday: Weekday::Sun
            }
            .interval(),
            Duration::days(7)
        );
    }
}
