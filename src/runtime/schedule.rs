/// Recurring schedule definitions and fire-time computation
///
/// A `ScheduleConfig` is what callers send; validating it yields a `Schedule` that
/// can no longer be incomplete. Fire times are computed on local wall-clock time
/// and are always strictly after the reference instant.

use crate::error::EngineError;
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Interval,
    Daily,
    Weekly,
    Monthly,
}

/// Schedule as submitted; only the fields relevant to `type` are read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    /// Minutes between runs (interval)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// "HH:MM" (daily, weekly, monthly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// 0 = Sunday .. 6 = Saturday (weekly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    /// 1..=31 (monthly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
}

/// A complete, validated schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Interval { minutes: u32 },
    Daily { time: NaiveTime },
    Weekly { day_of_week: u32, time: NaiveTime },
    /// Months shorter than `day_of_month` fire on their last day
    Monthly { day_of_month: u32, time: NaiveTime },
}

impl ScheduleConfig {
    /// Reject configs missing a field their type needs
    pub fn validate(&self) -> Result<Schedule, EngineError> {
        match self.schedule_type {
            ScheduleType::Interval => match self.interval {
                Some(minutes) if minutes >= 1 && minutes <= i64::from(u32::MAX) => Ok(Schedule::Interval {
                    minutes: minutes as u32,
                }),
                _ => Err(EngineError::validation("Please enter a valid interval (minutes)")),
            },
            ScheduleType::Daily => {
                let time = self.time_of_day("Please select a time for daily execution")?;
                Ok(Schedule::Daily { time })
            }
            ScheduleType::Weekly => {
                let message = "Please select a time and day for weekly execution";
                let time = self.time_of_day(message)?;
                match self.day_of_week {
                    Some(day_of_week) if day_of_week <= 6 => Ok(Schedule::Weekly { day_of_week, time }),
                    _ => Err(EngineError::validation(message)),
                }
            }
            ScheduleType::Monthly => {
                let message = "Please select a time and day for monthly execution";
                let time = self.time_of_day(message)?;
                match self.day_of_month {
                    Some(day_of_month) if (1..=31).contains(&day_of_month) => {
                        Ok(Schedule::Monthly { day_of_month, time })
                    }
                    _ => Err(EngineError::validation(message)),
                }
            }
        }
    }

    fn time_of_day(&self, message: &str) -> Result<NaiveTime, EngineError> {
        self.time
            .as_deref()
            .and_then(|raw| NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok())
            .ok_or_else(|| EngineError::validation(message))
    }
}

/// Next instant strictly after `now` at which `schedule` fires
///
/// Pure: the same inputs always give the same answer. `None` only when the
/// result would fall outside chrono's representable calendar.
pub fn compute_next_fire_time(now: NaiveDateTime, schedule: &Schedule) -> Option<NaiveDateTime> {
    match *schedule {
        Schedule::Interval { minutes } => now.checked_add_signed(chrono::Duration::minutes(i64::from(minutes))),
        Schedule::Daily { time } => {
            let today = now.date().and_time(time);
            if today > now {
                Some(today)
            } else {
                today.checked_add_days(Days::new(1))
            }
        }
        Schedule::Weekly { day_of_week, time } => {
            let current = now.weekday().num_days_from_sunday();
            let delta = (day_of_week + 7 - current) % 7;
            let candidate = now.date().checked_add_days(Days::new(u64::from(delta)))?.and_time(time);
            if candidate > now {
                Some(candidate)
            } else {
                candidate.checked_add_days(Days::new(7))
            }
        }
        Schedule::Monthly { day_of_month, time } => {
            let first_of_month = now.date().with_day(1)?;
            let candidate = clamped_day(first_of_month, day_of_month)?.and_time(time);
            if candidate > now {
                return Some(candidate);
            }
            let first_of_next = first_of_month.checked_add_months(Months::new(1))?;
            Some(clamped_day(first_of_next, day_of_month)?.and_time(time))
        }
    }
}

/// `day` within the month starting at `first`, clamped to the month's last day
fn clamped_day(first: NaiveDate, day: u32) -> Option<NaiveDate> {
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?.day();
    first.with_day(day.min(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn config(schedule_type: ScheduleType) -> ScheduleConfig {
        ScheduleConfig {
            schedule_type,
            interval: None,
            time: None,
            day_of_week: None,
            day_of_month: None,
        }
    }

    fn daily(time: &str) -> Schedule {
        ScheduleConfig {
            time: Some(time.into()),
            ..config(ScheduleType::Daily)
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn interval_adds_minutes() {
        let now = at(2025, 3, 10, 23, 50);
        let next = compute_next_fire_time(now, &Schedule::Interval { minutes: 15 }).unwrap();
        assert_eq!(next, at(2025, 3, 11, 0, 5));
    }

    #[test]
    fn daily_time_already_passed_fires_tomorrow() {
        let now = at(2025, 3, 10, 10, 0);
        let next = compute_next_fire_time(now, &daily("09:00")).unwrap();
        assert_eq!(next, at(2025, 3, 11, 9, 0));
        assert_eq!(next - at(2025, 3, 10, 9, 0), chrono::Duration::hours(24));
    }

    #[test]
    fn daily_never_returns_now_or_earlier() {
        let now = at(2025, 3, 10, 9, 0);
        assert_eq!(compute_next_fire_time(now, &daily("09:00")), Some(at(2025, 3, 11, 9, 0)));
        assert_eq!(compute_next_fire_time(now, &daily("09:01")), Some(at(2025, 3, 10, 9, 1)));
    }

    #[test]
    fn computation_is_pure() {
        let now = at(2025, 6, 15, 12, 30);
        let schedule = Schedule::Weekly {
            day_of_week: 3,
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        };
        assert_eq!(
            compute_next_fire_time(now, &schedule),
            compute_next_fire_time(now, &schedule)
        );
    }

    #[test]
    fn weekly_picks_next_matching_weekday() {
        // 2025-03-10 is a Monday
        let now = at(2025, 3, 10, 10, 0);
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        let wednesday = Schedule::Weekly { day_of_week: 3, time };
        assert_eq!(compute_next_fire_time(now, &wednesday), Some(at(2025, 3, 12, 9, 0)));

        let sunday = Schedule::Weekly { day_of_week: 0, time };
        assert_eq!(compute_next_fire_time(now, &sunday), Some(at(2025, 3, 16, 9, 0)));

        // same weekday, time already passed
        let monday = Schedule::Weekly { day_of_week: 1, time };
        assert_eq!(compute_next_fire_time(now, &monday), Some(at(2025, 3, 17, 9, 0)));

        let later_today = Schedule::Weekly {
            day_of_week: 1,
            time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        };
        assert_eq!(compute_next_fire_time(now, &later_today), Some(at(2025, 3, 10, 11, 0)));
    }

    #[test]
    fn monthly_rolls_to_next_month() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let on_fifth = Schedule::Monthly { day_of_month: 5, time };

        assert_eq!(compute_next_fire_time(at(2025, 3, 1, 0, 0), &on_fifth), Some(at(2025, 3, 5, 9, 0)));
        assert_eq!(compute_next_fire_time(at(2025, 3, 5, 9, 0), &on_fifth), Some(at(2025, 4, 5, 9, 0)));
        assert_eq!(compute_next_fire_time(at(2025, 12, 20, 0, 0), &on_fifth), Some(at(2026, 1, 5, 9, 0)));
    }

    #[test]
    fn monthly_clamps_to_last_day_of_short_months() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let on_31st = Schedule::Monthly { day_of_month: 31, time };

        assert_eq!(compute_next_fire_time(at(2025, 2, 10, 0, 0), &on_31st), Some(at(2025, 2, 28, 9, 0)));
        assert_eq!(compute_next_fire_time(at(2024, 2, 10, 0, 0), &on_31st), Some(at(2024, 2, 29, 9, 0)));
        assert_eq!(compute_next_fire_time(at(2025, 4, 30, 10, 0), &on_31st), Some(at(2025, 5, 31, 9, 0)));
        assert_eq!(compute_next_fire_time(at(2025, 1, 31, 10, 0), &on_31st), Some(at(2025, 2, 28, 9, 0)));
    }

    #[test]
    fn incomplete_configs_are_rejected() {
        let rejected = [
            config(ScheduleType::Interval),
            ScheduleConfig { interval: Some(0), ..config(ScheduleType::Interval) },
            ScheduleConfig { interval: Some(-5), ..config(ScheduleType::Interval) },
            config(ScheduleType::Daily),
            ScheduleConfig { time: Some("25:00".into()), ..config(ScheduleType::Daily) },
            ScheduleConfig { time: Some("09:00".into()), ..config(ScheduleType::Weekly) },
            ScheduleConfig { time: Some("09:00".into()), day_of_week: Some(7), ..config(ScheduleType::Weekly) },
            ScheduleConfig { day_of_week: Some(2), ..config(ScheduleType::Weekly) },
            ScheduleConfig { time: Some("09:00".into()), ..config(ScheduleType::Monthly) },
            ScheduleConfig { time: Some("09:00".into()), day_of_month: Some(32), ..config(ScheduleType::Monthly) },
            ScheduleConfig { time: Some("09:00".into()), day_of_month: Some(0), ..config(ScheduleType::Monthly) },
        ];

        for config in rejected {
            assert!(
                matches!(config.validate(), Err(EngineError::Validation(_))),
                "accepted {config:?}"
            );
        }
    }

    #[test]
    fn irrelevant_fields_are_ignored() {
        let schedule = ScheduleConfig {
            interval: Some(10),
            time: Some("not a time".into()),
            day_of_month: Some(99),
            ..config(ScheduleType::Interval)
        }
        .validate()
        .unwrap();
        assert_eq!(schedule, Schedule::Interval { minutes: 10 });
    }

    #[test]
    fn parses_front_end_json() {
        let config: ScheduleConfig =
            serde_json::from_str(r#"{"type":"weekly","time":"07:30","dayOfWeek":5}"#).unwrap();
        assert_eq!(
            config.validate().unwrap(),
            Schedule::Weekly {
                day_of_week: 5,
                time: NaiveTime::from_hms_opt(7, 30, 0).unwrap()
            }
        );
    }
}
