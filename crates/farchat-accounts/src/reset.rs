//! Usage Reset Countdown
//!
//! Daily allowances reset at UTC midnight; this computes the time left for
//! "Resets in 03:12:09" style displays.

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::Serialize;

/// Start of the next UTC day after `now`
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .map_or(DateTime::<Utc>::MAX_UTC, |date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Broken-down time remaining until a target instant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeLeft {
    pub days: i64,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeLeft {
    /// `None` once `target` is not in the future
    pub fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Option<Self> {
        let difference = target - now;
        if difference.num_milliseconds() <= 0 {
            return None;
        }

        let total = difference.num_seconds();
        // Components below a day are < 86_400 and fit in u32
        let within_day = u32::try_from(total % 86_400).unwrap_or(0);

        Some(Self {
            days: total / 86_400,
            hours: within_day / 3_600,
            minutes: (within_day / 60) % 60,
            seconds: within_day % 60,
        })
    }

    /// Time left until the next daily reset
    pub fn until_reset(now: DateTime<Utc>) -> Option<Self> {
        Self::until(next_reset(now), now)
    }
}

impl std::fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.days > 0 {
            write!(f, "{}d ", self.days)?;
        }
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, s).unwrap()
    }

    #[test]
    fn test_next_reset_is_next_midnight() {
        assert_eq!(
            next_reset(at(13, 45, 0)),
            Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            next_reset(at(0, 0, 0)),
            Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_until_reset_format() {
        let left = TimeLeft::until_reset(at(20, 47, 51)).unwrap();
        assert_eq!(
            left,
            TimeLeft {
                days: 0,
                hours: 3,
                minutes: 12,
                seconds: 9
            }
        );
        assert_eq!(left.to_string(), "03:12:09");
    }

    #[test]
    fn test_multi_day_format() {
        let target = Utc.with_ymd_and_hms(2025, 3, 16, 1, 2, 3).unwrap();
        let left = TimeLeft::until(target, at(0, 0, 0)).unwrap();
        assert_eq!(left.to_string(), "2d 01:02:03");
    }

    #[test]
    fn test_past_target_is_none() {
        assert!(TimeLeft::until(at(10, 0, 0), at(10, 0, 0)).is_none());
        assert!(TimeLeft::until(at(9, 0, 0), at(10, 0, 0)).is_none());
    }
}
