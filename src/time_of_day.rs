use std::{fmt::Display, str::FromStr};

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid time value {0:?}")]
pub struct InvalidTimeValue(pub String);

/// A time of the in-game day, always in `[00:00:00, 24:00:00)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(NaiveTime::MIN);

    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, InvalidTimeValue> {
        if hour >= 24 || minute >= 60 || second >= 60 {
            return Err(InvalidTimeValue(format!("{hour}:{minute}:{second}")));
        }

        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self)
            .ok_or_else(|| InvalidTimeValue(format!("{hour}:{minute}:{second}")))
    }

    /// Wraps any signed second count into the day.
    pub fn from_seconds(seconds: i64) -> Self {
        let seconds = seconds.rem_euclid(SECONDS_PER_DAY) as u32;
        // rem_euclid keeps seconds below 86400, which is always a valid time
        Self(NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn seconds_from_midnight(&self) -> i64 {
        self.0.num_seconds_from_midnight() as i64
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn second(&self) -> u32 {
        self.0.second()
    }

    pub fn period(&self) -> TimePeriod {
        classify_time_of_day(*self)
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self::MIDNIGHT
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidTimeValue;

    /// Parses `HH:MM` or `HH:MM:SS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(|time| Self(time.with_nanosecond(0).unwrap_or(time)))
            .map_err(|_| InvalidTimeValue(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    Morning,
    Day,
    Evening,
    Night,
}

impl Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimePeriod::Morning => "morning",
            TimePeriod::Day => "day",
            TimePeriod::Evening => "evening",
            TimePeriod::Night => "night",
        };
        f.write_str(name)
    }
}

pub fn classify_time_of_day(time: TimeOfDay) -> TimePeriod {
    match time.hour() {
        6..=11 => TimePeriod::Morning,
        12..=18 => TimePeriod::Day,
        19..=21 => TimePeriod::Evening,
        _ => TimePeriod::Night,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(24, 0, 0 ; "hour out of range")]
    #[test_case(12, 60, 0 ; "minute out of range")]
    #[test_case(12, 0, 60 ; "second out of range")]
    fn rejects_out_of_range_values(hour: u32, minute: u32, second: u32) {
        assert!(TimeOfDay::new(hour, minute, second).is_err());
    }

    #[test_case(0, "00:00:00" ; "zero")]
    #[test_case(86_399, "23:59:59" ; "last second")]
    #[test_case(86_400, "00:00:00" ; "wraps a full day")]
    #[test_case(-1, "23:59:59" ; "negative wraps backwards")]
    #[test_case(-86_401, "23:59:59" ; "negative more than a day")]
    fn from_seconds_wraps(seconds: i64, expected: &str) {
        assert_eq!(TimeOfDay::from_seconds(seconds).to_string(), expected);
    }

    #[test_case("07:30", 7, 30, 0 ; "hours and minutes")]
    #[test_case("23:05:09", 23, 5, 9 ; "with seconds")]
    #[test_case(" 00:00 ", 0, 0, 0 ; "surrounding whitespace")]
    fn parses(input: &str, hour: u32, minute: u32, second: u32) {
        let time: TimeOfDay = input.parse().unwrap();
        assert_eq!((time.hour(), time.minute(), time.second()), (hour, minute, second));
    }

    #[test_case("24:00" ; "hour 24")]
    #[test_case("12:61" ; "minute 61")]
    #[test_case("noon" ; "not a time")]
    #[test_case("" ; "empty")]
    fn rejects_malformed_input(input: &str) {
        assert!(input.parse::<TimeOfDay>().is_err());
    }

    #[test_case(0, TimePeriod::Night)]
    #[test_case(5, TimePeriod::Night)]
    #[test_case(6, TimePeriod::Morning)]
    #[test_case(11, TimePeriod::Morning)]
    #[test_case(12, TimePeriod::Day)]
    #[test_case(18, TimePeriod::Day)]
    #[test_case(19, TimePeriod::Evening)]
    #[test_case(21, TimePeriod::Evening)]
    #[test_case(22, TimePeriod::Night)]
    #[test_case(23, TimePeriod::Night)]
    fn classifies_hours(hour: u32, expected: TimePeriod) {
        let time = TimeOfDay::new(hour, 59, 59).unwrap();
        assert_eq!(classify_time_of_day(time), expected);
    }
}
