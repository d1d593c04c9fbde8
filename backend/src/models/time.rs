//! Time-of-day and time-window types.
//!
//! All engine arithmetic happens in whole minutes since the start of the
//! scheduling day. `TimeOfDay` only enforces the `00:00..=23:59` range when
//! it is parsed from text; values produced by arithmetic (e.g. a service that
//! runs past midnight) may exceed 24h and render as `24:30`, `25:00`, ...

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MINUTES_PER_HOUR: u32 = 60;

/// Errors produced while parsing `H:MM` / `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("time is empty")]
    Empty,
    #[error("invalid time format '{0}', expected HH:MM")]
    Format(String),
    #[error("hour out of range in '{0}' (0-23)")]
    HourOutOfRange(String),
    #[error("minute out of range in '{0}' (0-59)")]
    MinuteOutOfRange(String),
}

/// Minutes since midnight of the scheduling day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);

    pub fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self(hour * MINUTES_PER_HOUR + minute))
    }

    /// Parses `H:MM` or `HH:MM`. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TimeParseError::Empty);
        }

        let (hour, minute) = trimmed
            .split_once(':')
            .ok_or_else(|| TimeParseError::Format(trimmed.to_string()))?;

        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !(1..=2).contains(&hour.len()) || minute.len() != 2 || !digits(hour) || !digits(minute) {
            return Err(TimeParseError::Format(trimmed.to_string()));
        }

        let hour: u32 = hour
            .parse()
            .map_err(|_| TimeParseError::Format(trimmed.to_string()))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| TimeParseError::Format(trimmed.to_string()))?;

        if hour > 23 {
            return Err(TimeParseError::HourOutOfRange(trimmed.to_string()));
        }
        if minute > 59 {
            return Err(TimeParseError::MinuteOutOfRange(trimmed.to_string()));
        }

        Ok(Self(hour * MINUTES_PER_HOUR + minute))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / MINUTES_PER_HOUR
    }

    pub fn minute(&self) -> u32 {
        self.0 % MINUTES_PER_HOUR
    }

    pub fn plus_minutes(&self, minutes: u32) -> Self {
        Self(self.0.saturating_add(minutes))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeOfDay::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Service window `[start, end]` for a job or a shift.
///
/// A job's arrival (service start) must fall inside the closed interval; the
/// service itself may run past `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowRepr")]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

#[derive(Deserialize)]
struct WindowRepr {
    start: TimeOfDay,
    end: TimeOfDay,
}

impl TryFrom<WindowRepr> for TimeWindow {
    type Error = InvertedWindow;

    fn try_from(repr: WindowRepr) -> Result<Self, Self::Error> {
        TimeWindow::new(repr.start, repr.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("window start {start} must be before end {end}")]
pub struct InvertedWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, InvertedWindow> {
        if start >= end {
            return Err(InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn length_minutes(&self) -> u32 {
        self.end.minutes() - self.start.minutes()
    }

    pub fn contains(&self, t: TimeOfDay) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
