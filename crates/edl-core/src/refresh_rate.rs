use crate::error::{EdlError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const MINUTE_SECS: u64 = 60;
const HOUR_SECS: u64 = 60 * MINUTE_SECS;
const DAY_SECS: u64 = 24 * HOUR_SECS;

/// Time unit accepted in a cache refresh rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshUnit {
    Minute,
    Hour,
    Day,
    /// Counted as 30 days.
    Month,
    /// Counted as 365 days.
    Year,
}

impl RefreshUnit {
    pub fn seconds(self) -> u64 {
        match self {
            RefreshUnit::Minute => MINUTE_SECS,
            RefreshUnit::Hour => HOUR_SECS,
            RefreshUnit::Day => DAY_SECS,
            RefreshUnit::Month => 30 * DAY_SECS,
            RefreshUnit::Year => 365 * DAY_SECS,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "minute" | "minutes" => Some(RefreshUnit::Minute),
            "hour" | "hours" => Some(RefreshUnit::Hour),
            "day" | "days" => Some(RefreshUnit::Day),
            "month" | "months" => Some(RefreshUnit::Month),
            "year" | "years" => Some(RefreshUnit::Year),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            RefreshUnit::Minute => "minute",
            RefreshUnit::Hour => "hour",
            RefreshUnit::Day => "day",
            RefreshUnit::Month => "month",
            RefreshUnit::Year => "year",
        }
    }
}

/// How long a built cache stays valid, written as `"<N> <unit>"`
/// (e.g. `"5 minutes"`, `"1 day"`): one space, digits only, lowercase unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshRate {
    pub amount: u64,
    pub unit: RefreshUnit,
}

impl RefreshRate {
    pub fn new(amount: u64, unit: RefreshUnit) -> Result<Self> {
        if amount == 0 {
            return Err(EdlError::Configuration(
                "Cache Refresh Rate amount must be a positive integer".into(),
            ));
        }
        Ok(Self { amount, unit })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.amount.saturating_mul(self.unit.seconds()))
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.as_duration().as_secs()).unwrap_or(i64::MAX))
    }
}

impl Default for RefreshRate {
    fn default() -> Self {
        Self {
            amount: 5,
            unit: RefreshUnit::Minute,
        }
    }
}

impl FromStr for RefreshRate {
    type Err = EdlError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(' ').collect();
        if parts.len() != 2 {
            return Err(EdlError::Configuration(
                "Cache Refresh Rate must be \"number date_range_unit\", examples: \
                 (2 hours, 4 minutes, 6 months, 1 day, etc.)"
                    .into(),
            ));
        }

        let unit = RefreshUnit::parse(parts[1]).ok_or_else(|| {
            EdlError::Configuration(
                "Cache Refresh Rate time unit is invalid. Must be minutes, hours, days, months or years"
                    .into(),
            )
        })?;

        let digits = !parts[0].is_empty() && parts[0].bytes().all(|b| b.is_ascii_digit());
        let amount = digits.then(|| parts[0].parse::<u64>().ok()).flatten().ok_or_else(|| {
            EdlError::Configuration(format!(
                "Cache Refresh Rate amount must be a positive integer, got \"{}\"",
                parts[0]
            ))
        })?;

        RefreshRate::new(amount, unit)
    }
}

impl fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.amount, self.unit.name(), plural)
    }
}
