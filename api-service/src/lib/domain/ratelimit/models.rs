use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::ratelimit::errors::RateLimitError;

/// A ceiling of `max_requests` per fixed `window`.
///
/// Parsed from human-readable definitions such as `"200 per day"`,
/// `"10 per 5 minutes"` or `"5/minute"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimit {
    pub max_requests: u64,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u64, window: Duration) -> Result<Self, RateLimitError> {
        if max_requests == 0 || window.as_secs() == 0 {
            return Err(RateLimitError::InvalidLimit(format!(
                "{} per {:?}",
                max_requests, window
            )));
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    pub fn per_minute(max_requests: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    fn unit_seconds(unit: &str) -> Option<u64> {
        let unit = unit.strip_suffix('s').unwrap_or(unit);
        match unit {
            "second" | "sec" => Some(1),
            "minute" | "min" => Some(60),
            "hour" => Some(60 * 60),
            "day" => Some(24 * 60 * 60),
            _ => None,
        }
    }

    /// Parse every definition in `definitions`, failing on the first invalid one.
    pub fn parse_all<S: AsRef<str>>(definitions: &[S]) -> Result<Vec<Self>, RateLimitError> {
        definitions.iter().map(|definition| definition.as_ref().parse()).collect()
    }
}

impl FromStr for RateLimit {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RateLimitError::InvalidLimit(s.to_string());
        let normalized = s.trim().to_ascii_lowercase();

        let (count, period) = match normalized.split_once('/') {
            Some((count, period)) => (count.trim(), period.trim()),
            None => {
                let (count, period) = normalized.split_once(" per ").ok_or_else(invalid)?;
                (count.trim(), period.trim())
            }
        };

        let max_requests: u64 = count.parse().map_err(|_| invalid())?;

        let mut parts = period.split_whitespace();
        let (multiplier, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(multiplier), Some(unit), None) => {
                (multiplier.parse::<u64>().map_err(|_| invalid())?, unit)
            }
            _ => return Err(invalid()),
        };

        let seconds = Self::unit_seconds(unit).ok_or_else(invalid)?;
        let window = multiplier.checked_mul(seconds).ok_or_else(invalid)?;

        Self::new(max_requests, Duration::from_secs(window)).map_err(|_| invalid())
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();
        let (amount, unit) = [(86_400, "day"), (3_600, "hour"), (60, "minute")]
            .into_iter()
            .find(|(unit_secs, _)| secs % unit_secs == 0)
            .map(|(unit_secs, unit)| (secs / unit_secs, unit))
            .unwrap_or((secs, "second"));

        if amount == 1 {
            write!(f, "{} per {}", self.max_requests, unit)
        } else {
            write!(f, "{} per {} {}s", self.max_requests, amount, unit)
        }
    }
}

/// What to do when the counter backend errors mid-request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request and log a warning.
    #[default]
    FailOpen,
    /// Refuse the request.
    FailClosed,
}
