// Copyright © 2024 Pathway

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{Error, Result};

#[derive(
    Default, Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Milliseconds since the unix epoch.
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Timestamp {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A non-empty, half-open interval `[start, end)` of timestamps.
///
/// The state of a store "as of" a span is the state at `end`, i.e. with
/// every delta whose timestamp is contained in the span already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSpan")]
pub struct TimeSpan {
    start: Timestamp,
    end: Timestamp,
}

#[derive(Deserialize)]
struct RawTimeSpan {
    start: Timestamp,
    end: Timestamp,
}

impl TryFrom<RawTimeSpan> for TimeSpan {
    type Error = Error;

    fn try_from(raw: RawTimeSpan) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeSpan {
    pub fn new(start: impl Into<Timestamp>, end: impl Into<Timestamp>) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if start >= end {
            return Err(Error::EmptyTimeSpan { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    /// The span starting where this one ends, of the same length.
    pub fn next(&self) -> Option<Self> {
        let length = self.end.0 - self.start.0;
        let end = self.end.0.checked_add(length)?;
        Some(Self {
            start: self.end,
            end: Timestamp(end),
        })
    }
}

impl Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
