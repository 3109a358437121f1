//! Poll cadence: fixed intervals or cron wall-clock slots.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use cron::Schedule;

use crate::error::CadenceError;

/// When the next cycle runs, measured from the end of the previous one.
#[derive(Debug, Clone)]
pub enum PollCadence {
    Interval(Duration),
    /// Cron slots evaluated in the configured local offset.
    Cron { expression: String, schedule: Schedule },
}

impl PollCadence {
    /// The first run strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>, offset: &FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(interval) => {
                let step = chrono::Duration::from_std(*interval).ok()?;
                now.checked_add_signed(step)
            }
            Self::Cron { schedule, .. } => schedule
                .after(&now.with_timezone(offset))
                .next()
                .map(|next| next.with_timezone(&Utc)),
        }
    }
}

impl FromStr for PollCadence {
    type Err = CadenceError;

    /// Duration text (`10m`, `1h30m`, `600`) first, then 5- or 6-field cron.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CadenceError::Empty);
        }

        if let Some(interval) = parse_duration(trimmed) {
            if interval.is_zero() {
                return Err(CadenceError::ZeroInterval);
            }
            return Ok(Self::Interval(interval));
        }

        let expression = normalize_cron(trimmed);
        let schedule = Schedule::from_str(&expression).map_err(|e| CadenceError::Invalid {
            input: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::Cron {
            expression,
            schedule,
        })
    }
}

impl fmt::Display for PollCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval(d) => write!(f, "every {}s", d.as_secs()),
            Self::Cron { expression, .. } => write!(f, "cron '{expression}'"),
        }
    }
}

/// Prepend a seconds field to 5-field cron expressions.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse `Xd`, `Xh`, `Xm`, `Xs` components (combinable, e.g. `1h30m`).
///
/// A bare number is seconds. Returns `None` for anything else.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: u64 = 0;
    let mut digits = String::new();
    let mut saw_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let n: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match ch {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
        saw_unit = true;
    }

    if !digits.is_empty() {
        // "30m15" is ambiguous.
        if saw_unit {
            return None;
        }
        total_secs = digits.parse().ok()?;
    }

    Some(Duration::from_secs(total_secs))
}

/// The next local midnight strictly after `now`.
pub fn next_local_midnight(now: DateTime<Utc>, offset: &FixedOffset) -> DateTime<Utc> {
    let local_date = now.with_timezone(offset).date_naive();
    local_date
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}
