//! Go-style duration strings ("7s", "3m", "1m30s", "250ms").
//!
//! Converge settings are written the way the orchestrator's own tooling writes
//! them, so both parsing and formatting follow that syntax: a sequence of
//! decimal numbers, each with an optional fraction and a mandatory unit
//! (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare `0` is accepted.

use std::time::Duration;

use crate::error::Error;
use crate::result::Result;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Nanoseconds per unit, or `None` for an unknown unit.
fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a Go-style duration string.
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`] for empty input, a missing or unknown
/// unit, a malformed number, or a value that overflows [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::invalid_duration(input, "empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let overflow = || Error::invalid_duration(input, "duration out of range");
    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let int_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_num) = match after_int.strip_prefix('.') {
            Some(tail) => {
                let len = tail
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(tail.len());
                tail.split_at(len)
            }
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::invalid_duration(input, "expected a number"));
        }

        let unit_len = after_num
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_num.len());
        let (unit, tail) = after_num.split_at(unit_len);
        if unit.is_empty() {
            return Err(Error::invalid_duration(input, "missing unit"));
        }
        let scale = unit_nanos(unit)
            .ok_or_else(|| Error::invalid_duration(input, format!("unknown unit '{unit}'")))?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Digits past nanosecond precision are dropped.
        let mut frac_value: u128 = 0;
        let mut divisor: u128 = 1;
        for digit in frac_part.chars().take(18).filter_map(|c| c.to_digit(10)) {
            frac_value = frac_value
                .saturating_mul(10)
                .saturating_add(u128::from(digit));
            divisor = divisor.saturating_mul(10);
        }
        if frac_value > 0 {
            let frac_nanos = frac_value
                .checked_mul(scale)
                .and_then(|n| n.checked_div(divisor))
                .ok_or_else(overflow)?;
            value = value.checked_add(frac_nanos).ok_or_else(overflow)?;
        }

        total = total.checked_add(value).ok_or_else(overflow)?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| overflow())?;
    let nanos = u32::try_from(total % NANOS_PER_SEC).map_err(|_| overflow())?;
    Ok(Duration::new(secs, nanos))
}

/// Format a duration the way Go prints it: `0s`, `250ms`, `7s`, `3m0s`,
/// `1h2m3.5s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if duration < Duration::from_secs(1) {
        return if nanos < 1_000 {
            format!("{nanos}ns")
        } else if nanos < 1_000_000 {
            with_fraction(nanos, 1_000, "µs")
        } else {
            with_fraction(nanos, 1_000_000, "ms")
        };
    }

    let secs = duration.as_secs();
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = u128::from(secs % 60)
        .saturating_mul(NANOS_PER_SEC)
        .saturating_add(u128::from(duration.subsec_nanos()));
    let seconds = with_fraction(seconds, NANOS_PER_SEC, "s");

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}")
    } else {
        seconds
    }
}

fn with_fraction(value: u128, per_unit: u128, unit: &str) -> String {
    let whole = value / per_unit;
    let frac = value % per_unit;
    if frac == 0 {
        return format!("{whole}{unit}");
    }
    let width = per_unit.to_string().len().saturating_sub(1);
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}{unit}", digits.trim_end_matches('0'))
}

/// Serde adapter for `Duration` fields written as Go-style strings.
///
/// Use with `#[serde(with = "swarmwait_core::duration::go_format")]`.
pub mod go_format {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
