//! Parser for interval durations written as `[DD] [HH:[MM:]]ss[.uuuuuu]`.
//!
//! Accepted examples: `30`, `1:30`, `2:00:00`, `14 00:00:00`,
//! `1 day, 2:00:00`, `7 days, 0:00:00`, `3 12:00:00.5`. A fraction takes
//! up to twelve digits and is dropped since intervals are stored in whole
//! seconds. Durations longer than 999999999 days are refused.

use chrono::TimeDelta;

use crate::{EngineError, ResultEngine};

const MAX_FRACTION_DIGITS: usize = 12;

/// 999999999 days, 23:59:59.
const MAX_SECONDS: i64 = 999_999_999 * 86_400 + 86_399;

/// Parse a duration and require it to be strictly positive.
pub fn parse_duration(raw: &str) -> ResultEngine<TimeDelta> {
    let invalid = || EngineError::InvalidDuration(raw.to_string());
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (days, clock) = match trimmed.split_once(' ') {
        Some((days, rest)) => {
            let rest = rest.trim_start();
            let rest = rest
                .strip_prefix("days,")
                .or_else(|| rest.strip_prefix("day,"))
                .unwrap_or(rest)
                .trim_start();
            (parse_number(days).ok_or_else(invalid)?, rest)
        }
        None => (0, trimmed),
    };

    let (clock, fraction) = match clock.split_once(['.', ',']) {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (clock, None),
    };
    if let Some(fraction) = fraction
        && (fraction.is_empty()
            || fraction.len() > MAX_FRACTION_DIGITS
            || !fraction.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid());
    }

    let parts = clock
        .split(':')
        .map(parse_number)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [seconds] => (0, 0, *seconds),
        [minutes, seconds] => (0, *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return Err(invalid()),
    };

    let total = days
        .checked_mul(86_400)
        .and_then(|d| d.checked_add(hours.checked_mul(3_600)?))
        .and_then(|t| t.checked_add(minutes.checked_mul(60)?))
        .and_then(|t| t.checked_add(seconds))
        .ok_or_else(invalid)?;
    if total <= 0 || total > MAX_SECONDS {
        return Err(invalid());
    }

    TimeDelta::try_seconds(total).ok_or_else(invalid)
}

fn parse_number(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(raw: &str) -> i64 {
        parse_duration(raw).map(|d| d.num_seconds()).unwrap_or(-1)
    }

    #[test]
    fn clock_forms() {
        assert_eq!(seconds("30"), 30);
        assert_eq!(seconds("1:30"), 90);
        assert_eq!(seconds("2:00:00"), 7200);
    }

    #[test]
    fn day_prefix_forms() {
        assert_eq!(seconds("14 00:00:00"), 14 * 86_400);
        assert_eq!(seconds("1 day, 2:00:00"), 86_400 + 7200);
        assert_eq!(seconds("7 days, 0:00:00"), 7 * 86_400);
    }

    #[test]
    fn fraction_is_truncated() {
        assert_eq!(seconds("3 12:00:00.5"), 3 * 86_400 + 12 * 3600);
        assert_eq!(seconds("10.999999"), 10);
        assert_eq!(seconds("10.1234567"), 10);
        assert_eq!(seconds("10.123456789012"), 10);
        assert!(parse_duration("10.1234567890123").is_err());
    }

    #[test]
    fn rejects_garbage_and_non_positive() {
        for raw in ["", "abc", "1:2:3:4", "-5", "0", "0:00:00", "1 x:00", "1:", "5."] {
            assert!(parse_duration(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn longest_duration_is_999999999_days() {
        assert_eq!(seconds("999999999 23:59:59"), MAX_SECONDS);
        assert!(parse_duration("1000000000 00:00:00").is_err());
        assert!(parse_duration("999999999 23:59:60").is_err());
        assert!(parse_duration("99999999999999999").is_err());
    }
}
