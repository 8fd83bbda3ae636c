//! Parses the free-form duration/count strings used in a job's repeat
//! window ("30min", "2h", "5次"/"5t" for a bare repeat count).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepeatWindow {
    /// A fixed number of repeats, no time bound.
    Count(u32),
    /// Keep repeating for this long.
    Duration(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty repeat window string")]
    Empty,
    #[error("invalid format: {0:?}")]
    InvalidFormat(String),
    #[error("unknown unit: {0:?}")]
    UnknownUnit(String),
}

const UNIT_TABLE: &[(&str, f64)] = &[
    ("周", 604800.0),
    ("week", 604800.0),
    ("w", 604800.0),
    ("天", 86400.0),
    ("day", 86400.0),
    ("d", 86400.0),
    ("小时", 3600.0),
    ("时", 3600.0),
    ("hour", 3600.0),
    ("hr", 3600.0),
    ("h", 3600.0),
    ("分钟", 60.0),
    ("分", 60.0),
    ("minute", 60.0),
    ("min", 60.0),
    ("m", 60.0),
    ("秒", 1.0),
    ("second", 1.0),
    ("sec", 1.0),
    ("s", 1.0),
];

/// Parses either a bare repeat count ("5", "5次", "5t") or a duration
/// ("30min", "1.5h"). Bare counts return [`RepeatWindow::Count`].
pub fn parse_repeat_window(input: &str) -> Result<RepeatWindow, ParseError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let stripped: String = raw
        .replace("次", "")
        .replace("times", "")
        .replace('t', "")
        .trim()
        .to_string();
    if let Ok(n) = stripped.parse::<u32>() {
        return Ok(RepeatWindow::Count(n));
    }

    let mut total_secs = 0.0;
    let mut rest = raw;
    while !rest.is_empty() {
        let digit_end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if digit_end == 0 {
            return Err(ParseError::InvalidFormat(rest.to_string()));
        }
        let value: f64 = rest[..digit_end]
            .parse()
            .map_err(|_| ParseError::InvalidFormat(rest[..digit_end].to_string()))?;
        rest = rest[digit_end..].trim_start();

        let unit_end = rest
            .char_indices()
            .find(|(_, c)| c.is_whitespace() || c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let unit_str = &rest[..unit_end];
        rest = rest[unit_end..].trim_start();

        let unit_secs = UNIT_TABLE
            .iter()
            .find(|(suffix, _)| unit_str.starts_with(suffix))
            .map(|(_, secs)| *secs)
            .ok_or_else(|| ParseError::UnknownUnit(unit_str.to_string()))?;
        total_secs += value * unit_secs;
    }

    Ok(RepeatWindow::Duration(Duration::from_secs_f64(total_secs.max(0.0))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_is_a_repeat_count() {
        assert_eq!(parse_repeat_window("5").unwrap(), RepeatWindow::Count(5));
        assert_eq!(parse_repeat_window("5次").unwrap(), RepeatWindow::Count(5));
    }

    #[test]
    fn minutes_parse_to_a_duration() {
        match parse_repeat_window("30min").unwrap() {
            RepeatWindow::Duration(d) => assert_eq!(d.as_secs(), 1800),
            other => panic!("expected Duration, got {other:?}"),
        }
    }

    #[test]
    fn sub_second_durations_still_round() {
        match parse_repeat_window("0.5s").unwrap() {
            RepeatWindow::Duration(d) => assert!((d.as_secs_f64() - 0.5).abs() < 1e-6),
            other => panic!("expected Duration, got {other:?}"),
        }
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(parse_repeat_window("5zz").is_err());
    }
}
