//! Go-format duration parsing and session-persistence timeout normalization.

use std::{fmt, str::FromStr, time::Duration};

/// A duration in Go's `time.Duration` string format, as it appears on
/// session-persistence timeouts.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct GoDuration {
    duration: Duration,
    is_negative: bool,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

/// Upper bound on a persistence timeout, in minutes (ten days).
pub const MAX_PERSISTENCE_MINUTES: u32 = 14_400;

impl From<Duration> for GoDuration {
    fn from(duration: Duration) -> Self {
        Self {
            duration,
            is_negative: false,
        }
    }
}

impl From<GoDuration> for Duration {
    fn from(GoDuration { duration, .. }: GoDuration) -> Self {
        duration
    }
}

impl GoDuration {
    #[inline]
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.is_negative
    }
}

impl fmt::Debug for GoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::fmt::Write;
        if self.is_negative {
            f.write_char('-')?;
        }
        fmt::Debug::fmt(&self.duration, f)
    }
}

impl FromStr for GoDuration {
    type Err = ParseError;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        // implements the same format as
        // https://cs.opensource.google/go/go/+/refs/tags/go1.20.4:src/time/format.go;l=1589

        fn duration_from_units(val: f64, unit: &str) -> Result<Duration, ParseError> {
            const MINUTE: Duration = Duration::from_secs(60);
            let base = match unit {
                "ns" => Duration::from_nanos(1),
                // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
                "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => MINUTE,
                "h" => MINUTE * 60,
                _ => return Err(ParseError::InvalidUnit),
            };
            Ok(base.mul_f64(val))
        }

        // Go durations are signed. Rust durations aren't.
        let is_negative = s.starts_with('-');
        s = s.trim_start_matches('+').trim_start_matches('-');

        let mut total = Duration::from_secs(0);
        while !s.is_empty() {
            if let Some(unit_start) = s.find(|c: char| c.is_alphabetic()) {
                let (val, rest) = s.split_at(unit_start);
                let val = val.parse::<f64>()?;
                let unit = if let Some(next_numeric_start) = rest.find(|c: char| !c.is_alphabetic())
                {
                    let (unit, rest) = rest.split_at(next_numeric_start);
                    s = rest;
                    unit
                } else {
                    s = "";
                    rest
                };
                total += duration_from_units(val, unit)?;
            } else if s == "0" {
                return Ok(GoDuration {
                    duration: Duration::from_secs(0),
                    is_negative,
                });
            } else {
                return Err(ParseError::NoUnit);
            }
        }

        Ok(GoDuration {
            duration: total,
            is_negative,
        })
    }
}

/// Normalizes a persistence timeout string to whole minutes.
///
/// Sub-minute values round up to 1; anything above [`MAX_PERSISTENCE_MINUTES`]
/// clamps. Zero, negative and unparsable values all collapse to the 0
/// sentinel ("no timeout"), with a warning for the unparsable case.
pub fn persistence_minutes(timeout: &str) -> u32 {
    let parsed = match timeout.parse::<GoDuration>() {
        Ok(d) => d,
        Err(error) => {
            tracing::warn!(%timeout, %error, "Ignoring unparsable persistence timeout");
            return 0;
        }
    };
    if parsed.is_negative() {
        return 0;
    }
    let secs = Duration::from(parsed).as_secs();
    if secs == 0 {
        return 0;
    }
    let minutes = secs.div_ceil(60);
    minutes.min(u64::from(MAX_PERSISTENCE_MINUTES)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_same_as_go() {
        const MINUTE: Duration = Duration::from_secs(60);
        const HOUR: Duration = Duration::from_secs(60 * 60);
        // from Go:
        // https://cs.opensource.google/go/go/+/refs/tags/go1.20.4:src/time/time_test.go;l=891-951
        let cases: &[(&str, GoDuration)] = &[
            ("0", Duration::from_secs(0).into()),
            ("5s", Duration::from_secs(5).into()),
            ("30s", Duration::from_secs(30).into()),
            ("1478s", Duration::from_secs(1478).into()),
            (
                "-5s",
                GoDuration {
                    duration: Duration::from_secs(5),
                    is_negative: true,
                },
            ),
            ("+5s", Duration::from_secs(5).into()),
            (
                "5.6s",
                (Duration::from_secs(5) + Duration::from_millis(600)).into(),
            ),
            (".5s", Duration::from_millis(500).into()),
            ("13ms", Duration::from_millis(13).into()),
            ("15m", (15 * MINUTE).into()),
            ("16h", (16 * HOUR).into()),
            ("3h30m", (3 * HOUR + 30 * MINUTE).into()),
            (
                "-2m3.4s",
                GoDuration {
                    duration: 2 * MINUTE + Duration::from_secs(3) + Duration::from_millis(400),
                    is_negative: true,
                },
            ),
            ("0.3333333333333333333h", (20 * MINUTE).into()),
        ];

        for (input, expected) in cases {
            let parsed = dbg!(input).parse::<GoDuration>().unwrap();
            assert_eq!(&dbg!(parsed), expected);
        }
    }

    #[test]
    fn normalizes_to_whole_minutes() {
        // sub-minute rounds up, minutes pass through, hours convert
        assert_eq!(persistence_minutes("30s"), 1);
        assert_eq!(persistence_minutes("90s"), 2);
        assert_eq!(persistence_minutes("15m"), 15);
        assert_eq!(persistence_minutes("2h"), 120);
    }

    #[test]
    fn clamps_to_maximum() {
        assert_eq!(persistence_minutes("20000m"), MAX_PERSISTENCE_MINUTES);
        assert_eq!(persistence_minutes("400h"), MAX_PERSISTENCE_MINUTES);
    }

    #[test]
    fn degenerate_timeouts_become_zero() {
        assert_eq!(persistence_minutes("0s"), 0);
        assert_eq!(persistence_minutes("-5m"), 0);
        assert_eq!(persistence_minutes("tomorrow"), 0);
        assert_eq!(persistence_minutes(""), 0);
    }
}
