//! Window and slide durations
//!
//! Feature configurations express windows as `<positive integer><unit>`:
//!
//! | Unit | Meaning |
//! |------|---------|
//! | `a` / `ms` | milliseconds |
//! | `s` | seconds |
//! | `m` | minutes |
//! | `h` | hours |
//! | `d` | days |
//! | `w` | weeks |
//!
//! Durations are stored as milliseconds and always rendered in the largest
//! unit that divides them exactly, so `60m` and `1h` print identically.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const UNITS: [(&str, u64); 6] = [
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("a", 1),
];

/// A positive, millisecond-resolution duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowDuration {
    millis: u64,
}

impl WindowDuration {
    pub fn from_millis(millis: u64) -> Option<Self> {
        (millis > 0).then_some(Self { millis })
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }
}

impl fmt::Display for WindowDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, factor) in UNITS {
            if self.millis % factor == 0 {
                return write!(f, "{}{}", self.millis / factor, unit);
            }
        }
        write!(f, "{}a", self.millis)
    }
}

impl FromStr for WindowDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| "missing unit (expected one of a, s, m, h, d, w)".to_string())?;
        let (digits, unit) = s.split_at(split);

        if digits.is_empty() {
            return Err("missing numeric value".to_string());
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("'{}' is not a valid number", digits))?;

        let unit = if unit == "ms" { "a" } else { unit };
        let factor = UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, f)| *f)
            .ok_or_else(|| format!("unknown unit '{}'", unit))?;

        let millis = value
            .checked_mul(factor)
            .ok_or_else(|| "duration overflows".to_string())?;
        WindowDuration::from_millis(millis).ok_or_else(|| "duration must be positive".to_string())
    }
}

impl Serialize for WindowDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for WindowDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("1h".parse::<WindowDuration>().unwrap().as_millis(), 3_600_000);
        assert_eq!("10m".parse::<WindowDuration>().unwrap().as_millis(), 600_000);
        assert_eq!("30s".parse::<WindowDuration>().unwrap().as_millis(), 30_000);
        assert_eq!("250ms".parse::<WindowDuration>().unwrap().as_millis(), 250);
        assert_eq!("2w".parse::<WindowDuration>().unwrap().as_millis(), 1_209_600_000);
    }

    #[test]
    fn test_normalized_display() {
        let d: WindowDuration = "60m".parse().unwrap();
        assert_eq!(d.to_string(), "1h");
        let d: WindowDuration = "90s".parse().unwrap();
        assert_eq!(d.to_string(), "90s");
        let d: WindowDuration = "1500ms".parse().unwrap();
        assert_eq!(d.to_string(), "1500a");
    }

    #[test]
    fn test_rejects_bad_input() {
        for raw in ["", "h", "10", "0m", "-1h", "1y", "1.5h", "99999999999999999999w"] {
            assert!(raw.parse::<WindowDuration>().is_err(), "{} should fail", raw);
        }
    }
}
