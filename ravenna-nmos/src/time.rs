use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A TAI timestamp: seconds and nanoseconds, rendered as
/// `"<seconds>:<nanoseconds>"`.
///
/// Resource versions are the same shape; every mutation must produce a
/// strictly greater version, hence [`Timestamp::inc`] and
/// [`Timestamp::update`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanoseconds: u32,
}

/// An NMOS resource version is a TAI timestamp.
pub type Version = Timestamp;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid nmos timestamp")]
pub struct ParseTimestampError;

impl Timestamp {
    /// Nanoseconds must be below one billion.
    pub fn new(seconds: u64, nanoseconds: u32) -> Timestamp {
        debug_assert!(nanoseconds < 1_000_000_000);
        Timestamp { seconds, nanoseconds }
    }

    pub fn from_ptp(timestamp: ravenna_ptp::time::Timestamp) -> Timestamp {
        Timestamp { seconds: timestamp.seconds(), nanoseconds: timestamp.nanoseconds() }
    }

    /// Advances by one nanosecond, carrying into the seconds.
    pub fn inc(&mut self) {
        if self.nanoseconds < 999_999_999 {
            self.nanoseconds += 1;
        } else {
            self.nanoseconds = 0;
            self.seconds += 1;
        }
    }

    /// Takes the given time if it is newer, otherwise increments; the
    /// result is always strictly greater than before.
    pub fn update(&mut self, timestamp: Timestamp) {
        if timestamp > *self {
            *self = timestamp;
        } else {
            self.inc();
        }
    }

    /// Zero is the never-set sentinel.
    pub fn is_valid(&self) -> bool {
        self.seconds != 0 || self.nanoseconds != 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanoseconds)
    }
}

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    /// Strict parse: no whitespace, exactly `<seconds>:<nanoseconds>`.
    fn from_str(input: &str) -> Result<Timestamp, ParseTimestampError> {
        let (seconds, nanoseconds) = input.split_once(':').ok_or(ParseTimestampError)?;

        if seconds.is_empty()
            || nanoseconds.is_empty()
            || !seconds.bytes().all(|b| b.is_ascii_digit())
            || !nanoseconds.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseTimestampError);
        }

        let nanoseconds: u32 = nanoseconds.parse().map_err(|_| ParseTimestampError)?;
        if nanoseconds >= 1_000_000_000 {
            return Err(ParseTimestampError);
        }

        Ok(Timestamp {
            seconds: seconds.parse().map_err(|_| ParseTimestampError)?,
            nanoseconds,
        })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Timestamp::new(1, 0) < Timestamp::new(2, 0));
        assert!(Timestamp::new(1, 5) < Timestamp::new(1, 6));
        assert!(Timestamp::new(2, 0) > Timestamp::new(1, 999_999_999));
    }

    #[test]
    fn inc_carries_into_seconds() {
        let mut ts = Timestamp::new(1, 999_999_999);
        ts.inc();
        assert_eq!(ts, Timestamp::new(2, 0));
        ts.inc();
        assert_eq!(ts, Timestamp::new(2, 1));
    }

    #[test]
    fn update_takes_the_larger_else_increments() {
        let mut version = Timestamp::new(10, 0);
        version.update(Timestamp::new(11, 0));
        assert_eq!(version, Timestamp::new(11, 0));

        // stale input still moves the version forward
        version.update(Timestamp::new(5, 0));
        assert_eq!(version, Timestamp::new(11, 1));
    }

    #[test]
    fn string_form_round_trips() {
        let ts = Timestamp::new(1441973902, 829000000);
        assert_eq!(ts.to_string(), "1441973902:829000000");
        assert_eq!("1441973902:829000000".parse::<Timestamp>().unwrap(), ts);
    }

    #[test]
    fn strict_parsing_rejects_whitespace_and_junk() {
        assert!(" 1:2".parse::<Timestamp>().is_err());
        assert!("1:2 ".parse::<Timestamp>().is_err());
        assert!("1".parse::<Timestamp>().is_err());
        assert!("1:".parse::<Timestamp>().is_err());
        assert!(":2".parse::<Timestamp>().is_err());
        assert!("1:-2".parse::<Timestamp>().is_err());
        assert!("1:2000000000".parse::<Timestamp>().is_err());
    }

    #[test]
    fn zero_is_invalid() {
        assert!(!Timestamp::default().is_valid());
        assert!(Timestamp::new(0, 1).is_valid());
    }
}
