//! PTP time representations.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use ravenna_core::wire::{ByteBuffer, U48};

use crate::PtpError;

pub const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// A PTP timestamp: 48-bit seconds plus 32-bit nanoseconds.
///
/// Always normalized so `nanoseconds < 10^9`; arithmetic carries into the
/// seconds field.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    seconds: u64,
    nanoseconds: u32,
}

impl Timestamp {
    /// Size on the wire in octets: 6 seconds + 4 nanoseconds, big-endian.
    pub const WIRE_SIZE: usize = 10;

    pub fn new(seconds: u64, nanoseconds: u32) -> Timestamp {
        let mut ts = Timestamp {
            seconds: seconds & U48::MAX,
            nanoseconds,
        };
        ts.normalize();
        ts
    }

    pub fn from_secs(seconds: u64) -> Timestamp {
        Timestamp::new(seconds, 0)
    }

    /// Builds a timestamp from fractional seconds, used by the local clock
    /// servo. Negative values clamp to zero.
    pub fn from_secs_f64(seconds: f64) -> Timestamp {
        if seconds <= 0.0 {
            return Timestamp::default();
        }
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * f64::from(NANOS_PER_SECOND)).round() as u32;
        Timestamp::new(whole as u64, nanos)
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn nanoseconds(&self) -> u32 {
        self.nanoseconds
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.nanoseconds) / f64::from(NANOS_PER_SECOND)
    }

    /// Total nanoseconds as a signed interval. Saturates for timestamps
    /// beyond the i64 range (about 292 years).
    pub fn to_interval(&self) -> TimeInterval {
        let total = self.seconds as i128 * NANOS_PER_SECOND as i128 + self.nanoseconds as i128;
        TimeInterval(total.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Reads a timestamp from the start of `data` in network byte order.
    pub fn parse(data: &[u8]) -> Result<Timestamp, PtpError> {
        if data.len() < Self::WIRE_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        let seconds = ravenna_core::wire::read_be::<U48>(data).to_u64();
        let nanoseconds = ravenna_core::wire::read_be::<u32>(&data[6..]);
        Ok(Timestamp::new(seconds, nanoseconds))
    }

    pub fn write_to(&self, buffer: &mut ByteBuffer) {
        buffer.put_be(U48::from_u64(self.seconds));
        buffer.put_be(self.nanoseconds);
    }

    fn normalize(&mut self) {
        if self.nanoseconds >= NANOS_PER_SECOND {
            self.seconds += u64::from(self.nanoseconds / NANOS_PER_SECOND);
            self.nanoseconds %= NANOS_PER_SECOND;
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

impl Add<TimeInterval> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TimeInterval) -> Timestamp {
        let total = self.seconds as i128 * NANOS_PER_SECOND as i128
            + self.nanoseconds as i128
            + rhs.0 as i128;
        let total = total.max(0);
        Timestamp::new(
            (total / NANOS_PER_SECOND as i128) as u64,
            (total % NANOS_PER_SECOND as i128) as u32,
        )
    }
}

impl AddAssign<TimeInterval> for Timestamp {
    fn add_assign(&mut self, rhs: TimeInterval) {
        *self = *self + rhs;
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = TimeInterval;

    fn sub(self, rhs: Timestamp) -> TimeInterval {
        TimeInterval(self.to_interval().0 - rhs.to_interval().0)
    }
}

/// A signed time interval in nanoseconds.
///
/// The PTP correction field carries scaled nanoseconds (ns * 2^16); use
/// [`TimeInterval::from_scaled_nanos`] when consuming it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeInterval(pub i64);

impl TimeInterval {
    pub const ZERO: TimeInterval = TimeInterval(0);
    pub const ONE_NANOSECOND: TimeInterval = TimeInterval(1);

    pub fn from_nanos(nanos: i64) -> TimeInterval {
        TimeInterval(nanos)
    }

    pub fn from_secs(seconds: i64) -> TimeInterval {
        TimeInterval(seconds * i64::from(NANOS_PER_SECOND))
    }

    /// Converts a wire correction field (nanoseconds * 2^16) into whole
    /// nanoseconds.
    pub fn from_scaled_nanos(scaled: i64) -> TimeInterval {
        TimeInterval(scaled >> 16)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / f64::from(NANOS_PER_SECOND)
    }

    pub fn abs(&self) -> TimeInterval {
        TimeInterval(self.0.abs())
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl Add for TimeInterval {
    type Output = TimeInterval;

    fn add(self, rhs: TimeInterval) -> TimeInterval {
        TimeInterval(self.0 + rhs.0)
    }
}

impl Sub for TimeInterval {
    type Output = TimeInterval;

    fn sub(self, rhs: TimeInterval) -> TimeInterval {
        TimeInterval(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nanoseconds_on_construction() {
        let ts = Timestamp::new(1, 1_500_000_000);
        assert_eq!(ts.seconds(), 2);
        assert_eq!(ts.nanoseconds(), 500_000_000);
    }

    #[test]
    fn one_nanosecond_carries_into_seconds() {
        let ts = Timestamp::new(5, 999_999_999) + TimeInterval::ONE_NANOSECOND;
        assert_eq!(ts.seconds(), 6);
        assert_eq!(ts.nanoseconds(), 0);

        let ts = ts + TimeInterval::ONE_NANOSECOND;
        assert_eq!(ts.seconds(), 6);
        assert_eq!(ts.nanoseconds(), 1);
    }

    #[test]
    fn subtraction_yields_signed_intervals() {
        let a = Timestamp::new(10, 0);
        let b = Timestamp::new(11, 500_000_000);
        assert_eq!(b - a, TimeInterval(1_500_000_000));
        assert_eq!(a - b, TimeInterval(-1_500_000_000));
    }

    #[test]
    fn wire_round_trip() {
        let ts = Timestamp::new(0x0102_0304_0506, 999_999_999);
        let mut buffer = ByteBuffer::new();
        ts.write_to(&mut buffer);
        assert_eq!(buffer.len(), Timestamp::WIRE_SIZE);
        assert_eq!(Timestamp::parse(buffer.as_slice()).unwrap(), ts);
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(Timestamp::parse(&[0u8; 9]), Err(PtpError::InvalidMessageLength));
    }

    #[test]
    fn scaled_correction_field_conversion() {
        assert_eq!(TimeInterval::from_scaled_nanos(100 << 16), TimeInterval(100));
        assert_eq!(TimeInterval::from_scaled_nanos(0), TimeInterval::ZERO);
    }

    #[test]
    fn fractional_seconds_round_trip() {
        let ts = Timestamp::from_secs_f64(1.5);
        assert_eq!(ts.seconds(), 1);
        assert_eq!(ts.nanoseconds(), 500_000_000);
        assert_eq!(Timestamp::from_secs_f64(-4.0), Timestamp::default());
    }
}
