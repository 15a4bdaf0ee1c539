//! Identifier and quality types shared across the PTP stack.

use std::fmt;

use ravenna_core::util::MacAddress;
use ravenna_core::wire::ByteBuffer;

use crate::PtpError;

/// An eight-octet clock identity.
///
/// Derived from a MAC address by splicing `0xFFFE` between octets 3 and 4
/// (the EUI-64 mapping). All-zero identities are invalid.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    pub const WIRE_SIZE: usize = 8;

    pub fn from_mac(mac: MacAddress) -> ClockIdentity {
        let m = mac.bytes();
        ClockIdentity([m[0], m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5]])
    }

    pub fn parse(data: &[u8]) -> Result<ClockIdentity, PtpError> {
        let bytes: [u8; 8] = data
            .get(..8)
            .and_then(|d| d.try_into().ok())
            .ok_or(PtpError::InvalidClockIdentity)?;
        Ok(ClockIdentity(bytes))
    }

    pub fn write_to(&self, buffer: &mut ByteBuffer) {
        buffer.put_slice(&self.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0; 8]
    }

    /// A loose sanity check, not formal validation.
    pub fn is_valid(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.0[0] == 0 && self.0[1] == 0 && self.0[2] == 0 {
            return false;
        }
        if self.0[5] == 0 && self.0[6] == 0 && self.0[7] == 0 {
            return false;
        }
        true
    }
}

impl fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A clock identity plus a port number.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortIdentity {
    pub clock_identity: ClockIdentity,
    pub port_number: u16,
}

impl PortIdentity {
    pub const WIRE_SIZE: usize = 10;

    pub const PORT_NUMBER_MIN: u16 = 0x0001;
    pub const PORT_NUMBER_MAX: u16 = 0xfffe;
    /// Addresses all ports of an instance.
    pub const PORT_NUMBER_ALL: u16 = 0xffff;

    pub fn new(clock_identity: ClockIdentity, port_number: u16) -> PortIdentity {
        PortIdentity { clock_identity, port_number }
    }

    pub fn parse(data: &[u8]) -> Result<PortIdentity, PtpError> {
        if data.len() < Self::WIRE_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(PortIdentity {
            clock_identity: ClockIdentity::parse(data)?,
            port_number: ravenna_core::wire::read_be::<u16>(&data[8..]),
        })
    }

    pub fn write_to(&self, buffer: &mut ByteBuffer) {
        self.clock_identity.write_to(buffer);
        buffer.put_be(self.port_number);
    }
}

impl fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.clock_identity, self.port_number)
    }
}

/// The 12-bit sdoId discriminating domains/standards, split on the wire
/// into a high nibble and a low octet.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct SdoId(pub u16);

impl SdoId {
    pub fn major(&self) -> u8 {
        ((self.0 >> 8) & 0x0f) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for SdoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Clock accuracy per IEEE 1588-2019 Table 5. Carried as the raw octet so
/// reserved and profile-specific values round-trip unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockAccuracy(pub u8);

impl ClockAccuracy {
    pub const WITHIN_1_PS: ClockAccuracy = ClockAccuracy(0x17);
    pub const WITHIN_2_5_PS: ClockAccuracy = ClockAccuracy(0x18);
    pub const WITHIN_10_PS: ClockAccuracy = ClockAccuracy(0x19);
    pub const WITHIN_25_PS: ClockAccuracy = ClockAccuracy(0x1a);
    pub const WITHIN_100_PS: ClockAccuracy = ClockAccuracy(0x1b);
    pub const WITHIN_250_PS: ClockAccuracy = ClockAccuracy(0x1c);
    pub const WITHIN_1_NS: ClockAccuracy = ClockAccuracy(0x1d);
    pub const WITHIN_2_5_NS: ClockAccuracy = ClockAccuracy(0x1e);
    pub const WITHIN_10_NS: ClockAccuracy = ClockAccuracy(0x1f);
    pub const WITHIN_25_NS: ClockAccuracy = ClockAccuracy(0x20);
    pub const WITHIN_100_NS: ClockAccuracy = ClockAccuracy(0x21);
    pub const WITHIN_250_NS: ClockAccuracy = ClockAccuracy(0x22);
    pub const WITHIN_1_US: ClockAccuracy = ClockAccuracy(0x23);
    pub const WITHIN_2_5_US: ClockAccuracy = ClockAccuracy(0x24);
    pub const WITHIN_10_US: ClockAccuracy = ClockAccuracy(0x25);
    pub const WITHIN_25_US: ClockAccuracy = ClockAccuracy(0x26);
    pub const WITHIN_100_US: ClockAccuracy = ClockAccuracy(0x27);
    pub const WITHIN_250_US: ClockAccuracy = ClockAccuracy(0x28);
    pub const WITHIN_1_MS: ClockAccuracy = ClockAccuracy(0x29);
    pub const WITHIN_2_5_MS: ClockAccuracy = ClockAccuracy(0x2a);
    pub const WITHIN_10_MS: ClockAccuracy = ClockAccuracy(0x2b);
    pub const WITHIN_25_MS: ClockAccuracy = ClockAccuracy(0x2c);
    pub const WITHIN_100_MS: ClockAccuracy = ClockAccuracy(0x2d);
    pub const WITHIN_250_MS: ClockAccuracy = ClockAccuracy(0x2e);
    pub const WITHIN_1_S: ClockAccuracy = ClockAccuracy(0x2f);
    pub const WITHIN_10_S: ClockAccuracy = ClockAccuracy(0x30);
    pub const BEYOND_10_S: ClockAccuracy = ClockAccuracy(0x31);
    pub const UNKNOWN: ClockAccuracy = ClockAccuracy(0xfe);
}

impl Default for ClockAccuracy {
    fn default() -> Self {
        ClockAccuracy::UNKNOWN
    }
}

/// Clock quality per IEEE 1588-2019 Table 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ClockQuality {
    pub clock_class: u8,
    pub clock_accuracy: ClockAccuracy,
    pub offset_scaled_log_variance: u16,
}

impl ClockQuality {
    /// Default clock class is 248; slave-only instances use 255.
    pub fn new(slave_only: bool) -> ClockQuality {
        ClockQuality {
            clock_class: if slave_only { 255 } else { 248 },
            clock_accuracy: ClockAccuracy::UNKNOWN,
            offset_scaled_log_variance: 0xffff,
        }
    }

    pub fn write_to(&self, buffer: &mut ByteBuffer) {
        buffer.put_u8(self.clock_class);
        buffer.put_u8(self.clock_accuracy.0);
        buffer.put_be(self.offset_scaled_log_variance);
    }
}

impl Default for ClockQuality {
    fn default() -> Self {
        ClockQuality::new(false)
    }
}

/// Time source per IEEE 1588-2019 Table 6, carried raw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimeSource(pub u8);

impl TimeSource {
    pub const ATOMIC_CLOCK: TimeSource = TimeSource(0x10);
    pub const GNSS: TimeSource = TimeSource(0x20);
    pub const TERRESTRIAL_RADIO: TimeSource = TimeSource(0x30);
    pub const SERIAL_TIME_CODE: TimeSource = TimeSource(0x39);
    pub const PTP: TimeSource = TimeSource(0x40);
    pub const NTP: TimeSource = TimeSource(0x50);
    pub const HAND_SET: TimeSource = TimeSource(0x60);
    pub const OTHER: TimeSource = TimeSource(0x90);
    pub const INTERNAL_OSCILLATOR: TimeSource = TimeSource(0xa0);
}

impl Default for TimeSource {
    fn default() -> Self {
        TimeSource::INTERNAL_OSCILLATOR
    }
}

/// Port states per IEEE 1588-2019 Table 27.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum PortState {
    #[default]
    Undefined,
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master,
    Passive,
    Uncalibrated,
    Slave,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortState::Undefined => "undefined",
            PortState::Initializing => "initializing",
            PortState::Faulty => "faulty",
            PortState::Disabled => "disabled",
            PortState::Listening => "listening",
            PortState::PreMaster => "pre_master",
            PortState::Master => "master",
            PortState::Passive => "passive",
            PortState::Uncalibrated => "uncalibrated",
            PortState::Slave => "slave",
        };
        f.write_str(name)
    }
}

/// Path delay measurement mechanisms, IEEE 1588-2019 Table 21.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum DelayMechanism {
    #[default]
    E2e,
    P2p,
    CommonP2p,
    Special,
    NoMechanism,
}

/// The protocol version carried in every header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Default for Version {
    fn default() -> Self {
        Version { major: 2, minor: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_identity_splices_fffe_into_mac() {
        let mac: MacAddress = "39:a7:94:07:cb:d0".parse().unwrap();
        let identity = ClockIdentity::from_mac(mac);
        assert_eq!(identity.0, [0x39, 0xa7, 0x94, 0xff, 0xfe, 0x07, 0xcb, 0xd0]);
        assert!(identity.is_valid());
        assert_eq!(identity.to_string(), "39-a7-94-ff-fe-07-cb-d0");
    }

    #[test]
    fn all_zero_identity_is_invalid() {
        assert!(!ClockIdentity::default().is_valid());
        assert!(ClockIdentity::default().is_empty());
    }

    #[test]
    fn port_identity_wire_round_trip() {
        let identity = PortIdentity::new(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]), 0x1234);
        let mut buffer = ByteBuffer::new();
        identity.write_to(&mut buffer);
        assert_eq!(buffer.len(), PortIdentity::WIRE_SIZE);
        assert_eq!(PortIdentity::parse(buffer.as_slice()).unwrap(), identity);
    }

    #[test]
    fn sdo_id_splits_into_nibble_and_octet() {
        let sdo = SdoId(0x123);
        assert_eq!(sdo.major(), 0x1);
        assert_eq!(sdo.minor(), 0x23);
    }

    #[test]
    fn slave_only_quality_uses_class_255() {
        assert_eq!(ClockQuality::new(true).clock_class, 255);
        assert_eq!(ClockQuality::new(false).clock_class, 248);
    }
}
