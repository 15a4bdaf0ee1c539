use bitflags::bitflags;

use ravenna_core::wire::{self, ByteBuffer};

use crate::types::{PortIdentity, SdoId, Version};
use crate::PtpError;

use super::MessageType;

/// Size of the common header in octets.
pub const HEADER_SIZE: usize = 34;

bitflags! {
    /// The two flag octets, IEEE 1588-2019 Table 37.
    ///
    /// Bits 8..15 are the first octet on the wire, bits 0..7 the second.
    /// Unknown bits are retained so the field round-trips exactly.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct FlagField: u16 {
        const ALTERNATE_MASTER = 1 << 8;
        const TWO_STEP = 1 << 9;
        const UNICAST = 1 << 10;
        const PROFILE_SPECIFIC_1 = 1 << 13;
        const PROFILE_SPECIFIC_2 = 1 << 14;

        const LEAP61 = 1 << 0;
        const LEAP59 = 1 << 1;
        const CURRENT_UTC_OFFSET_VALID = 1 << 2;
        const PTP_TIMESCALE = 1 << 3;
        const TIME_TRACEABLE = 1 << 4;
        const FREQUENCY_TRACEABLE = 1 << 5;
        const SYNCHRONIZATION_UNCERTAIN = 1 << 6;

        const _ = !0;
    }
}

/// The 34-octet common message header.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub sdo_id: SdoId,
    pub message_type: MessageType,
    pub version: Version,
    pub message_length: u16,
    pub domain_number: u8,
    pub flags: FlagField,
    /// Scaled nanoseconds (ns * 2^16).
    pub correction_field: i64,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub log_message_interval: i8,
}

impl Header {
    /// Decodes the common header from the start of a datagram. The datagram
    /// must contain at least `message_length` octets; anything beyond that
    /// is never read.
    pub fn parse(data: &[u8]) -> Result<Header, PtpError> {
        if data.len() < HEADER_SIZE {
            return Err(PtpError::InvalidHeaderLength);
        }

        let message_length = wire::read_be::<u16>(&data[2..]);
        if (message_length as usize) < HEADER_SIZE || data.len() < message_length as usize {
            return Err(PtpError::InvalidMessageLength);
        }

        Ok(Header {
            sdo_id: SdoId(u16::from(data[0] & 0xf0) << 4 | u16::from(data[5])),
            message_type: MessageType(data[0] & 0x0f),
            version: Version {
                major: data[1] & 0x0f,
                minor: (data[1] & 0xf0) >> 4,
            },
            message_length,
            domain_number: data[4],
            flags: FlagField::from_bits_retain(u16::from(data[6]) << 8 | u16::from(data[7])),
            correction_field: wire::read_be::<i64>(&data[8..]),
            // four type-specific octets at 16..20 are ignored
            source_port_identity: PortIdentity::parse(&data[20..30])?,
            sequence_id: wire::read_be::<u16>(&data[30..]),
            // the control field octet at 32 is historic and ignored
            log_message_interval: data[33] as i8,
        })
    }

    pub fn write_to(&self, buffer: &mut ByteBuffer) {
        // major sdoId nibble | message type nibble
        buffer.put_u8(((self.sdo_id.0 >> 4) as u8 & 0xf0) | (self.message_type.0 & 0x0f));
        // minor version nibble | major version nibble
        buffer.put_u8(self.version.minor << 4 | (self.version.major & 0x0f));
        buffer.put_be(self.message_length);
        buffer.put_u8(self.domain_number);
        buffer.put_u8(self.sdo_id.minor());
        let flags = self.flags.bits();
        buffer.put_u8((flags >> 8) as u8);
        buffer.put_u8(flags as u8);
        buffer.put_be(self.correction_field);
        buffer.put_be(0u32); // type-specific
        self.source_port_identity.write_to(buffer);
        buffer.put_be(self.sequence_id);
        buffer.put_u8(0); // control field
        buffer.put_u8(self.log_message_interval as u8);
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PTP {}: sdo_id={} version={}.{} domain={} sequence_id={} source={}",
            self.message_type,
            self.sdo_id,
            self.version.major,
            self.version.minor,
            self.domain_number,
            self.sequence_id,
            self.source_port_identity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClockIdentity;

    fn sample_header() -> Header {
        Header {
            sdo_id: SdoId(0x123),
            message_type: MessageType::ANNOUNCE,
            version: Version { major: 2, minor: 1 },
            message_length: HEADER_SIZE as u16,
            domain_number: 5,
            flags: FlagField::TWO_STEP | FlagField::LEAP61 | FlagField::PTP_TIMESCALE,
            correction_field: -42 << 16,
            source_port_identity: PortIdentity::new(
                ClockIdentity([0xaa, 0xbb, 0xcc, 0xff, 0xfe, 0xdd, 0xee, 0xff]),
                2,
            ),
            sequence_id: 0x8001,
            log_message_interval: -3,
        }
    }

    #[test]
    fn header_round_trips() {
        let header = sample_header();
        let mut buffer = ByteBuffer::new();
        header.write_to(&mut buffer);
        assert_eq!(buffer.len(), HEADER_SIZE);
        assert_eq!(Header::parse(buffer.as_slice()).unwrap(), header);
    }

    #[test]
    fn bit_packing_matches_the_standard() {
        let header = sample_header();
        let mut buffer = ByteBuffer::new();
        header.write_to(&mut buffer);
        let bytes = buffer.as_slice();

        // octet 0: sdoId major nibble then message type nibble
        assert_eq!(bytes[0], 0x1b);
        // octet 1: minor version then major version
        assert_eq!(bytes[1], 0x12);
        // octet 5: sdoId minor octet
        assert_eq!(bytes[5], 0x23);
        // flag octets: two_step is bit 1 of the first, leap61 bit 0 and
        // ptp_timescale bit 3 of the second
        assert_eq!(bytes[6], 0b0000_0010);
        assert_eq!(bytes[7], 0b0000_1001);
    }

    #[test]
    fn unknown_flag_bits_round_trip() {
        let mut header = sample_header();
        header.flags = FlagField::from_bits_retain(0xffff);
        let mut buffer = ByteBuffer::new();
        header.write_to(&mut buffer);
        let parsed = Header::parse(buffer.as_slice()).unwrap();
        assert_eq!(parsed.flags.bits(), 0xffff);
    }

    #[test]
    fn rejects_short_buffers() {
        assert_eq!(Header::parse(&[]), Err(PtpError::InvalidHeaderLength));
        assert_eq!(Header::parse(&[0u8; 33]), Err(PtpError::InvalidHeaderLength));
    }

    #[test]
    fn rejects_inconsistent_message_length() {
        let header = sample_header();
        let mut buffer = ByteBuffer::new();
        header.write_to(&mut buffer);
        let mut bytes = buffer.into_vec();
        bytes[2..4].copy_from_slice(&10u16.to_be_bytes());
        assert_eq!(Header::parse(&bytes), Err(PtpError::InvalidMessageLength));
    }
}
