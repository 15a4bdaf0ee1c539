//! Per-message bodies. Offsets are relative to the end of the common
//! header.

use ravenna_core::wire::{self, ByteBuffer};

use crate::time::Timestamp;
use crate::types::{ClockAccuracy, ClockIdentity, ClockQuality, PortIdentity, TimeSource};
use crate::PtpError;

use super::Header;

fn encode_with_body(header: &Header, write_body: impl FnOnce(&mut ByteBuffer)) -> Vec<u8> {
    let mut buffer = ByteBuffer::with_capacity(header.message_length as usize);
    header.write_to(&mut buffer);
    write_body(&mut buffer);
    buffer.into_vec()
}

/// Announce: the BMCA input, IEEE 1588-2019 13.5.
#[derive(Debug, Clone, PartialEq)]
pub struct Announce {
    pub header: Header,
    pub origin_timestamp: Timestamp,
    /// Seconds.
    pub current_utc_offset: i16,
    pub grandmaster_priority1: u8,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority2: u8,
    pub grandmaster_identity: ClockIdentity,
    pub steps_removed: u16,
    pub time_source: TimeSource,
}

impl Announce {
    pub const BODY_SIZE: usize = 30;

    pub fn parse(header: Header, body: &[u8]) -> Result<Announce, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }

        Ok(Announce {
            header,
            origin_timestamp: Timestamp::parse(body)?,
            current_utc_offset: wire::read_be::<i16>(&body[10..]),
            // octet 12 is reserved
            grandmaster_priority1: body[13],
            grandmaster_clock_quality: ClockQuality {
                clock_class: body[14],
                clock_accuracy: ClockAccuracy(body[15]),
                offset_scaled_log_variance: wire::read_be::<u16>(&body[16..]),
            },
            grandmaster_priority2: body[18],
            grandmaster_identity: ClockIdentity::parse(&body[19..27])?,
            steps_removed: wire::read_be::<u16>(&body[27..]),
            time_source: TimeSource(body[29]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| {
            self.origin_timestamp.write_to(buffer);
            buffer.put_be(self.current_utc_offset);
            buffer.put_u8(0); // reserved
            buffer.put_u8(self.grandmaster_priority1);
            self.grandmaster_clock_quality.write_to(buffer);
            buffer.put_u8(self.grandmaster_priority2);
            self.grandmaster_identity.write_to(buffer);
            buffer.put_be(self.steps_removed);
            buffer.put_u8(self.time_source.0);
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sync {
    pub header: Header,
    pub origin_timestamp: Timestamp,
}

impl Sync {
    pub const BODY_SIZE: usize = 10;

    pub fn parse(header: Header, body: &[u8]) -> Result<Sync, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(Sync { header, origin_timestamp: Timestamp::parse(body)? })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| self.origin_timestamp.write_to(buffer))
    }

    /// The two-step flag announces a Follow_Up carrying the precise origin
    /// timestamp.
    pub fn is_two_step(&self) -> bool {
        self.header.flags.contains(super::FlagField::TWO_STEP)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub header: Header,
    pub precise_origin_timestamp: Timestamp,
}

impl FollowUp {
    pub const BODY_SIZE: usize = 10;

    pub fn parse(header: Header, body: &[u8]) -> Result<FollowUp, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(FollowUp { header, precise_origin_timestamp: Timestamp::parse(body)? })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| {
            self.precise_origin_timestamp.write_to(buffer)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelayReq {
    pub header: Header,
    pub origin_timestamp: Timestamp,
}

impl DelayReq {
    pub const BODY_SIZE: usize = 10;

    pub fn parse(header: Header, body: &[u8]) -> Result<DelayReq, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(DelayReq { header, origin_timestamp: Timestamp::parse(body)? })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| self.origin_timestamp.write_to(buffer))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelayResp {
    pub header: Header,
    pub receive_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl DelayResp {
    pub const BODY_SIZE: usize = 20;

    pub fn parse(header: Header, body: &[u8]) -> Result<DelayResp, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(DelayResp {
            header,
            receive_timestamp: Timestamp::parse(body)?,
            requesting_port_identity: PortIdentity::parse(&body[10..])?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| {
            self.receive_timestamp.write_to(buffer);
            self.requesting_port_identity.write_to(buffer);
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdelayReq {
    pub header: Header,
    pub origin_timestamp: Timestamp,
}

impl PdelayReq {
    pub const BODY_SIZE: usize = 10;

    pub fn parse(header: Header, body: &[u8]) -> Result<PdelayReq, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(PdelayReq { header, origin_timestamp: Timestamp::parse(body)? })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| self.origin_timestamp.write_to(buffer))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdelayResp {
    pub header: Header,
    pub request_receipt_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PdelayResp {
    pub const BODY_SIZE: usize = 20;

    pub fn parse(header: Header, body: &[u8]) -> Result<PdelayResp, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(PdelayResp {
            header,
            request_receipt_timestamp: Timestamp::parse(body)?,
            requesting_port_identity: PortIdentity::parse(&body[10..])?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| {
            self.request_receipt_timestamp.write_to(buffer);
            self.requesting_port_identity.write_to(buffer);
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdelayRespFollowUp {
    pub header: Header,
    pub response_origin_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PdelayRespFollowUp {
    pub const BODY_SIZE: usize = 20;

    pub fn parse(header: Header, body: &[u8]) -> Result<PdelayRespFollowUp, PtpError> {
        if body.len() < Self::BODY_SIZE {
            return Err(PtpError::InvalidMessageLength);
        }
        Ok(PdelayRespFollowUp {
            header,
            response_origin_timestamp: Timestamp::parse(body)?,
            requesting_port_identity: PortIdentity::parse(&body[10..])?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_with_body(&self.header, |buffer| {
            self.response_origin_timestamp.write_to(buffer);
            self.requesting_port_identity.write_to(buffer);
        })
    }
}
