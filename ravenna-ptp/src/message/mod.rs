//! The PTP message codec.
//!
//! All integers are big-endian on the wire. Decoders validate lengths and
//! never read past the declared `message_length`; encoders assume valid
//! inputs and produce bit-exact output. TLVs trailing a body are surfaced
//! as raw bytes.

mod bodies;
mod header;

pub use bodies::{
    Announce, DelayReq, DelayResp, FollowUp, PdelayReq, PdelayResp, PdelayRespFollowUp, Sync,
};
pub use header::{FlagField, Header, HEADER_SIZE};

use crate::PtpError;

/// Message types per IEEE 1588-2019 Table 36, carried as the raw nibble.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MessageType(pub u8);

impl MessageType {
    pub const SYNC: MessageType = MessageType(0x0);
    pub const DELAY_REQ: MessageType = MessageType(0x1);
    pub const PDELAY_REQ: MessageType = MessageType(0x2);
    pub const PDELAY_RESP: MessageType = MessageType(0x3);
    pub const FOLLOW_UP: MessageType = MessageType(0x8);
    pub const DELAY_RESP: MessageType = MessageType(0x9);
    pub const PDELAY_RESP_FOLLOW_UP: MessageType = MessageType(0xa);
    pub const ANNOUNCE: MessageType = MessageType(0xb);
    pub const SIGNALING: MessageType = MessageType(0xc);
    pub const MANAGEMENT: MessageType = MessageType(0xd);

    /// Event messages are timestamped on transmit/receive and travel on
    /// UDP 319; general messages travel on UDP 320.
    pub fn is_event(&self) -> bool {
        self.0 < 0x4
    }

    pub fn name(&self) -> &'static str {
        match *self {
            MessageType::SYNC => "Sync",
            MessageType::DELAY_REQ => "Delay_Req",
            MessageType::PDELAY_REQ => "Pdelay_Req",
            MessageType::PDELAY_RESP => "Pdelay_Resp",
            MessageType::FOLLOW_UP => "Follow_Up",
            MessageType::DELAY_RESP => "Delay_Resp",
            MessageType::PDELAY_RESP_FOLLOW_UP => "Pdelay_Resp_Follow_Up",
            MessageType::ANNOUNCE => "Announce",
            MessageType::SIGNALING => "Signaling",
            MessageType::MANAGEMENT => "Management",
            _ => "Reserved",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully decoded PTP message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Announce(Announce),
    Sync(Sync),
    FollowUp(FollowUp),
    DelayReq(DelayReq),
    DelayResp(DelayResp),
    PdelayReq(PdelayReq),
    PdelayResp(PdelayResp),
    PdelayRespFollowUp(PdelayRespFollowUp),
    /// Signaling, management, and reserved types: header only.
    Other(Header),
}

impl Message {
    /// Decodes a datagram. Returns the message and any TLV bytes between
    /// the body and the declared message length.
    pub fn parse(data: &[u8]) -> Result<(Message, &[u8]), PtpError> {
        let header = Header::parse(data)?;
        let message = &data[..header.message_length as usize];
        let body = &message[HEADER_SIZE..];

        let (message, body_len) = match header.message_type {
            MessageType::ANNOUNCE => {
                (Message::Announce(Announce::parse(header, body)?), Announce::BODY_SIZE)
            }
            MessageType::SYNC => (Message::Sync(Sync::parse(header, body)?), Sync::BODY_SIZE),
            MessageType::FOLLOW_UP => {
                (Message::FollowUp(FollowUp::parse(header, body)?), FollowUp::BODY_SIZE)
            }
            MessageType::DELAY_REQ => {
                (Message::DelayReq(DelayReq::parse(header, body)?), DelayReq::BODY_SIZE)
            }
            MessageType::DELAY_RESP => {
                (Message::DelayResp(DelayResp::parse(header, body)?), DelayResp::BODY_SIZE)
            }
            MessageType::PDELAY_REQ => {
                (Message::PdelayReq(PdelayReq::parse(header, body)?), PdelayReq::BODY_SIZE)
            }
            MessageType::PDELAY_RESP => {
                (Message::PdelayResp(PdelayResp::parse(header, body)?), PdelayResp::BODY_SIZE)
            }
            MessageType::PDELAY_RESP_FOLLOW_UP => (
                Message::PdelayRespFollowUp(PdelayRespFollowUp::parse(header, body)?),
                PdelayRespFollowUp::BODY_SIZE,
            ),
            _ => (Message::Other(header), 0),
        };

        Ok((message, &body[body_len..]))
    }

    pub fn header(&self) -> &Header {
        match self {
            Message::Announce(m) => &m.header,
            Message::Sync(m) => &m.header,
            Message::FollowUp(m) => &m.header,
            Message::DelayReq(m) => &m.header,
            Message::DelayResp(m) => &m.header,
            Message::PdelayReq(m) => &m.header,
            Message::PdelayResp(m) => &m.header,
            Message::PdelayRespFollowUp(m) => &m.header,
            Message::Other(header) => header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;
    use crate::types::{ClockIdentity, ClockQuality, PortIdentity, SdoId, TimeSource, Version};

    fn header_for(message_type: MessageType, body_size: usize) -> Header {
        Header {
            sdo_id: SdoId(0x100),
            message_type,
            version: Version { major: 2, minor: 1 },
            message_length: (HEADER_SIZE + body_size) as u16,
            domain_number: 0,
            flags: FlagField::TWO_STEP | FlagField::PTP_TIMESCALE,
            correction_field: 0x1234 << 16,
            source_port_identity: PortIdentity::new(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]), 1),
            sequence_id: 0xabcd,
            log_message_interval: 1,
        }
    }

    #[test]
    fn announce_round_trips_bit_exactly() {
        let announce = Announce {
            header: header_for(MessageType::ANNOUNCE, Announce::BODY_SIZE),
            origin_timestamp: Timestamp::new(100, 200),
            current_utc_offset: 37,
            grandmaster_priority1: 128,
            grandmaster_clock_quality: ClockQuality::new(false),
            grandmaster_priority2: 129,
            grandmaster_identity: ClockIdentity([9, 8, 7, 6, 5, 4, 3, 2]),
            steps_removed: 3,
            time_source: TimeSource::GNSS,
        };

        let encoded = announce.encode();
        assert_eq!(encoded.len(), announce.header.message_length as usize);

        let (decoded, tlvs) = Message::parse(&encoded).unwrap();
        assert!(tlvs.is_empty());
        assert_eq!(decoded, Message::Announce(announce.clone()));

        // decoding the re-encoded bytes must be byte-identical
        if let Message::Announce(message) = decoded {
            assert_eq!(message.encode(), encoded);
        }
    }

    #[test]
    fn sync_and_follow_up_round_trip() {
        let sync = Sync {
            header: header_for(MessageType::SYNC, Sync::BODY_SIZE),
            origin_timestamp: Timestamp::new(0x0102_0304_0506, 999_999_999),
        };
        let encoded = sync.encode();
        let (decoded, _) = Message::parse(&encoded).unwrap();
        assert_eq!(decoded, Message::Sync(sync));

        let follow_up = FollowUp {
            header: header_for(MessageType::FOLLOW_UP, FollowUp::BODY_SIZE),
            precise_origin_timestamp: Timestamp::new(1, 2),
        };
        let encoded = follow_up.encode();
        let (decoded, _) = Message::parse(&encoded).unwrap();
        assert_eq!(decoded, Message::FollowUp(follow_up));
    }

    #[test]
    fn delay_resp_round_trips() {
        let delay_resp = DelayResp {
            header: header_for(MessageType::DELAY_RESP, DelayResp::BODY_SIZE),
            receive_timestamp: Timestamp::new(12, 0),
            requesting_port_identity: PortIdentity::new(ClockIdentity([2; 8]), 7),
        };
        let encoded = delay_resp.encode();
        let (decoded, _) = Message::parse(&encoded).unwrap();
        assert_eq!(decoded, Message::DelayResp(delay_resp));
    }

    #[test]
    fn pdelay_family_round_trips() {
        let req = PdelayReq {
            header: header_for(MessageType::PDELAY_REQ, PdelayReq::BODY_SIZE),
            origin_timestamp: Timestamp::new(5, 6),
        };
        let (decoded, _) = Message::parse(&req.encode()).unwrap();
        assert_eq!(decoded, Message::PdelayReq(req));

        let resp = PdelayResp {
            header: header_for(MessageType::PDELAY_RESP, PdelayResp::BODY_SIZE),
            request_receipt_timestamp: Timestamp::new(7, 8),
            requesting_port_identity: PortIdentity::new(ClockIdentity([3; 8]), 2),
        };
        let (decoded, _) = Message::parse(&resp.encode()).unwrap();
        assert_eq!(decoded, Message::PdelayResp(resp));

        let follow_up = PdelayRespFollowUp {
            header: header_for(MessageType::PDELAY_RESP_FOLLOW_UP, PdelayRespFollowUp::BODY_SIZE),
            response_origin_timestamp: Timestamp::new(9, 10),
            requesting_port_identity: PortIdentity::new(ClockIdentity([4; 8]), 3),
        };
        let (decoded, _) = Message::parse(&follow_up.encode()).unwrap();
        assert_eq!(decoded, Message::PdelayRespFollowUp(follow_up));
    }

    #[test]
    fn tlv_bytes_are_surfaced_not_read() {
        let sync = Sync {
            header: header_for(MessageType::SYNC, Sync::BODY_SIZE + 4),
            origin_timestamp: Timestamp::new(1, 1),
        };
        let mut encoded = sync.encode();
        encoded.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let (decoded, tlvs) = Message::parse(&encoded).unwrap();
        assert_eq!(tlvs, &[0xde, 0xad, 0xbe, 0xef]);
        if let Message::Sync(message) = decoded {
            assert_eq!(message.origin_timestamp, Timestamp::new(1, 1));
        } else {
            panic!("expected a sync message");
        }
    }

    #[test]
    fn truncated_and_overdeclared_datagrams_are_rejected() {
        let sync = Sync {
            header: header_for(MessageType::SYNC, Sync::BODY_SIZE),
            origin_timestamp: Timestamp::default(),
        };
        let encoded = sync.encode();

        assert_eq!(Message::parse(&encoded[..10]), Err(PtpError::InvalidHeaderLength));
        assert_eq!(Message::parse(&encoded[..40]), Err(PtpError::InvalidMessageLength));

        // message_length pointing past the datagram
        let mut bad = encoded.clone();
        let bad_len = bad.len() as u16 + 1;
        bad[2..4].copy_from_slice(&bad_len.to_be_bytes());
        assert_eq!(Message::parse(&bad), Err(PtpError::InvalidMessageLength));
    }

    #[test]
    fn unknown_types_decode_to_header_only() {
        let mut header = header_for(MessageType(0x4), 0);
        header.flags = FlagField::empty();
        let mut buffer = ravenna_core::wire::ByteBuffer::new();
        header.write_to(&mut buffer);

        let (decoded, tlvs) = Message::parse(buffer.as_slice()).unwrap();
        assert!(tlvs.is_empty());
        assert_eq!(decoded, Message::Other(header));
    }
}
