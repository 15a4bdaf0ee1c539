use ravenna_core::wire::BufferView;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpError {
    #[error("datagram too short for an rtp header")]
    TooShort,
    #[error("unsupported rtp version {0}")]
    BadVersion(u8),
}

/// A zero-copy view over an RTP packet, RFC 3550 5.1.
#[derive(Debug, Copy, Clone)]
pub struct PacketView<'a> {
    data: &'a [u8],
}

const FIXED_HEADER_SIZE: usize = 12;

impl<'a> PacketView<'a> {
    pub fn new(data: &'a [u8]) -> Result<PacketView<'a>, RtpError> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(RtpError::TooShort);
        }

        let view = PacketView { data };
        if view.version() != 2 {
            return Err(RtpError::BadVersion(view.version()));
        }

        if data.len() < view.header_len() {
            return Err(RtpError::TooShort);
        }

        Ok(view)
    }

    pub fn version(&self) -> u8 {
        self.data[0] >> 6
    }

    pub fn has_padding(&self) -> bool {
        self.data[0] & 0x20 != 0
    }

    pub fn has_extension(&self) -> bool {
        self.data[0] & 0x10 != 0
    }

    pub fn csrc_count(&self) -> usize {
        usize::from(self.data[0] & 0x0f)
    }

    pub fn marker(&self) -> bool {
        self.data[1] & 0x80 != 0
    }

    pub fn payload_type(&self) -> u8 {
        self.data[1] & 0x7f
    }

    pub fn sequence_number(&self) -> u16 {
        ravenna_core::wire::read_be::<u16>(&self.data[2..])
    }

    pub fn timestamp(&self) -> u32 {
        ravenna_core::wire::read_be::<u32>(&self.data[4..])
    }

    pub fn ssrc(&self) -> u32 {
        ravenna_core::wire::read_be::<u32>(&self.data[8..])
    }

    pub fn csrc(&self, index: usize) -> Option<u32> {
        if index >= self.csrc_count() {
            return None;
        }
        BufferView::new(self.data).read_be::<u32>(FIXED_HEADER_SIZE + index * 4)
    }

    /// Fixed header plus CSRC list. Header extensions are not consumed and
    /// remain part of the payload bytes.
    pub fn header_len(&self) -> usize {
        FIXED_HEADER_SIZE + self.csrc_count() * 4
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.header_len()..]
    }
}
