use super::{ByteOrder, Interleaving, SampleFormat};

/// Describes an audio stream: sample format, byte order, interleaving,
/// sample rate and channel count.
///
/// This is the bridge between SDP `rtpmap` formats (`L16/48000/8` and
/// friends) and the conversion matrix.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub byte_order: ByteOrder,
    pub interleaving: Interleaving,
    pub sample_rate: u32,
    pub num_channels: u32,
}

impl AudioFormat {
    /// Bytes per frame on the wire.
    pub fn frame_size(&self) -> usize {
        self.sample_format.size() * self.num_channels as usize
    }

    /// The RTP payload encoding name for linear PCM formats, if one exists.
    pub fn encoding_name(&self) -> Option<&'static str> {
        match (self.sample_format, self.byte_order) {
            (SampleFormat::U8, _) => Some("L8"),
            (SampleFormat::S16, ByteOrder::Big) => Some("L16"),
            (SampleFormat::S24, ByteOrder::Big) => Some("L24"),
            (SampleFormat::S32, ByteOrder::Big) => Some("L32"),
            _ => None,
        }
    }

    /// Maps an RTP payload encoding name to a wire format. AES67 linear PCM
    /// payloads are big-endian and interleaved.
    pub fn from_encoding_name(name: &str, sample_rate: u32, num_channels: u32) -> Option<AudioFormat> {
        let sample_format = match name {
            "L8" => SampleFormat::U8,
            "L16" => SampleFormat::S16,
            "L24" => SampleFormat::S24,
            "L32" => SampleFormat::S32,
            _ => return None,
        };

        Some(AudioFormat {
            sample_format,
            byte_order: ByteOrder::Big,
            interleaving: Interleaving::Interleaved,
            sample_rate,
            num_channels,
        })
    }
}
