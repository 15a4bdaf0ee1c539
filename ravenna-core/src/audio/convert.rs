//! Sample-format, byte-order and interleaving conversion.
//!
//! The conversion table is closed: pairs outside it fail loudly with
//! [`ConvertError::Unsupported`] rather than guessing a lossy path. The
//! callable set is exactly the match arms in [`convert_value`].

use thiserror::Error;

use crate::wire::I24;

use super::{AudioBuffer, Sample};

/// On-the-wire sample encodings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    S8,
    S16,
    S24,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// Size of one sample on the wire in bytes.
    pub fn size(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
    Native,
}

impl ByteOrder {
    /// Collapses `Native` into the platform's concrete order.
    pub fn resolve(self) -> ByteOrder {
        match self {
            ByteOrder::Native => {
                if cfg!(target_endian = "little") {
                    ByteOrder::Little
                } else {
                    ByteOrder::Big
                }
            }
            other => other,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Interleaving {
    Interleaved,
    Planar,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("conversion from {from:?} to {to:?} is not implemented")]
    Unsupported { from: SampleFormat, to: SampleFormat },
    #[error("source and destination frame counts differ")]
    SizeMismatch,
    #[error("buffer length is not a whole number of frames")]
    RaggedBuffer,
    #[error("channel count mismatch")]
    ChannelMismatch,
}

const S16_TO_FLOAT: f64 = 1.0 / 32768.0;
const S24_TO_FLOAT: f64 = 1.0 / 8_388_608.0;
const FLOAT_TO_S16: f64 = 32767.0;
const FLOAT_TO_S24: f64 = 8_388_607.0;

/// Reads a sample of `size` bytes into the low bits of a u64.
fn read_raw(bytes: &[u8], size: usize, order: ByteOrder) -> u64 {
    let mut value = 0u64;
    match order.resolve() {
        ByteOrder::Little => {
            for (i, byte) in bytes[..size].iter().enumerate() {
                value |= u64::from(*byte) << (8 * i);
            }
        }
        ByteOrder::Big => {
            for byte in &bytes[..size] {
                value = value << 8 | u64::from(*byte);
            }
        }
        ByteOrder::Native => unreachable!(),
    }
    value
}

/// Writes the low `size` bytes of a u64 out in the requested order.
fn write_raw(bytes: &mut [u8], size: usize, order: ByteOrder, value: u64) {
    match order.resolve() {
        ByteOrder::Little => {
            for (i, byte) in bytes[..size].iter_mut().enumerate() {
                *byte = (value >> (8 * i)) as u8;
            }
        }
        ByteOrder::Big => {
            for (i, byte) in bytes[..size].iter_mut().enumerate() {
                *byte = (value >> (8 * (size - 1 - i))) as u8;
            }
        }
        ByteOrder::Native => unreachable!(),
    }
}

fn sign_extend_24(raw: u64) -> i32 {
    I24::from_i32(raw as i32).to_i32()
}

/// Converts one raw sample value between formats. This is the closed
/// conversion table; anything outside it is `Unsupported`.
fn convert_value(from: SampleFormat, to: SampleFormat, raw: u64) -> Result<u64, ConvertError> {
    use SampleFormat::*;

    let value = match (from, to) {
        (a, b) if a == b => raw,

        (U8, S8) => u64::from((raw as u8).wrapping_sub(0x80)),
        (S8, S16) => (i16::from(raw as u8 as i8) << 8) as u16 as u64,

        (S16, S24) => ((i32::from(raw as u16 as i16) << 8) as u32 & 0xff_ffff) as u64,
        (S16, S32) => (i32::from(raw as u16 as i16) << 16) as u32 as u64,
        (S16, F32) => {
            let sample = f64::from(raw as u16 as i16) * S16_TO_FLOAT;
            u64::from((sample as f32).to_bits())
        }
        (S16, F64) => {
            let sample = f64::from(raw as u16 as i16) * S16_TO_FLOAT;
            sample.to_bits()
        }

        (S24, F32) => {
            let sample = f64::from(sign_extend_24(raw)) * S24_TO_FLOAT;
            u64::from((sample as f32).to_bits())
        }
        (S24, F64) => {
            let sample = f64::from(sign_extend_24(raw)) * S24_TO_FLOAT;
            sample.to_bits()
        }

        (F32, S16) => {
            let sample = f32::from_bits(raw as u32);
            (sample * FLOAT_TO_S16 as f32) as i16 as u16 as u64
        }
        (F32, S24) => {
            let sample = f32::from_bits(raw as u32);
            (((sample * FLOAT_TO_S24 as f32) as i32) as u32 & 0xff_ffff) as u64
        }
        (F64, S16) => {
            let sample = f64::from_bits(raw);
            (sample * FLOAT_TO_S16) as i16 as u16 as u64
        }
        (F64, S24) => {
            let sample = f64::from_bits(raw);
            (((sample * FLOAT_TO_S24) as i32) as u32 & 0xff_ffff) as u64
        }

        (from, to) => return Err(ConvertError::Unsupported { from, to }),
    };

    Ok(value)
}

/// Converts a single sample between formats and byte orders.
pub fn convert_sample(
    src: &[u8],
    src_format: SampleFormat,
    src_order: ByteOrder,
    dst: &mut [u8],
    dst_format: SampleFormat,
    dst_order: ByteOrder,
) -> Result<(), ConvertError> {
    let src_size = src_format.size();
    let dst_size = dst_format.size();

    if src_format == dst_format && src_order.resolve() == dst_order.resolve() {
        dst[..dst_size].copy_from_slice(&src[..src_size]);
        return Ok(());
    }

    let raw = read_raw(src, src_size, src_order);
    let converted = convert_value(src_format, dst_format, raw)?;
    write_raw(dst, dst_size, dst_order, converted);
    Ok(())
}

/// Bulk conversion between byte buffers, including interleaving changes.
///
/// Buffer lengths must describe the same number of frames on both sides.
pub fn convert(
    src: &[u8],
    src_format: SampleFormat,
    src_order: ByteOrder,
    src_layout: Interleaving,
    dst: &mut [u8],
    dst_format: SampleFormat,
    dst_order: ByteOrder,
    dst_layout: Interleaving,
    num_channels: usize,
) -> Result<(), ConvertError> {
    let src_sample = src_format.size();
    let dst_sample = dst_format.size();

    if num_channels == 0
        || src.len() % (src_sample * num_channels) != 0
        || dst.len() % (dst_sample * num_channels) != 0
    {
        return Err(ConvertError::RaggedBuffer);
    }

    let num_frames = src.len() / (src_sample * num_channels);
    if num_frames != dst.len() / (dst_sample * num_channels) {
        return Err(ConvertError::SizeMismatch);
    }

    for frame in 0..num_frames {
        for channel in 0..num_channels {
            let src_index = sample_index(src_layout, frame, channel, num_frames, num_channels);
            let dst_index = sample_index(dst_layout, frame, channel, num_frames, num_channels);
            convert_sample(
                &src[src_index * src_sample..],
                src_format,
                src_order,
                &mut dst[dst_index * dst_sample..],
                dst_format,
                dst_order,
            )?;
        }
    }

    Ok(())
}

fn sample_index(
    layout: Interleaving,
    frame: usize,
    channel: usize,
    num_frames: usize,
    num_channels: usize,
) -> usize {
    match layout {
        Interleaving::Interleaved => frame * num_channels + channel,
        Interleaving::Planar => channel * num_frames + frame,
    }
}

/// Converts wire samples into a planar audio buffer, starting at
/// `dst_start_frame`. The buffer's sample type and native order are the
/// destination format.
pub fn convert_into_buffer<T: Sample>(
    src: &[u8],
    src_format: SampleFormat,
    src_order: ByteOrder,
    src_layout: Interleaving,
    src_start_frame: usize,
    dst: &mut AudioBuffer<T>,
    dst_start_frame: usize,
    num_frames: usize,
) -> Result<(), ConvertError> {
    let num_channels = dst.num_channels();
    if num_channels == 0 {
        return Err(ConvertError::ChannelMismatch);
    }

    let src_sample = src_format.size();
    let src_frames = src.len() / (src_sample * num_channels);

    for frame in 0..num_frames {
        for channel in 0..num_channels {
            let src_index = sample_index(
                src_layout,
                src_start_frame + frame,
                channel,
                src_frames,
                num_channels,
            );
            let dst_sample = &mut dst.channel_mut(channel)[dst_start_frame + frame];
            convert_sample(
                &src[src_index * src_sample..],
                src_format,
                src_order,
                bytemuck::bytes_of_mut(dst_sample),
                T::FORMAT,
                ByteOrder::Native,
            )?;
        }
    }

    Ok(())
}

/// Converts out of a planar audio buffer into wire samples, starting at
/// `src_start_frame` in the buffer.
pub fn convert_from_buffer<T: Sample>(
    src: &AudioBuffer<T>,
    src_start_frame: usize,
    dst: &mut [u8],
    dst_format: SampleFormat,
    dst_order: ByteOrder,
    dst_layout: Interleaving,
    dst_start_frame: usize,
    num_frames: usize,
) -> Result<(), ConvertError> {
    let num_channels = src.num_channels();
    if num_channels == 0 {
        return Err(ConvertError::ChannelMismatch);
    }

    let dst_sample = dst_format.size();
    let dst_frames = dst.len() / (dst_sample * num_channels);

    for frame in 0..num_frames {
        for channel in 0..num_channels {
            let src_sample = src.channel(channel)[src_start_frame + frame];
            let dst_index = sample_index(
                dst_layout,
                dst_start_frame + frame,
                channel,
                dst_frames,
                num_channels,
            );
            convert_sample(
                bytemuck::bytes_of(&src_sample),
                T::FORMAT,
                ByteOrder::Native,
                &mut dst[dst_index * dst_sample..],
                dst_format,
                dst_order,
            )?;
        }
    }

    Ok(())
}

/// Rearranges interleaved sample bytes into planar order without touching
/// the sample values.
pub fn deinterleave(
    input: &[u8],
    output: &mut [u8],
    num_channels: usize,
    bytes_per_sample: usize,
) -> Result<(), ConvertError> {
    if input.len() != output.len() {
        return Err(ConvertError::SizeMismatch);
    }

    let frame_size = num_channels * bytes_per_sample;
    if frame_size == 0 || input.len() % frame_size != 0 {
        return Err(ConvertError::RaggedBuffer);
    }

    let num_frames = input.len() / frame_size;

    for frame in 0..num_frames {
        for channel in 0..num_channels {
            let input_index = frame * frame_size + channel * bytes_per_sample;
            let output_index = (channel * num_frames + frame) * bytes_per_sample;
            output[output_index..output_index + bytes_per_sample]
                .copy_from_slice(&input[input_index..input_index + bytes_per_sample]);
        }
    }

    Ok(())
}

/// Rearranges planar sample bytes into interleaved order.
pub fn interleave(
    input: &[u8],
    output: &mut [u8],
    num_channels: usize,
    bytes_per_sample: usize,
    num_frames: usize,
) -> Result<(), ConvertError> {
    if input.len() != output.len() {
        return Err(ConvertError::SizeMismatch);
    }

    let frame_size = num_channels * bytes_per_sample;
    if frame_size == 0 || input.len() != frame_size * num_frames {
        return Err(ConvertError::RaggedBuffer);
    }

    for frame in 0..num_frames {
        for channel in 0..num_channels {
            let input_index = (channel * num_frames + frame) * bytes_per_sample;
            let output_index = frame * frame_size + channel * bytes_per_sample;
            output[output_index..output_index + bytes_per_sample]
                .copy_from_slice(&input[input_index..input_index + bytes_per_sample]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s16_be_interleaved_to_planar_native() {
        // two channels, four frames of interleaved big-endian s16
        let src: Vec<u8> = [1i16, 2, 3, 4, 5, 6, 7, 8]
            .iter()
            .flat_map(|s| s.to_be_bytes())
            .collect();

        let mut dst = AudioBuffer::<i16>::with_size(2, 4);
        convert_into_buffer(
            &src,
            SampleFormat::S16,
            ByteOrder::Big,
            Interleaving::Interleaved,
            0,
            &mut dst,
            0,
            4,
        )
        .unwrap();

        assert_eq!(dst.channel(0), &[1, 3, 5, 7]);
        assert_eq!(dst.channel(1), &[2, 4, 6, 8]);
    }

    #[test]
    fn scalar_conversion_table() {
        let mut out = [0u8; 8];

        // u8 -> s8 recenters around zero
        convert_sample(&[0x80], SampleFormat::U8, ByteOrder::Native, &mut out, SampleFormat::S8, ByteOrder::Native).unwrap();
        assert_eq!(out[0] as i8, 0);

        // s16 -> s32 shifts left 16
        convert_sample(
            &0x1234i16.to_be_bytes(),
            SampleFormat::S16,
            ByteOrder::Big,
            &mut out,
            SampleFormat::S32,
            ByteOrder::Big,
        )
        .unwrap();
        assert_eq!(i32::from_be_bytes(out[..4].try_into().unwrap()), 0x1234_0000);

        // s16 full scale -> f32 stays inside [-1, 1)
        convert_sample(
            &i16::MIN.to_be_bytes(),
            SampleFormat::S16,
            ByteOrder::Big,
            &mut out,
            SampleFormat::F32,
            ByteOrder::Native,
        )
        .unwrap();
        assert_eq!(f32::from_ne_bytes(out[..4].try_into().unwrap()), -1.0);

        // f32 -> s16 scales by 32767
        convert_sample(
            &0.5f32.to_ne_bytes(),
            SampleFormat::F32,
            ByteOrder::Native,
            &mut out,
            SampleFormat::S16,
            ByteOrder::Big,
        )
        .unwrap();
        assert_eq!(i16::from_be_bytes(out[..2].try_into().unwrap()), 16383);

        // s24 -> f64 full scale
        convert_sample(
            &[0x80, 0x00, 0x00],
            SampleFormat::S24,
            ByteOrder::Big,
            &mut out,
            SampleFormat::F64,
            ByteOrder::Native,
        )
        .unwrap();
        assert_eq!(f64::from_ne_bytes(out), -1.0);
    }

    #[test]
    fn out_of_table_conversions_fail_loudly() {
        let mut out = [0u8; 2];
        let err = convert_sample(
            &[0x80],
            SampleFormat::U8,
            ByteOrder::Native,
            &mut out,
            SampleFormat::S16,
            ByteOrder::Native,
        )
        .unwrap_err();
        assert_eq!(err, ConvertError::Unsupported { from: SampleFormat::U8, to: SampleFormat::S16 });
    }

    #[test]
    fn endian_only_conversion_swaps() {
        let src = 0x0102i16.to_be_bytes();
        let mut dst = [0u8; 2];
        convert_sample(&src, SampleFormat::S16, ByteOrder::Big, &mut dst, SampleFormat::S16, ByteOrder::Little).unwrap();
        assert_eq!(dst, [0x02, 0x01]);
    }

    #[test]
    fn bulk_convert_planar_to_interleaved() {
        // planar s16 native: ch0 = [1, 2], ch1 = [3, 4]
        let src: Vec<u8> = [1i16, 2, 3, 4].iter().flat_map(|s| s.to_ne_bytes()).collect();
        let mut dst = vec![0u8; 8];

        convert(
            &src,
            SampleFormat::S16,
            ByteOrder::Native,
            Interleaving::Planar,
            &mut dst,
            SampleFormat::S16,
            ByteOrder::Native,
            Interleaving::Interleaved,
            2,
        )
        .unwrap();

        let samples: Vec<i16> = dst
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(samples, vec![1, 3, 2, 4]);
    }

    #[test]
    fn interleave_round_trip() {
        let planar = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut interleaved = [0u8; 12];
        let mut back = [0u8; 12];

        interleave(&planar, &mut interleaved, 2, 3, 2).unwrap();
        deinterleave(&interleaved, &mut back, 2, 3).unwrap();
        assert_eq!(planar, back);
    }
}
