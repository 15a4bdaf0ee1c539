//! Planar audio buffers and the sample-format conversion matrix.

mod buffer;
mod circular;
pub mod convert;
mod format;

pub use buffer::AudioBuffer;
pub use circular::CircularAudioBuffer;
pub use convert::{ByteOrder, ConvertError, Interleaving, SampleFormat};
pub use format::AudioFormat;

use bytemuck::Pod;

/// An in-memory audio sample type.
///
/// `SILENCE` is the mid-scale value a cleared buffer is filled with: zero
/// for signed and float formats, the midpoint for unsigned ones.
pub trait Sample: Pod + PartialEq + std::fmt::Debug {
    const FORMAT: SampleFormat;
    const SILENCE: Self;
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;
    const SILENCE: u8 = 0x80;
}

impl Sample for i8 {
    const FORMAT: SampleFormat = SampleFormat::S8;
    const SILENCE: i8 = 0;
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::S16;
    const SILENCE: i16 = 0;
}

impl Sample for i32 {
    const FORMAT: SampleFormat = SampleFormat::S32;
    const SILENCE: i32 = 0;
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;
    const SILENCE: f32 = 0.0;
}

impl Sample for f64 {
    const FORMAT: SampleFormat = SampleFormat::F64;
    const SILENCE: f64 = 0.0;
}
