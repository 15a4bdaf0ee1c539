use crate::containers::fifo::{Fifo, Lock, Single};

use super::convert::{self, ByteOrder, ConvertError, Interleaving, SampleFormat};
use super::{AudioBuffer, Sample};

/// A circular buffer of planar audio, always addressed in frames.
///
/// The FIFO carries the read/write positions, with capacity equal to the
/// frame count; every operation applies to the first span and, when the
/// position wraps, to the second. The FIFO variant decides the threading
/// contract; the default is the unsynchronized one.
#[derive(Debug, Default)]
pub struct CircularAudioBuffer<T: Sample, F: Fifo = Single> {
    buffer: AudioBuffer<T>,
    fifo: F,
}

impl<T: Sample, F: Fifo + Default> CircularAudioBuffer<T, F> {
    pub fn new(num_channels: usize, num_frames: usize) -> CircularAudioBuffer<T, F> {
        let mut circular = CircularAudioBuffer { buffer: AudioBuffer::new(), fifo: F::default() };
        circular.resize(num_channels, num_frames);
        circular
    }
}

impl<T: Sample, F: Fifo> CircularAudioBuffer<T, F> {
    /// Writes all frames of `src`. Returns false if there is not enough
    /// free space; nothing is written in that case.
    pub fn write(&mut self, src: &AudioBuffer<T>) -> bool {
        if src.num_channels() != self.buffer.num_channels() {
            return false;
        }

        let num_frames = src.num_frames();
        let Some(lock) = self.fifo.prepare_for_write(num_frames) else {
            return false;
        };

        let position = lock.position();
        self.buffer.copy_from(position.index1, position.size1, src, 0);
        if position.size2 > 0 {
            self.buffer.copy_from(0, position.size2, src, position.size1);
        }

        lock.commit();
        true
    }

    /// Reads exactly `dst.num_frames()` frames into `dst`. Returns false if
    /// not enough data is buffered; nothing is consumed in that case.
    pub fn read(&mut self, dst: &mut AudioBuffer<T>) -> bool {
        if dst.num_channels() != self.buffer.num_channels() {
            return false;
        }

        let num_frames = dst.num_frames();
        let Some(lock) = self.fifo.prepare_for_read(num_frames) else {
            return false;
        };

        let position = lock.position();
        self.buffer.copy_to(position.index1, position.size1, dst, 0);
        if position.size2 > 0 {
            self.buffer.copy_to(0, position.size2, dst, position.size1);
        }

        lock.commit();
        true
    }

    /// Writes `num_frames` frames of wire-format samples, converting into
    /// the buffer's sample type. Returns Ok(false) when there is not enough
    /// free space.
    pub fn write_converting(
        &mut self,
        data: &[u8],
        format: SampleFormat,
        order: ByteOrder,
        layout: Interleaving,
        num_frames: usize,
    ) -> Result<bool, ConvertError> {
        if self.buffer.num_channels() == 0 {
            return Err(ConvertError::ChannelMismatch);
        }

        let Some(lock) = self.fifo.prepare_for_write(num_frames) else {
            return Ok(false);
        };

        let position = lock.position();
        convert::convert_into_buffer(
            data,
            format,
            order,
            layout,
            0,
            &mut self.buffer,
            position.index1,
            position.size1,
        )?;
        if position.size2 > 0 {
            convert::convert_into_buffer(
                data,
                format,
                order,
                layout,
                position.size1,
                &mut self.buffer,
                0,
                position.size2,
            )?;
        }

        lock.commit();
        Ok(true)
    }

    /// Reads `num_frames` frames, converting into the destination wire
    /// format. Returns Ok(false) when there is not enough data buffered.
    pub fn read_converting(
        &mut self,
        data: &mut [u8],
        format: SampleFormat,
        order: ByteOrder,
        layout: Interleaving,
        num_frames: usize,
    ) -> Result<bool, ConvertError> {
        if self.buffer.num_channels() == 0 {
            return Err(ConvertError::ChannelMismatch);
        }

        let Some(lock) = self.fifo.prepare_for_read(num_frames) else {
            return Ok(false);
        };

        let position = lock.position();
        convert::convert_from_buffer(
            &self.buffer,
            position.index1,
            data,
            format,
            order,
            layout,
            0,
            position.size1,
        )?;
        if position.size2 > 0 {
            convert::convert_from_buffer(
                &self.buffer,
                0,
                data,
                format,
                order,
                layout,
                position.size1,
                position.size2,
            )?;
        }

        lock.commit();
        Ok(true)
    }

    /// Resizes the storage, clearing existing contents. The FIFO capacity
    /// tracks the frame count.
    pub fn resize(&mut self, num_channels: usize, num_frames: usize) {
        self.buffer.resize(num_channels, num_frames);
        self.fifo.resize(num_frames);
    }

    pub fn num_channels(&self) -> usize {
        self.buffer.num_channels()
    }

    pub fn num_frames(&self) -> usize {
        self.buffer.num_frames()
    }

    /// Frames currently buffered.
    pub fn len(&self) -> usize {
        self.fifo.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards buffered audio and silences the storage.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fifo.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::fifo::Spsc;

    fn frames(values: &[i16]) -> AudioBuffer<i16> {
        let mut buffer = AudioBuffer::with_size(1, values.len());
        buffer.copy_from_slice(0, 0, values);
        buffer
    }

    #[test]
    fn preserves_frame_order_across_wrap() {
        let mut circular: CircularAudioBuffer<i16> = CircularAudioBuffer::new(1, 4);

        assert!(circular.write(&frames(&[1, 2, 3])));
        let mut out = AudioBuffer::with_size(1, 2);
        assert!(circular.read(&mut out));
        assert_eq!(out.channel(0), &[1, 2]);

        // this write wraps around the end of the 4-frame storage
        assert!(circular.write(&frames(&[4, 5, 6])));
        let mut out = AudioBuffer::with_size(1, 4);
        assert!(circular.read(&mut out));
        assert_eq!(out.channel(0), &[3, 4, 5, 6]);
    }

    #[test]
    fn refuses_overfill_and_underrun() {
        let mut circular: CircularAudioBuffer<i16> = CircularAudioBuffer::new(1, 4);
        assert!(circular.write(&frames(&[1, 2, 3, 4])));
        assert!(!circular.write(&frames(&[5])));

        let mut out = AudioBuffer::with_size(1, 4);
        assert!(circular.read(&mut out));
        assert!(!circular.read(&mut out));
    }

    #[test]
    fn channel_count_must_match() {
        let mut circular: CircularAudioBuffer<i16> = CircularAudioBuffer::new(2, 4);
        assert!(!circular.write(&frames(&[1, 2])));
    }

    #[test]
    fn resize_clears_contents() {
        let mut circular: CircularAudioBuffer<i16> = CircularAudioBuffer::new(1, 4);
        assert!(circular.write(&frames(&[1, 2])));
        circular.resize(1, 8);
        assert_eq!(circular.len(), 0);
        assert_eq!(circular.num_frames(), 8);
    }

    #[test]
    fn converting_write_wraps_through_both_spans() {
        let mut circular: CircularAudioBuffer<i16, Spsc> = CircularAudioBuffer::new(2, 4);

        // advance the positions so the next write wraps
        let silence = AudioBuffer::with_size(2, 3);
        assert!(circular.write(&silence));
        let mut drain = AudioBuffer::with_size(2, 3);
        assert!(circular.read(&mut drain));

        // interleaved big-endian s16 wire data, 3 frames x 2 channels
        let wire: Vec<u8> = [10i16, 20, 11, 21, 12, 22]
            .iter()
            .flat_map(|s| s.to_be_bytes())
            .collect();

        let wrote = circular
            .write_converting(
                &wire,
                SampleFormat::S16,
                ByteOrder::Big,
                Interleaving::Interleaved,
                3,
            )
            .unwrap();
        assert!(wrote);

        let mut out = AudioBuffer::with_size(2, 3);
        assert!(circular.read(&mut out));
        assert_eq!(out.channel(0), &[10, 11, 12]);
        assert_eq!(out.channel(1), &[20, 21, 22]);
    }
}
