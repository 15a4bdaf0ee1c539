use super::Sample;

/// Planar (non-interleaved) audio storage.
///
/// Samples for all channels live in one flat allocation of
/// `num_channels * num_frames` elements; channel `i` starts at offset
/// `i * num_frames`. Offsets rather than pointers index the channels, so
/// moves and clones need no fixing up.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer<T> {
    data: Vec<T>,
    channels: Vec<usize>,
}

impl<T: Sample> AudioBuffer<T> {
    pub fn new() -> AudioBuffer<T> {
        AudioBuffer { data: Vec::new(), channels: Vec::new() }
    }

    pub fn with_size(num_channels: usize, num_frames: usize) -> AudioBuffer<T> {
        let mut buffer = AudioBuffer::new();
        buffer.resize(num_channels, num_frames);
        buffer
    }

    /// Resizes the buffer, keeping existing data where it fits. Resizing
    /// either dimension to zero clears both the data and the channel table.
    pub fn resize(&mut self, num_channels: usize, num_frames: usize) {
        if num_channels == 0 || num_frames == 0 {
            self.data.clear();
            self.channels.clear();
            return;
        }

        self.data.resize(num_channels * num_frames, T::SILENCE);
        self.channels.clear();
        self.channels.extend((0..num_channels).map(|i| i * num_frames));
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_frames(&self) -> usize {
        if self.channels.is_empty() {
            0
        } else {
            self.data.len() / self.channels.len()
        }
    }

    pub fn channel(&self, index: usize) -> &[T] {
        let start = self.channels[index];
        &self.data[start..start + self.num_frames()]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [T] {
        let frames = self.num_frames();
        let start = self.channels[index];
        &mut self.data[start..start + frames]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[T]> {
        (0..self.num_channels()).map(|i| self.channel(i))
    }

    pub fn set_sample(&mut self, channel: usize, frame: usize, value: T) {
        let offset = self.channels[channel] + frame;
        self.data[offset] = value;
    }

    pub fn sample(&self, channel: usize, frame: usize) -> T {
        self.data[self.channels[channel] + frame]
    }

    /// Fills the whole buffer with silence.
    pub fn clear(&mut self) {
        self.data.fill(T::SILENCE);
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Fills a span of one channel with silence.
    pub fn clear_range(&mut self, channel: usize, start_frame: usize, num_frames: usize) {
        let offset = self.channels[channel] + start_frame;
        self.data[offset..offset + num_frames].fill(T::SILENCE);
    }

    /// Copies `num_frames` frames from every channel of `src` into this
    /// buffer at `dst_start_frame`. Channel counts must match.
    pub fn copy_from(
        &mut self,
        dst_start_frame: usize,
        num_frames: usize,
        src: &AudioBuffer<T>,
        src_start_frame: usize,
    ) {
        assert_eq!(src.num_channels(), self.num_channels(), "channel count mismatch");
        for channel in 0..self.num_channels() {
            let src_span = &src.channel(channel)[src_start_frame..src_start_frame + num_frames];
            self.copy_from_slice(channel, dst_start_frame, src_span);
        }
    }

    /// Copies a slice of samples into a span of one channel.
    pub fn copy_from_slice(&mut self, channel: usize, dst_start_frame: usize, src: &[T]) {
        let offset = self.channels[channel] + dst_start_frame;
        self.data[offset..offset + src.len()].copy_from_slice(src);
    }

    /// Copies `num_frames` frames from this buffer at `src_start_frame`
    /// into every channel of `dst` at `dst_start_frame`.
    pub fn copy_to(
        &self,
        src_start_frame: usize,
        num_frames: usize,
        dst: &mut AudioBuffer<T>,
        dst_start_frame: usize,
    ) {
        assert_eq!(dst.num_channels(), self.num_channels(), "channel count mismatch");
        for channel in 0..self.num_channels() {
            let src_span = &self.channel(channel)[src_start_frame..src_start_frame + num_frames];
            dst.copy_from_slice(channel, dst_start_frame, src_span);
        }
    }

    /// Copies a span of one channel out into a slice.
    pub fn copy_to_slice(&self, channel: usize, src_start_frame: usize, dst: &mut [T]) {
        let offset = self.channels[channel] + src_start_frame;
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
    }
}

impl<T: Sample> PartialEq for AudioBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.channels.len() == other.channels.len() && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_contiguous_spans() {
        let mut buffer = AudioBuffer::<i16>::with_size(2, 4);
        buffer.set_sample(0, 0, 1);
        buffer.set_sample(1, 3, -1);
        assert_eq!(buffer.channel(0), &[1, 0, 0, 0]);
        assert_eq!(buffer.channel(1), &[0, 0, 0, -1]);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_frames(), 4);
    }

    #[test]
    fn zero_dimension_resize_clears_everything() {
        let mut buffer = AudioBuffer::<f32>::with_size(4, 16);
        buffer.resize(0, 16);
        assert_eq!(buffer.num_channels(), 0);
        assert_eq!(buffer.num_frames(), 0);

        let mut buffer = AudioBuffer::<f32>::with_size(4, 16);
        buffer.resize(4, 0);
        assert_eq!(buffer.num_channels(), 0);
        assert_eq!(buffer.num_frames(), 0);
    }

    #[test]
    fn unsigned_formats_clear_to_midpoint() {
        let mut buffer = AudioBuffer::<u8>::with_size(1, 2);
        buffer.fill(3);
        buffer.clear();
        assert_eq!(buffer.channel(0), &[0x80, 0x80]);
    }

    #[test]
    fn copy_between_buffers() {
        let mut src = AudioBuffer::<i16>::with_size(2, 4);
        for frame in 0..4 {
            src.set_sample(0, frame, frame as i16);
            src.set_sample(1, frame, 10 + frame as i16);
        }

        let mut dst = AudioBuffer::<i16>::with_size(2, 8);
        dst.copy_from(2, 4, &src, 0);
        assert_eq!(dst.channel(0), &[0, 0, 0, 1, 2, 3, 0, 0]);
        assert_eq!(dst.channel(1), &[0, 0, 10, 11, 12, 13, 0, 0]);

        let mut back = AudioBuffer::<i16>::with_size(2, 4);
        dst.copy_to(2, 4, &mut back, 0);
        assert_eq!(back, src);
    }

    #[test]
    fn clone_preserves_contents() {
        let mut buffer = AudioBuffer::<f32>::with_size(2, 2);
        buffer.set_sample(1, 1, 0.5);
        let copy = buffer.clone();
        assert_eq!(copy, buffer);
        assert_eq!(copy.sample(1, 1), 0.5);
    }
}
