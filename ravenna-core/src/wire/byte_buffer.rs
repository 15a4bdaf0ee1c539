use super::Scalar;

/// A growable byte buffer with typed, endian-explicit appends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> ByteBuffer {
        ByteBuffer::default()
    }

    pub fn with_capacity(capacity: usize) -> ByteBuffer {
        ByteBuffer { data: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn put_be<T: Scalar>(&mut self, value: T) {
        let start = self.data.len();
        self.data.resize(start + T::SIZE, 0);
        value.write_be(&mut self.data[start..]);
    }

    pub fn put_le<T: Scalar>(&mut self, value: T) {
        let start = self.data.len();
        self.data.resize(start + T::SIZE, 0);
        value.write_le(&mut self.data[start..]);
    }

    pub fn put_ne<T: Scalar>(&mut self, value: T) {
        let start = self.data.len();
        self.data.resize(start + T::SIZE, 0);
        value.write_ne(&mut self.data[start..]);
    }
}
