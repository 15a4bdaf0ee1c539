pub mod fifo;
mod ring_buffer;

pub use ring_buffer::RingBuffer;
