//! RTP reception: a packet view over raw datagrams and a multi-session,
//! multi-interface receive path that fans packets out to per-reader
//! lock-free queues.

mod packet;
mod receiver;

pub use packet::{PacketView, RtpError};
pub use receiver::{
    Filter, PacketBuffer, Receiver, ReaderHandle, Session, DEFAULT_QUEUE_CAPACITY,
    MAX_PACKET_SIZE,
};
