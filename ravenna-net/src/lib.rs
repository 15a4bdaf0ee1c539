//! Datagram plumbing shared by the PTP and RTP stacks.

mod socket;
pub mod time;

pub use socket::{Datagram, ListenError, MulticastSubscription, UdpSenderReceiver};
