//! The receive fan-in: sockets demultiplex datagrams by their destination
//! endpoint into per-reader lock-free queues.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use ravenna_core::containers::fifo::{Fifo, Lock, Spsc};
use ravenna_core::util::Id;
use ravenna_net::{Datagram, ListenError, MulticastSubscription, UdpSenderReceiver};

/// Fixed slot size for queued packets; anything larger than the network
/// MTU has no business here.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Queue slots per reader unless the caller chooses otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One queued datagram.
#[derive(Clone)]
pub struct PacketBuffer {
    len: u16,
    data: [u8; MAX_PACKET_SIZE],
}

impl Default for PacketBuffer {
    fn default() -> Self {
        PacketBuffer { len: 0, data: [0; MAX_PACKET_SIZE] }
    }
}

impl PacketBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    fn fill_from(&mut self, payload: &[u8]) {
        let len = payload.len().min(MAX_PACKET_SIZE);
        self.data[..len].copy_from_slice(&payload[..len]);
        self.len = len as u16;
    }
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PacketBuffer {{ len = {} }}", self.len)
    }
}

/// One RTP session a reader listens to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Session {
    pub multicast_address: Ipv4Addr,
    pub rtp_port: u16,
    pub rtcp_port: u16,
}

/// An exact source-address allow-list entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Filter {
    pub source_address: Ipv4Addr,
}

struct ReaderShared {
    id: Id,
    sessions: Vec<Session>,
    filters: Vec<Filter>,
    fifo: Spsc,
    slots: Box<[UnsafeCell<PacketBuffer>]>,
    dropped: AtomicU64,
}

// The slots are only touched through positions handed out by the SPSC
// FIFO, which grants the producer and the consumer disjoint spans.
unsafe impl Sync for ReaderShared {}
unsafe impl Send for ReaderShared {}

impl ReaderShared {
    fn matches_rtp(&self, destination: (Ipv4Addr, u16)) -> bool {
        self.sessions
            .iter()
            .any(|s| s.multicast_address == destination.0 && s.rtp_port == destination.1)
    }

    fn matches_rtcp(&self, destination: (Ipv4Addr, u16)) -> bool {
        self.sessions
            .iter()
            .any(|s| s.multicast_address == destination.0 && s.rtcp_port == destination.1)
    }

    fn source_allowed(&self, source: Ipv4Addr) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.source_address == source)
    }

    /// Reserve one slot, copy the datagram in, commit. Drops silently when
    /// the queue is full: overwriting the oldest packet would reorder the
    /// stream for the consumer.
    fn push(&self, payload: &[u8]) {
        let Some(lock) = self.fifo.prepare_for_write(1) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::trace!("reader {} queue full, dropping packet", self.id);
            return;
        };

        let index = lock.position().index1;
        unsafe { (*self.slots[index].get()).fill_from(payload) };
        lock.commit();
    }
}

/// The consumer side of one reader. Exactly one thread may drain it.
pub struct ReaderHandle {
    shared: Arc<ReaderShared>,
}

impl ReaderHandle {
    pub fn id(&self) -> Id {
        self.shared.id
    }

    /// Takes the oldest queued packet, if any.
    pub fn pop(&mut self, out: &mut PacketBuffer) -> bool {
        let Some(lock) = self.shared.fifo.prepare_for_read(1) else {
            return false;
        };

        let index = lock.position().index1;
        unsafe { out.clone_from(&*self.shared.slots[index].get()) };
        lock.commit();
        true
    }

    /// Packets dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        self.shared.fifo.size()
    }
}

struct BoundSocket {
    socket: UdpSenderReceiver,
    port: u16,
}

/// The socket owner and dispatcher. Lives on the reactor thread; consumer
/// threads drain through their [`ReaderHandle`]s.
pub struct Receiver {
    readers: Vec<Arc<ReaderShared>>,
    sockets: Vec<BoundSocket>,
    subscriptions: HashMap<Id, Vec<MulticastSubscription>>,
}

impl Default for Receiver {
    fn default() -> Self {
        Receiver::new()
    }
}

impl Receiver {
    pub fn new() -> Receiver {
        Receiver { readers: Vec::new(), sockets: Vec::new(), subscriptions: HashMap::new() }
    }

    /// Registers a reader for a set of sessions received on the given
    /// interfaces. Returns the consumer handle for its queue.
    pub fn add_reader(
        &mut self,
        id: Id,
        sessions: Vec<Session>,
        filters: Vec<Filter>,
        interfaces: &[Ipv4Addr],
        queue_capacity: usize,
    ) -> Result<ReaderHandle, ListenError> {
        let mut subscriptions = Vec::new();

        for session in &sessions {
            for port in [session.rtp_port, session.rtcp_port] {
                let socket = self.socket_for_port(port)?;
                for interface in interfaces {
                    subscriptions
                        .push(socket.join_multicast_group(session.multicast_address, *interface)?);
                }
            }
        }

        let slots: Vec<UnsafeCell<PacketBuffer>> =
            (0..queue_capacity).map(|_| UnsafeCell::new(PacketBuffer::default())).collect();

        let shared = Arc::new(ReaderShared {
            id,
            sessions,
            filters,
            fifo: Spsc::new(queue_capacity),
            slots: slots.into_boxed_slice(),
            dropped: AtomicU64::new(0),
        });

        self.readers.push(shared.clone());
        self.subscriptions.insert(id, subscriptions);

        log::debug!("added rtp reader {id} with {} sessions", shared.sessions.len());
        Ok(ReaderHandle { shared })
    }

    /// Drops a reader and leaves its multicast groups. The consumer's
    /// handle keeps its queue alive but nothing feeds it anymore.
    pub fn remove_reader(&mut self, id: Id) {
        self.readers.retain(|reader| reader.id != id);
        self.subscriptions.remove(&id);
    }

    pub fn fds(&self) -> Vec<BorrowedFd<'_>> {
        self.sockets.iter().map(|bound| bound.socket.as_fd()).collect()
    }

    /// Waits for any socket to become readable, then drains them all.
    pub fn poll_once(&mut self, timeout: Duration) -> io::Result<()> {
        {
            let mut fds: Vec<PollFd> = self
                .sockets
                .iter()
                .map(|bound| PollFd::new(bound.socket.as_fd(), PollFlags::POLLIN))
                .collect();

            if fds.is_empty() {
                std::thread::sleep(timeout);
                return Ok(());
            }

            let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(_) => {}
                Err(nix::errno::Errno::EINTR) => return Ok(()),
                Err(errno) => return Err(io::Error::from(errno)),
            }
        }

        self.read_incoming_packets();
        Ok(())
    }

    /// Drains every socket and dispatches each datagram to its reader.
    pub fn read_incoming_packets(&mut self) {
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        for index in 0..self.sockets.len() {
            loop {
                let socket = self.sockets[index].socket.clone();
                match socket.try_recv(&mut buffer) {
                    Ok(Some(datagram)) => self.dispatch(&datagram),
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("rtp receive error: {e}");
                        break;
                    }
                }
            }
        }
    }

    /// Locates the reader by the datagram's destination endpoint and
    /// queues the payload if the source passes the filter.
    fn dispatch(&self, datagram: &Datagram) {
        if datagram.payload.is_empty() {
            return;
        }

        let destination = (*datagram.destination.ip(), datagram.destination.port());
        let source = *datagram.source.ip();

        for reader in &self.readers {
            if reader.matches_rtp(destination) {
                if reader.source_allowed(source) {
                    reader.push(&datagram.payload);
                } else {
                    log::trace!("reader {} rejecting source {source}", reader.id);
                }
                return;
            }

            if reader.matches_rtcp(destination) {
                // rtcp is observed but not queued towards the audio path
                log::trace!("reader {} rtcp packet from {source}", reader.id);
                return;
            }
        }

        log::trace!("no reader for destination {}:{}", destination.0, destination.1);
    }

    fn socket_for_port(&mut self, port: u16) -> Result<&UdpSenderReceiver, ListenError> {
        if let Some(index) = self.sockets.iter().position(|bound| bound.port == port) {
            return Ok(&self.sockets[index].socket);
        }

        let socket = UdpSenderReceiver::open(Ipv4Addr::UNSPECIFIED, port)?;
        self.sockets.push(BoundSocket { socket, port });
        Ok(&self.sockets.last().expect("just pushed").socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    fn datagram(payload: &[u8], source: Ipv4Addr, destination: SocketAddrV4) -> Datagram {
        Datagram {
            payload: payload.to_vec(),
            source: SocketAddrV4::new(source, 5004),
            destination,
            recv_time: 1,
        }
    }

    fn reader_shared(filters: Vec<Filter>, capacity: usize) -> (Arc<ReaderShared>, ReaderHandle) {
        let slots: Vec<UnsafeCell<PacketBuffer>> =
            (0..capacity).map(|_| UnsafeCell::new(PacketBuffer::default())).collect();
        let shared = Arc::new(ReaderShared {
            id: Id(1),
            sessions: vec![Session {
                multicast_address: Ipv4Addr::new(239, 0, 0, 1),
                rtp_port: 5004,
                rtcp_port: 5005,
            }],
            filters,
            fifo: Spsc::new(capacity),
            slots: slots.into_boxed_slice(),
            dropped: AtomicU64::new(0),
        });
        (shared.clone(), ReaderHandle { shared })
    }

    fn receiver_with(shared: Arc<ReaderShared>) -> Receiver {
        Receiver {
            readers: vec![shared],
            sockets: Vec::new(),
            subscriptions: HashMap::new(),
        }
    }

    #[test]
    fn dispatches_by_destination_endpoint() {
        let (shared, mut handle) = reader_shared(Vec::new(), 4);
        let receiver = receiver_with(shared);

        let group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 1), 5004);
        receiver.dispatch(&datagram(b"packet", Ipv4Addr::new(10, 0, 0, 1), group));

        let other_group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 2), 5004);
        receiver.dispatch(&datagram(b"elsewhere", Ipv4Addr::new(10, 0, 0, 1), other_group));

        let mut out = PacketBuffer::default();
        assert!(handle.pop(&mut out));
        assert_eq!(out.as_bytes(), b"packet");
        assert!(!handle.pop(&mut out));
    }

    #[test]
    fn source_filters_are_an_exact_allow_list() {
        let filters = vec![Filter { source_address: Ipv4Addr::new(10, 0, 0, 1) }];
        let (shared, mut handle) = reader_shared(filters, 4);
        let receiver = receiver_with(shared);

        let group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 1), 5004);
        receiver.dispatch(&datagram(b"allowed", Ipv4Addr::new(10, 0, 0, 1), group));
        receiver.dispatch(&datagram(b"blocked", Ipv4Addr::new(10, 0, 0, 2), group));

        let mut out = PacketBuffer::default();
        assert!(handle.pop(&mut out));
        assert_eq!(out.as_bytes(), b"allowed");
        assert!(!handle.pop(&mut out));
    }

    #[test]
    fn full_queue_drops_newest_silently() {
        let (shared, mut handle) = reader_shared(Vec::new(), 2);
        let receiver = receiver_with(shared);

        let group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 1), 5004);
        receiver.dispatch(&datagram(b"one", Ipv4Addr::new(10, 0, 0, 1), group));
        receiver.dispatch(&datagram(b"two", Ipv4Addr::new(10, 0, 0, 1), group));
        receiver.dispatch(&datagram(b"three", Ipv4Addr::new(10, 0, 0, 1), group));

        assert_eq!(handle.dropped(), 1);

        // ordering preserved: oldest packets win
        let mut out = PacketBuffer::default();
        assert!(handle.pop(&mut out));
        assert_eq!(out.as_bytes(), b"one");
        assert!(handle.pop(&mut out));
        assert_eq!(out.as_bytes(), b"two");
        assert!(!handle.pop(&mut out));
    }

    #[test]
    fn rtcp_packets_are_not_queued() {
        let (shared, mut handle) = reader_shared(Vec::new(), 4);
        let receiver = receiver_with(shared);

        let rtcp = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 1), 5005);
        receiver.dispatch(&datagram(b"report", Ipv4Addr::new(10, 0, 0, 1), rtcp));

        let mut out = PacketBuffer::default();
        assert!(!handle.pop(&mut out));
    }

    #[test]
    fn drained_packets_cross_threads() {
        let (shared, mut handle) = reader_shared(Vec::new(), 64);
        let receiver = receiver_with(shared);

        let consumer = std::thread::spawn(move || {
            let mut out = PacketBuffer::default();
            let mut received = 0u32;
            while received < 100 {
                if handle.pop(&mut out) {
                    assert_eq!(out.as_bytes().len(), 12);
                    received += 1;
                }
            }
            received
        });

        let group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 1), 5004);
        let payload = [0u8; 12];
        let mut sent = 0;
        while sent < 100 {
            let before = receiver.readers[0].dropped.load(Ordering::Relaxed);
            receiver.dispatch(&datagram(&payload, Ipv4Addr::new(10, 0, 0, 1), group));
            if receiver.readers[0].dropped.load(Ordering::Relaxed) == before {
                sent += 1;
            }
        }

        assert_eq!(consumer.join().unwrap(), 100);
    }
}
