use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::rc::Rc;

use nix::sys::socket::{self, sockopt, ControlMessageOwned, MsgFlags, SockaddrIn};
use socket2::{Domain, Type};
use thiserror::Error;

use crate::time;

#[derive(Debug, Error)]
pub enum ListenError {
    #[error("creating socket: {0}")]
    Socket(io::Error),
    #[error("setting SO_REUSEADDR: {0}")]
    SetReuseAddr(io::Error),
    #[error("setting IP_PKTINFO: {0}")]
    SetPacketInfo(io::Error),
    #[error("setting non-blocking: {0}")]
    SetNonBlocking(io::Error),
    #[error("binding {0}: {1}")]
    Bind(SocketAddrV4, io::Error),
    #[error("joining multicast group {0}: {1}")]
    JoinMulticastGroup(Ipv4Addr, io::Error),
}

/// One received datagram with both endpoints and a receive timestamp.
///
/// The destination endpoint is the packet's actual destination address,
/// which disambiguates multicast groups joined on the same socket.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
    /// Monotonic nanoseconds, arbitrary starting point.
    pub recv_time: u64,
}

struct Shared {
    socket: UdpSocket,
    bound_port: u16,
    // refcounted multicast memberships keyed on (group, interface)
    groups: RefCell<HashMap<(Ipv4Addr, Ipv4Addr), usize>>,
}

/// A UDP socket that reports the destination address of every received
/// packet and refcounts its multicast memberships.
///
/// Receive is non-blocking; readiness is the caller's business (the
/// reactor polls the fd). Clones share the underlying socket.
#[derive(Clone)]
pub struct UdpSenderReceiver {
    shared: Rc<Shared>,
}

impl UdpSenderReceiver {
    /// Binds to `bind_addr:port` with address reuse and packet-info
    /// reception enabled.
    pub fn open(bind_addr: Ipv4Addr, port: u16) -> Result<UdpSenderReceiver, ListenError> {
        let bind = SocketAddrV4::new(bind_addr, port);

        let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, None)
            .map_err(ListenError::Socket)?;
        socket.set_reuse_address(true).map_err(ListenError::SetReuseAddr)?;
        socket.set_nonblocking(true).map_err(ListenError::SetNonBlocking)?;
        socket.bind(&bind.into()).map_err(|e| ListenError::Bind(bind, e))?;

        let socket: UdpSocket = socket.into();

        socket::setsockopt(&socket, sockopt::Ipv4PacketInfo, &true)
            .map_err(|e| ListenError::SetPacketInfo(e.into()))?;

        let bound_port = socket
            .local_addr()
            .map_err(ListenError::Socket)?
            .port();

        Ok(UdpSenderReceiver {
            shared: Rc::new(Shared {
                socket,
                bound_port,
                groups: RefCell::new(HashMap::new()),
            }),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.shared.bound_port
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.shared.socket.as_raw_fd()
    }

    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.shared.socket.as_fd()
    }

    pub fn send_to(&self, payload: &[u8], destination: SocketAddrV4) -> io::Result<usize> {
        self.shared.socket.send_to(payload, destination)
    }

    /// Receives one datagram if any is queued. Returns `None` when the
    /// socket has nothing to deliver.
    pub fn try_recv(&self, buffer: &mut [u8]) -> io::Result<Option<Datagram>> {
        let fd = self.shared.socket.as_raw_fd();
        let mut iov = [io::IoSliceMut::new(buffer)];
        let mut cmsg_buffer = nix::cmsg_space!(libc::in_pktinfo);

        let (bytes, source, dst_addr) = {
            let message = match socket::recvmsg::<SockaddrIn>(
                fd,
                &mut iov,
                Some(&mut cmsg_buffer),
                MsgFlags::MSG_DONTWAIT,
            ) {
                Ok(message) => message,
                Err(nix::errno::Errno::EAGAIN) => return Ok(None),
                Err(errno) => return Err(io::Error::from(errno)),
            };

            let source = message
                .address
                .map(|addr| SocketAddrV4::new(Ipv4Addr::from(addr.ip()), addr.port()))
                .unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

            let mut dst_addr = Ipv4Addr::UNSPECIFIED;
            for cmsg in message.cmsgs() {
                if let ControlMessageOwned::Ipv4PacketInfo(info) = cmsg {
                    dst_addr = Ipv4Addr::from(u32::from_be(info.ipi_addr.s_addr));
                }
            }

            (message.bytes, source, dst_addr)
        };

        Ok(Some(Datagram {
            payload: buffer[..bytes].to_vec(),
            source,
            destination: SocketAddrV4::new(dst_addr, self.shared.bound_port),
            recv_time: time::now_nanos(),
        }))
    }

    /// Joins a multicast group on an interface. Joins are counted: the
    /// group is left when the last subscription for it is dropped.
    pub fn join_multicast_group(
        &self,
        group: Ipv4Addr,
        interface: Ipv4Addr,
    ) -> Result<MulticastSubscription, ListenError> {
        let key = (group, interface);
        let mut groups = self.shared.groups.borrow_mut();
        let count = groups.entry(key).or_insert(0);

        if *count == 0 {
            self.shared
                .socket
                .join_multicast_v4(&group, &interface)
                .map_err(|e| ListenError::JoinMulticastGroup(group, e))?;
            log::debug!("joined multicast group {group} on {interface}");
        }
        *count += 1;

        Ok(MulticastSubscription {
            shared: self.shared.clone(),
            group,
            interface,
        })
    }

    /// Writes the DSCP value shifted into the high six bits of the TOS
    /// octet, leaving the ECN bits zero.
    pub fn set_dscp(&self, dscp: u8) -> io::Result<()> {
        socket2::SockRef::from(&self.shared.socket).set_tos(u32::from(dscp) << 2)
    }

    pub fn set_multicast_loopback(&self, enable: bool) -> io::Result<()> {
        self.shared.socket.set_multicast_loop_v4(enable)
    }

    pub fn set_multicast_interface(&self, interface: Ipv4Addr) -> io::Result<()> {
        socket2::SockRef::from(&self.shared.socket).set_multicast_if_v4(&interface)
    }
}

/// Keeps a multicast membership alive. Dropping the last subscription for
/// a (group, interface) pair leaves the group.
pub struct MulticastSubscription {
    shared: Rc<Shared>,
    group: Ipv4Addr,
    interface: Ipv4Addr,
}

impl Drop for MulticastSubscription {
    fn drop(&mut self) {
        let key = (self.group, self.interface);
        let mut groups = self.shared.groups.borrow_mut();

        let Some(count) = groups.get_mut(&key) else {
            return;
        };

        *count -= 1;
        if *count == 0 {
            groups.remove(&key);
            if let Err(e) = self.shared.socket.leave_multicast_v4(&self.group, &self.interface) {
                log::warn!("leaving multicast group {}: {e}", self.group);
            } else {
                log::debug!("left multicast group {} on {}", self.group, self.interface);
            }
        }
    }
}
