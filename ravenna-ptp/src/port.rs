//! A PTP port: two sockets, a foreign-master list, and the in-flight
//! delay sequences.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::BorrowedFd;
use std::time::Instant;

use ravenna_net::{Datagram, ListenError, MulticastSubscription, UdpSenderReceiver};

use crate::bmca::ForeignMasterList;
use crate::datasets::PortDs;
use crate::instance::InstanceState;
use crate::message::{DelayResp, FollowUp, Message, Sync};
use crate::sequence::DelaySequence;
use crate::time::TimeInterval;
use crate::types::{PortIdentity, PortState};
use crate::{EVENT_PORT, GENERAL_PORT, MULTICAST_ADDR};

/// Offsets at or above this magnitude step the clock instead of steering
/// it.
const STEP_THRESHOLD_SECS: f64 = 1.0;

/// Residual offset below which the servo asserts calibration.
const CALIBRATION_THRESHOLD_SECS: f64 = 0.001;

/// Sequences not completed within this many seconds are abandoned.
const SEQUENCE_TIMEOUT_SECS: u64 = 5;

const RECV_BUFFER_SIZE: usize = 1500;

pub struct PtpPort {
    port_ds: PortDs,
    event_socket: UdpSenderReceiver,
    general_socket: UdpSenderReceiver,
    _subscriptions: Vec<MulticastSubscription>,
    foreign_masters: ForeignMasterList,
    sequences: HashMap<(PortIdentity, u16), (DelaySequence, Instant)>,
    announce_deadline: Option<Instant>,
    qualification_changed: bool,
}

impl PtpPort {
    /// Opens the event (319) and general (320) sockets and joins the PTP
    /// multicast group on `interface_addr`. The port comes up listening.
    pub fn new(interface_addr: Ipv4Addr, port_identity: PortIdentity) -> Result<PtpPort, ListenError> {
        let mut port_ds = PortDs::new(port_identity);
        port_ds.port_state = PortState::Initializing;

        let event_socket = UdpSenderReceiver::open(Ipv4Addr::UNSPECIFIED, EVENT_PORT)?;
        let general_socket = UdpSenderReceiver::open(Ipv4Addr::UNSPECIFIED, GENERAL_PORT)?;

        let subscriptions = vec![
            event_socket.join_multicast_group(MULTICAST_ADDR, interface_addr)?,
            general_socket.join_multicast_group(MULTICAST_ADDR, interface_addr)?,
        ];

        if let Err(e) = event_socket.set_multicast_interface(interface_addr) {
            log::warn!("setting multicast interface on event socket: {e}");
        }

        port_ds.port_state = PortState::Listening;

        Ok(PtpPort {
            foreign_masters: ForeignMasterList::new(port_identity),
            port_ds,
            event_socket,
            general_socket,
            _subscriptions: subscriptions,
            sequences: HashMap::new(),
            announce_deadline: None,
            qualification_changed: false,
        })
    }

    pub fn port_ds(&self) -> &PortDs {
        &self.port_ds
    }

    pub fn port_identity(&self) -> PortIdentity {
        self.port_ds.port_identity
    }

    pub fn state(&self) -> PortState {
        self.port_ds.port_state
    }

    pub fn foreign_masters(&self) -> &ForeignMasterList {
        &self.foreign_masters
    }

    pub fn fds(&self) -> [BorrowedFd<'_>; 2] {
        [self.event_socket.as_fd(), self.general_socket.as_fd()]
    }

    /// True once a qualification-relevant Announce arrived since the last
    /// BMCA evaluation. Reading clears the flag.
    pub fn take_qualification_changed(&mut self) -> bool {
        std::mem::take(&mut self.qualification_changed)
    }

    /// Drains both sockets and dispatches every queued datagram.
    pub fn handle_ready(&mut self, state: &mut InstanceState) {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        for socket in [self.event_socket.clone(), self.general_socket.clone()] {
            loop {
                match socket.try_recv(&mut buffer) {
                    Ok(Some(datagram)) => self.handle_datagram(state, &datagram),
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("ptp receive error: {e}");
                        break;
                    }
                }
            }
        }
    }

    /// Parses and dispatches one datagram.
    pub fn handle_datagram(&mut self, state: &mut InstanceState, datagram: &Datagram) {
        if datagram.payload.is_empty() {
            log::trace!("dropping zero-length datagram from {}", datagram.source);
            return;
        }

        let (message, tlvs) = match Message::parse(&datagram.payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("dropping malformed ptp datagram from {}: {e}", datagram.source);
                return;
            }
        };

        if !tlvs.is_empty() {
            log::trace!("ignoring {} tlv bytes on {}", tlvs.len(), message.header().message_type);
        }

        if message.header().domain_number != state.default_ds.domain_number {
            log::trace!(
                "dropping message for foreign domain {}",
                message.header().domain_number
            );
            return;
        }

        if message.header().source_port_identity.clock_identity
            == self.port_ds.port_identity.clock_identity
        {
            log::trace!("ignoring own message");
            return;
        }

        let now = Instant::now();

        match message {
            Message::Announce(announce) => self.handle_announce(state, announce, now),
            Message::Sync(sync) => self.handle_sync(state, sync, datagram.recv_time, now),
            Message::FollowUp(follow_up) => self.handle_follow_up(follow_up, now),
            Message::DelayResp(delay_resp) => self.handle_delay_resp(state, delay_resp),
            Message::DelayReq(_) => {
                // a slave-only port never answers delay requests
                log::trace!("ignoring delay request on slave-only port");
            }
            Message::PdelayReq(_) | Message::PdelayResp(_) | Message::PdelayRespFollowUp(_) => {
                log::trace!("peer delay mechanism not in use, dropping");
            }
            Message::Other(header) => {
                log::warn!("unhandled ptp message type {}", header.message_type);
            }
        }
    }

    fn handle_announce(&mut self, state: &mut InstanceState, announce: crate::message::Announce, now: Instant) {
        match self.port_ds.port_state {
            PortState::Initializing | PortState::Disabled | PortState::Faulty => {
                log::trace!("discarding announce in state {}", self.port_ds.port_state);
                return;
            }
            _ => {}
        }

        log::trace!(
            "announce from {} gm={} steps_removed={}",
            announce.header.source_port_identity,
            announce.grandmaster_identity,
            announce.steps_removed,
        );

        self.foreign_masters.add_or_update(&announce, now);
        self.qualification_changed = true;

        // the parent is still alive
        if announce.header.source_port_identity == state.parent_ds.parent_port_identity {
            self.reset_announce_deadline(now);
        }
    }

    fn handle_sync(&mut self, state: &mut InstanceState, sync: Sync, recv_time_nanos: u64, now: Instant) {
        if !matches!(self.port_ds.port_state, PortState::Uncalibrated | PortState::Slave) {
            log::trace!("ignoring sync in state {}", self.port_ds.port_state);
            return;
        }

        if sync.header.source_port_identity != state.parent_ds.parent_port_identity {
            log::trace!("ignoring sync from non-parent {}", sync.header.source_port_identity);
            return;
        }

        let key = (sync.header.source_port_identity, sync.header.sequence_id);
        if self.sequences.contains_key(&key) {
            log::debug!("duplicate sync sequence_id={}, keeping first", sync.header.sequence_id);
            return;
        }

        let receive_time = state.clock.adjusted_at(recv_time_nanos as f64 / 1e9);
        let sequence = DelaySequence::new(&sync, receive_time, &self.port_ds, now);
        self.sequences.insert(key, (sequence, now));
    }

    fn handle_follow_up(&mut self, follow_up: FollowUp, now: Instant) {
        let key = (follow_up.header.source_port_identity, follow_up.header.sequence_id);
        let Some((sequence, _)) = self.sequences.get_mut(&key) else {
            log::trace!(
                "follow-up without a matching sync, sequence_id={}",
                follow_up.header.sequence_id
            );
            return;
        };

        sequence.on_follow_up(&follow_up, &self.port_ds, now);
    }

    fn handle_delay_resp(&mut self, state: &mut InstanceState, delay_resp: DelayResp) {
        if delay_resp.requesting_port_identity != self.port_ds.port_identity {
            return; // answer to some other slave's request
        }

        let key = (delay_resp.header.source_port_identity, delay_resp.header.sequence_id);
        let Some((sequence, _)) = self.sequences.get_mut(&key) else {
            log::trace!(
                "delay-resp without a matching sequence, sequence_id={}",
                delay_resp.header.sequence_id
            );
            return;
        };

        if sequence.on_delay_resp(&delay_resp) {
            let (sequence, _) = self.sequences.remove(&key).expect("sequence present");
            self.complete_measurement(state, &sequence);
        }
    }

    /// Feeds one finished measurement into the servo and the datasets.
    fn complete_measurement(&mut self, state: &mut InstanceState, sequence: &DelaySequence) {
        let (offset, mean_delay) = sequence.offset_from_master();
        let offset_secs = offset.as_secs_f64();

        if !state.clock.is_valid() || offset_secs.abs() >= STEP_THRESHOLD_SECS {
            log::info!("stepping clock by {offset}");
            state.clock.step(offset_secs);
        } else {
            log::debug!("adjusting clock by {offset}, mean_path_delay={mean_delay}");
            state.clock.adjust(offset_secs);
        }

        state.clock.set_calibrated(offset_secs.abs() < CALIBRATION_THRESHOLD_SECS);

        state.mean_delay_filter.observe(mean_delay.as_nanos());
        state.current_ds.offset_from_master = offset;
        state.current_ds.mean_delay = TimeInterval::from_nanos(
            state.mean_delay_filter.median().unwrap_or(mean_delay.as_nanos()),
        );
        self.port_ds.mean_link_delay = state.current_ds.mean_delay;

        // sync lock established: uncalibrated -> slave
        if self.port_ds.port_state == PortState::Uncalibrated && state.clock.is_calibrated() {
            log::info!("port {} entering slave state", self.port_ds.port_identity);
            self.port_ds.port_state = PortState::Slave;
        }

        state.publish_clock_status();
    }

    /// Runs the port's timers: announce receipt timeout, scheduled
    /// Delay_Req sends, and stale-record cleanup.
    pub fn poll_timers(&mut self, state: &mut InstanceState, now: Instant) {
        self.foreign_masters.prune(now, self.port_ds.announce_interval());

        if let Some(deadline) = self.announce_deadline {
            if now >= deadline
                && matches!(self.port_ds.port_state, PortState::Uncalibrated | PortState::Slave)
            {
                log::warn!(
                    "announce receipt timeout on port {}, returning to listening",
                    self.port_ds.port_identity
                );
                self.port_ds.port_state = PortState::Listening;
                self.announce_deadline = None;
                self.sequences.clear();
                self.qualification_changed = true;
                state.publish_clock_status();
            }
        }

        self.send_due_delay_reqs(state, now);

        self.sequences.retain(|_, (sequence, started)| {
            let stale = now.duration_since(*started).as_secs() >= SEQUENCE_TIMEOUT_SECS;
            if stale {
                log::debug!("abandoning delay sequence_id={}", sequence.sequence_id());
            }
            !stale
        });
    }

    fn send_due_delay_reqs(&mut self, state: &mut InstanceState, now: Instant) {
        let due: Vec<(PortIdentity, u16)> = self
            .sequences
            .iter()
            .filter(|(_, (sequence, _))| {
                sequence.delay_req_send_time().is_some_and(|at| at <= now)
            })
            .map(|(key, _)| *key)
            .collect();

        for key in due {
            let Some((sequence, _)) = self.sequences.get_mut(&key) else {
                continue;
            };

            let delay_req = sequence.create_delay_req();
            let destination = SocketAddrV4::new(MULTICAST_ADDR, EVENT_PORT);
            match self.event_socket.send_to(&delay_req.encode(), destination) {
                Ok(_) => {
                    sequence.mark_delay_req_sent(state.clock.now());
                }
                Err(e) => {
                    log::warn!("sending delay request: {e}");
                    self.sequences.remove(&key);
                }
            }
        }
    }

    /// The next instant at which [`PtpPort::poll_timers`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        let delay_req = self
            .sequences
            .values()
            .filter_map(|(sequence, _)| sequence.delay_req_send_time())
            .min();

        match (self.announce_deadline, delay_req) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (deadline, None) => deadline,
            (None, send) => send,
        }
    }

    pub(crate) fn reset_announce_deadline(&mut self, now: Instant) {
        self.announce_deadline = Some(now + self.port_ds.announce_receipt_timeout_interval());
    }

    pub(crate) fn set_state(&mut self, port_state: PortState) {
        if self.port_ds.port_state != port_state {
            log::info!("port {} state {} -> {}", self.port_ds.port_identity, self.port_ds.port_state, port_state);
            self.port_ds.port_state = port_state;
        }
    }

    /// Abandons in-flight sequences, used when the port leaves the slave
    /// path.
    pub(crate) fn clear_sequences(&mut self) {
        self.sequences.clear();
    }

}
