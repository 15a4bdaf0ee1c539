//! The delay request-response dialog for one Sync, IEEE 1588-2019 11.3.
//!
//! A sequence lives from Sync reception until the Delay_Resp arrives or
//! the owning port abandons it. The four timestamps:
//!
//! t1  Sync origin (or the Follow_Up precise origin when two-step)
//! t2  Sync receive time, measured locally
//! t3  Delay_Req send time, measured locally
//! t4  Delay_Req receive time at the master, from the Delay_Resp

use std::time::{Duration, Instant};

use rand::Rng;

use crate::datasets::PortDs;
use crate::message::{DelayReq, DelayResp, FollowUp, Header, MessageType, Sync, HEADER_SIZE};
use crate::time::{TimeInterval, Timestamp};
use crate::types::PortIdentity;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SequenceState {
    SyncReceived,
    AwaitingFollowUp,
    DelayReqSendScheduled,
    AwaitingDelayResp,
    DelayRespReceived,
}

/// One in-flight request-response measurement.
#[derive(Debug)]
pub struct DelaySequence {
    state: SequenceState,
    sync_header: Header,
    two_step: bool,
    send_delay_req_at: Instant,
    sync_correction: i64,
    follow_up_correction: i64,
    delay_resp_correction: i64,
    t1: Timestamp,
    t2: Timestamp,
    t3: Timestamp,
    t4: Timestamp,
    requesting_port_identity: PortIdentity,
}

impl DelaySequence {
    /// Starts a sequence from a received Sync. When the two-step flag is
    /// clear there is no Follow_Up to wait for, and the Delay_Req send is
    /// scheduled immediately.
    pub fn new(sync: &Sync, receive_time: Timestamp, port_ds: &PortDs, now: Instant) -> DelaySequence {
        let two_step = sync.is_two_step();
        let mut sequence = DelaySequence {
            state: SequenceState::SyncReceived,
            sync_header: sync.header,
            two_step,
            send_delay_req_at: now,
            sync_correction: sync.header.correction_field,
            follow_up_correction: 0,
            delay_resp_correction: 0,
            t1: sync.origin_timestamp,
            t2: receive_time,
            t3: Timestamp::default(),
            t4: Timestamp::default(),
            requesting_port_identity: port_ds.port_identity,
        };

        if two_step {
            sequence.state = SequenceState::AwaitingFollowUp;
        } else {
            sequence.schedule_delay_req(port_ds, now);
        }

        sequence
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn sequence_id(&self) -> u16 {
        self.sync_header.sequence_id
    }

    /// True when `header` belongs to this dialog: same source port and
    /// sequence id as the Sync that opened it.
    pub fn matches(&self, header: &Header) -> bool {
        header.source_port_identity == self.sync_header.source_port_identity
            && header.sequence_id == self.sync_header.sequence_id
    }

    /// Takes the precise origin timestamp from a Follow_Up. Ignored unless
    /// a Follow_Up is expected.
    pub fn on_follow_up(&mut self, follow_up: &FollowUp, port_ds: &PortDs, now: Instant) -> bool {
        if self.state != SequenceState::AwaitingFollowUp {
            log::debug!(
                "follow-up for sequence_id={} in unexpected state {:?}, dropping",
                self.sequence_id(),
                self.state
            );
            return false;
        }

        self.follow_up_correction = follow_up.header.correction_field;
        self.t1 = follow_up.precise_origin_timestamp;
        self.schedule_delay_req(port_ds, now);
        true
    }

    /// Takes the master's receive timestamp from a Delay_Resp.
    pub fn on_delay_resp(&mut self, delay_resp: &DelayResp) -> bool {
        if self.state != SequenceState::AwaitingDelayResp {
            log::debug!(
                "delay-resp for sequence_id={} in unexpected state {:?}, dropping",
                self.sequence_id(),
                self.state
            );
            return false;
        }

        if delay_resp.requesting_port_identity != self.requesting_port_identity {
            return false;
        }

        self.delay_resp_correction = delay_resp.header.correction_field;
        self.t4 = delay_resp.receive_timestamp;
        self.state = SequenceState::DelayRespReceived;
        true
    }

    /// When the scheduled Delay_Req should go out, if one is pending.
    pub fn delay_req_send_time(&self) -> Option<Instant> {
        match self.state {
            SequenceState::DelayReqSendScheduled => Some(self.send_delay_req_at),
            _ => None,
        }
    }

    /// Builds the Delay_Req for this sequence. Only valid while a send is
    /// scheduled.
    pub fn create_delay_req(&self) -> DelayReq {
        debug_assert_eq!(self.state, SequenceState::DelayReqSendScheduled);

        let mut header = self.sync_header;
        header.message_type = MessageType::DELAY_REQ;
        header.message_length = (HEADER_SIZE + DelayReq::BODY_SIZE) as u16;
        header.source_port_identity = self.requesting_port_identity;
        header.correction_field = 0;
        header.flags = crate::message::FlagField::empty();
        header.log_message_interval = 0x7f;

        DelayReq { header, origin_timestamp: Timestamp::default() }
    }

    /// Records the local send time of the Delay_Req.
    pub fn mark_delay_req_sent(&mut self, sent_at: Timestamp) {
        debug_assert_eq!(self.state, SequenceState::DelayReqSendScheduled);
        self.t3 = sent_at;
        self.state = SequenceState::AwaitingDelayResp;
    }

    /// `((t2 - t3) + (t4 - t1) - corrections) / 2`, valid once the
    /// Delay_Resp arrived.
    pub fn mean_path_delay(&self) -> TimeInterval {
        debug_assert_eq!(self.state, SequenceState::DelayRespReceived);

        let t1 = self.t1.to_interval();
        let t2 = self.t2.to_interval();
        let t3 = self.t3.to_interval();
        let t4 = self.t4.to_interval();

        let mut correction = TimeInterval::from_scaled_nanos(self.sync_correction)
            + TimeInterval::from_scaled_nanos(self.delay_resp_correction);
        if self.two_step {
            correction = correction + TimeInterval::from_scaled_nanos(self.follow_up_correction);
        }

        TimeInterval(((t2 - t3) + (t4 - t1) - correction).as_nanos() / 2)
    }

    /// `(offset_from_master, mean_path_delay)` in nanoseconds.
    pub fn offset_from_master(&self) -> (TimeInterval, TimeInterval) {
        let mean_delay = self.mean_path_delay();
        let offset = (self.t2 - self.t1)
            - mean_delay
            - TimeInterval::from_scaled_nanos(self.sync_correction);
        (offset, mean_delay)
    }

    /// Picks a uniformly jittered send time within
    /// `[0, 2^(logMinDelayReqInterval + 1))` seconds, 9.5.11.2.
    fn schedule_delay_req(&mut self, port_ds: &PortDs, now: Instant) {
        let max_interval =
            Duration::from_secs_f64(f64::powi(2.0, i32::from(port_ds.log_min_delay_req_interval) + 1));
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..max_interval);
        self.send_delay_req_at = now + jitter;
        self.state = SequenceState::DelayReqSendScheduled;
    }
}
