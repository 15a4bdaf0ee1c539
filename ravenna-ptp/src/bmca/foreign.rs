use std::time::Instant;

use ravenna_core::util::SequenceNumber;

use crate::message::Announce;
use crate::types::PortIdentity;

use super::{ComparisonDataSet, ComparisonResult};

/// Announce intervals a record stays fresh for, 9.3.2.4.
pub const FOREIGN_MASTER_TIME_WINDOW: u32 = 4;

/// Announce messages required within the window before a foreign master
/// qualifies, 9.3.2.5.
pub const FOREIGN_MASTER_THRESHOLD: usize = 2;

/// Records always reserved per port.
const MIN_CAPACITY: usize = 5;

/// One tracked foreign master.
#[derive(Debug, Clone)]
pub struct ForeignMasterEntry {
    pub foreign_master_port_identity: PortIdentity,
    /// Announce messages received within the current window. New records
    /// start at zero, 9.5.3 b).
    pub messages_in_window: usize,
    pub most_recent_announce: Option<Announce>,
    pub last_seen: Instant,
}

/// The per-port list of potential masters, 9.3.2.4.
#[derive(Debug)]
pub struct ForeignMasterList {
    entries: Vec<ForeignMasterEntry>,
    port_identity: PortIdentity,
}

impl ForeignMasterList {
    pub fn new(port_identity: PortIdentity) -> ForeignMasterList {
        ForeignMasterList { entries: Vec::with_capacity(MIN_CAPACITY), port_identity }
    }

    /// Qualification of Announce messages, IEEE 1588-2019 9.3.2.5.
    pub fn is_qualified(&self, announce: &Announce) -> bool {
        let sender = announce.header.source_port_identity;

        // a) messages from our own instance never qualify; every port of an
        // instance shares the clock identity
        if sender.clock_identity == self.port_identity.clock_identity {
            log::trace!("announce not qualified: own instance");
            return false;
        }

        if let Some(entry) = self.find(sender) {
            // b) must be strictly newer than the stored announce
            if let Some(previous) = &entry.most_recent_announce {
                if SequenceNumber::new(announce.header.sequence_id)
                    <= SequenceNumber::new(previous.header.sequence_id)
                {
                    log::trace!("announce not qualified: stale sequence_id={}", announce.header.sequence_id);
                    return false;
                }
            }

            // c) fewer than the threshold within the window
            if entry.messages_in_window < FOREIGN_MASTER_THRESHOLD {
                log::trace!(
                    "announce not qualified: {} of {} messages in window",
                    entry.messages_in_window,
                    FOREIGN_MASTER_THRESHOLD
                );
                return false;
            }
        } else {
            log::trace!("announce not qualified: unknown foreign master {sender}");
            return false;
        }

        // d) steps_removed of 255 or greater is discarded
        if announce.steps_removed >= 255 {
            log::trace!("announce not qualified: steps_removed={}", announce.steps_removed);
            return false;
        }

        true
    }

    /// Records an Announce, creating the foreign-master record on first
    /// sight.
    pub fn add_or_update(&mut self, announce: &Announce, now: Instant) {
        let sender = announce.header.source_port_identity;

        if let Some(entry) = self.find_mut(sender) {
            entry.messages_in_window += 1;
            entry.most_recent_announce = Some(announce.clone());
            entry.last_seen = now;
        } else {
            self.entries.push(ForeignMasterEntry {
                foreign_master_port_identity: sender,
                messages_in_window: 0,
                most_recent_announce: Some(announce.clone()),
                last_seen: now,
            });
        }
    }

    /// Drops records not refreshed within the foreign-master time window.
    pub fn prune(&mut self, now: Instant, announce_interval: std::time::Duration) {
        let window = announce_interval * FOREIGN_MASTER_TIME_WINDOW;
        self.entries.retain(|entry| {
            let fresh = now.duration_since(entry.last_seen) <= window;
            if !fresh {
                log::debug!(
                    "pruning stale foreign master {}",
                    entry.foreign_master_port_identity
                );
            }
            fresh
        });
    }

    /// A stored record qualifies for election once enough messages arrived
    /// in the window. Unlike [`ForeignMasterList::is_qualified`] there is
    /// no sequence-id check: the record is not competing with itself.
    fn is_eligible(&self, entry: &ForeignMasterEntry) -> bool {
        let Some(announce) = &entry.most_recent_announce else {
            return false;
        };
        announce.header.source_port_identity.clock_identity
            != self.port_identity.clock_identity
            && entry.messages_in_window >= FOREIGN_MASTER_THRESHOLD
            && announce.steps_removed < 255
    }

    /// Elects E_best: the best qualified Announce on this port.
    pub fn best(&self) -> Option<&Announce> {
        let mut best: Option<&Announce> = None;

        for entry in &self.entries {
            if !self.is_eligible(entry) {
                continue;
            }
            let Some(announce) = &entry.most_recent_announce else {
                continue;
            };

            best = match best {
                None => Some(announce),
                Some(current) => {
                    let challenger = ComparisonDataSet::from_announce(announce, self.port_identity);
                    let incumbent = ComparisonDataSet::from_announce(current, self.port_identity);
                    if challenger.compare(&incumbent) >= ComparisonResult::BetterByTopology {
                        Some(announce)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ForeignMasterEntry] {
        &self.entries
    }

    fn find(&self, identity: PortIdentity) -> Option<&ForeignMasterEntry> {
        self.entries.iter().find(|e| e.foreign_master_port_identity == identity)
    }

    fn find_mut(&mut self, identity: PortIdentity) -> Option<&mut ForeignMasterEntry> {
        self.entries.iter_mut().find(|e| e.foreign_master_port_identity == identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FlagField, Header, MessageType, HEADER_SIZE};
    use crate::time::Timestamp;
    use crate::types::{ClockIdentity, ClockQuality, SdoId, TimeSource, Version};
    use std::time::Duration;

    fn announce(sender: ClockIdentity, sequence_id: u16, steps_removed: u16) -> Announce {
        Announce {
            header: Header {
                sdo_id: SdoId(0),
                message_type: MessageType::ANNOUNCE,
                version: Version::default(),
                message_length: (HEADER_SIZE + Announce::BODY_SIZE) as u16,
                domain_number: 0,
                flags: FlagField::empty(),
                correction_field: 0,
                source_port_identity: PortIdentity::new(sender, 1),
                sequence_id,
                log_message_interval: 1,
            },
            origin_timestamp: Timestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority1: 128,
            grandmaster_clock_quality: ClockQuality::new(false),
            grandmaster_priority2: 128,
            grandmaster_identity: sender,
            steps_removed,
            time_source: TimeSource::GNSS,
        }
    }

    fn list() -> ForeignMasterList {
        ForeignMasterList::new(PortIdentity::new(ClockIdentity([0x10; 8]), 1))
    }

    #[test]
    fn qualification_requires_two_messages_in_window() {
        let mut list = list();
        let sender = ClockIdentity([1; 8]);
        let now = Instant::now();

        // never seen
        assert!(!list.is_qualified(&announce(sender, 1, 0)));

        // first sight starts the record at zero messages
        list.add_or_update(&announce(sender, 1, 0), now);
        assert!(!list.is_qualified(&announce(sender, 2, 0)));

        list.add_or_update(&announce(sender, 2, 0), now);
        assert!(!list.is_qualified(&announce(sender, 3, 0)));

        list.add_or_update(&announce(sender, 3, 0), now);
        assert!(list.is_qualified(&announce(sender, 4, 0)));
    }

    #[test]
    fn own_instance_never_qualifies() {
        let mut list = list();
        let own = ClockIdentity([0x10; 8]);
        let now = Instant::now();
        for seq in 1..5 {
            list.add_or_update(&announce(own, seq, 0), now);
        }
        assert!(!list.is_qualified(&announce(own, 5, 0)));
    }

    #[test]
    fn stale_sequence_ids_do_not_qualify() {
        let mut list = list();
        let sender = ClockIdentity([1; 8]);
        let now = Instant::now();
        for seq in 1..5 {
            list.add_or_update(&announce(sender, seq, 0), now);
        }
        assert!(list.is_qualified(&announce(sender, 5, 0)));
        assert!(!list.is_qualified(&announce(sender, 4, 0)));
        assert!(!list.is_qualified(&announce(sender, 3, 0)));
    }

    #[test]
    fn steps_removed_255_fails_qualification() {
        let mut list = list();
        let sender = ClockIdentity([1; 8]);
        let now = Instant::now();
        for seq in 1..5 {
            list.add_or_update(&announce(sender, seq, 0), now);
        }
        assert!(!list.is_qualified(&announce(sender, 5, 255)));
        assert!(!list.is_qualified(&announce(sender, 5, 300)));
        assert!(list.is_qualified(&announce(sender, 5, 254)));
    }

    #[test]
    fn prune_drops_silent_masters() {
        let mut list = list();
        let sender = ClockIdentity([1; 8]);
        let start = Instant::now();
        list.add_or_update(&announce(sender, 1, 0), start);
        assert_eq!(list.len(), 1);

        let interval = Duration::from_secs(2);
        list.prune(start + interval * 2, interval);
        assert_eq!(list.len(), 1);

        list.prune(start + interval * 5, interval);
        assert!(list.is_empty());
    }

    #[test]
    fn best_prefers_lower_priority() {
        let mut list = list();
        let now = Instant::now();
        let good = ClockIdentity([1; 8]);
        let better = ClockIdentity([2; 8]);

        for seq in 1..4 {
            list.add_or_update(&announce(good, seq, 0), now);
            let mut preferred = announce(better, seq, 0);
            preferred.grandmaster_priority1 = 100;
            list.add_or_update(&preferred, now);
        }

        let best = list.best().expect("one announce should qualify");
        assert_eq!(best.grandmaster_identity, better);
    }
}
