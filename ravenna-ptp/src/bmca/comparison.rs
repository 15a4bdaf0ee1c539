use crate::datasets::DefaultDs;
use crate::message::Announce;
use crate::types::{ClockIdentity, ClockQuality, PortIdentity};

/// The outcome of comparing two datasets, IEEE 1588-2019 Figures 28 and 29.
///
/// The declaration order defines a total ordering over outcomes and is
/// relied upon when electing the best foreign master.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonResult {
    /// The set is worse than the one compared against.
    Worse,
    /// Equal quality, worse by topology.
    WorseByTopology,
    /// Both sets describe the same grandmaster through the same sender and
    /// receiver. A message was transmitted and received on one port; this
    /// should not occur.
    Error1,
    /// The sets are duplicates of the same Announce.
    Error2,
    /// Equal quality, preferred by topology.
    BetterByTopology,
    /// The set is better than the one compared against.
    Better,
}

/// The derived view over an Announce (or the local default data set) that
/// the BMCA orders, IEEE 1588-2019 9.3.4.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonDataSet {
    pub gm_priority1: u8,
    pub gm_identity: ClockIdentity,
    pub gm_clock_quality: ClockQuality,
    pub gm_priority2: u8,
    pub steps_removed: u16,
    pub identity_of_senders: ClockIdentity,
    pub identity_of_receiver: PortIdentity,
}

impl ComparisonDataSet {
    pub fn from_announce(announce: &Announce, receiver: PortIdentity) -> ComparisonDataSet {
        ComparisonDataSet {
            gm_priority1: announce.grandmaster_priority1,
            gm_identity: announce.grandmaster_identity,
            gm_clock_quality: announce.grandmaster_clock_quality,
            gm_priority2: announce.grandmaster_priority2,
            steps_removed: announce.steps_removed,
            identity_of_senders: announce.header.source_port_identity.clock_identity,
            identity_of_receiver: receiver,
        }
    }

    /// The local clock viewed as its own grandmaster (D0).
    pub fn from_default_ds(default_ds: &DefaultDs) -> ComparisonDataSet {
        ComparisonDataSet {
            gm_priority1: default_ds.priority1,
            gm_identity: default_ds.clock_identity,
            gm_clock_quality: default_ds.clock_quality,
            gm_priority2: default_ds.priority2,
            steps_removed: 0,
            identity_of_senders: default_ds.clock_identity,
            identity_of_receiver: PortIdentity::new(default_ds.clock_identity, 0),
        }
    }

    /// Compares `self` (A) against `other` (B) per IEEE 1588-2019 9.3.4.
    pub fn compare(&self, other: &ComparisonDataSet) -> ComparisonResult {
        if self.gm_identity == other.gm_identity {
            return self.compare_topology(other);
        }

        // part 1: dataset ordering, lower values win
        macro_rules! order_on {
            ($field:expr, $other:expr) => {
                if $field < $other {
                    return ComparisonResult::Better;
                }
                if $field > $other {
                    return ComparisonResult::Worse;
                }
            };
        }

        order_on!(self.gm_priority1, other.gm_priority1);
        order_on!(self.gm_clock_quality.clock_class, other.gm_clock_quality.clock_class);
        order_on!(self.gm_clock_quality.clock_accuracy, other.gm_clock_quality.clock_accuracy);
        order_on!(
            self.gm_clock_quality.offset_scaled_log_variance,
            other.gm_clock_quality.offset_scaled_log_variance
        );
        order_on!(self.gm_priority2, other.gm_priority2);
        order_on!(self.gm_identity, other.gm_identity);

        // distinct grandmaster identities cannot compare equal
        unreachable!("grandmaster identities already compared unequal");
    }

    /// Part 2: both sets describe the same grandmaster, tie-break on
    /// topology.
    fn compare_topology(&self, other: &ComparisonDataSet) -> ComparisonResult {
        if u32::from(self.steps_removed) > u32::from(other.steps_removed) + 1 {
            return ComparisonResult::Worse;
        }
        if u32::from(self.steps_removed) + 1 < u32::from(other.steps_removed) {
            return ComparisonResult::Better;
        }

        if self.steps_removed > other.steps_removed {
            return if self.identity_of_receiver.clock_identity < self.identity_of_senders {
                ComparisonResult::Worse
            } else if self.identity_of_receiver.clock_identity > self.identity_of_senders {
                ComparisonResult::WorseByTopology
            } else {
                ComparisonResult::Error1
            };
        }

        if self.steps_removed < other.steps_removed {
            return if other.identity_of_receiver.clock_identity < other.identity_of_senders {
                ComparisonResult::Better
            } else if other.identity_of_receiver.clock_identity > other.identity_of_senders {
                ComparisonResult::BetterByTopology
            } else {
                ComparisonResult::Error1
            };
        }

        if self.identity_of_senders > other.identity_of_senders {
            return ComparisonResult::WorseByTopology;
        }
        if self.identity_of_senders < other.identity_of_senders {
            return ComparisonResult::BetterByTopology;
        }

        if self.identity_of_receiver.port_number > other.identity_of_receiver.port_number {
            return ComparisonResult::WorseByTopology;
        }
        if self.identity_of_receiver.port_number < other.identity_of_receiver.port_number {
            return ComparisonResult::BetterByTopology;
        }

        ComparisonResult::Error2
    }

    /// Convenience wrapper comparing two Announce messages as seen by one
    /// receiver.
    pub fn compare_announces(
        a: &Announce,
        b: &Announce,
        receiver: PortIdentity,
    ) -> ComparisonResult {
        let set_a = ComparisonDataSet::from_announce(a, receiver);
        let set_b = ComparisonDataSet::from_announce(b, receiver);
        set_a.compare(&set_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FlagField, Header, MessageType, HEADER_SIZE};
    use crate::time::Timestamp;
    use crate::types::{ClockAccuracy, SdoId, TimeSource, Version};

    fn announce(
        sender: ClockIdentity,
        gm_identity: ClockIdentity,
        gm_priority1: u8,
        steps_removed: u16,
    ) -> Announce {
        Announce {
            header: Header {
                sdo_id: SdoId(0),
                message_type: MessageType::ANNOUNCE,
                version: Version::default(),
                message_length: (HEADER_SIZE + Announce::BODY_SIZE) as u16,
                domain_number: 0,
                flags: FlagField::PTP_TIMESCALE,
                correction_field: 0,
                source_port_identity: PortIdentity::new(sender, 1),
                sequence_id: 1,
                log_message_interval: 1,
            },
            origin_timestamp: Timestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority1: gm_priority1,
            grandmaster_clock_quality: ClockQuality {
                clock_class: 6,
                clock_accuracy: ClockAccuracy::WITHIN_100_NS,
                offset_scaled_log_variance: 0x4000,
            },
            grandmaster_priority2: 128,
            grandmaster_identity: gm_identity,
            steps_removed,
            time_source: TimeSource::GNSS,
        }
    }

    fn receiver() -> PortIdentity {
        PortIdentity::new(ClockIdentity([0x10; 8]), 1)
    }

    #[test]
    fn lower_priority1_wins() {
        let a = announce(ClockIdentity([1; 8]), ClockIdentity([0xaa; 8]), 127, 0);
        let b = announce(ClockIdentity([2; 8]), ClockIdentity([0xbb; 8]), 128, 0);
        assert_eq!(ComparisonDataSet::compare_announces(&a, &b, receiver()), ComparisonResult::Better);
        assert_eq!(ComparisonDataSet::compare_announces(&b, &a, receiver()), ComparisonResult::Worse);
    }

    #[test]
    fn same_grandmaster_fewer_steps_wins() {
        let gm = ClockIdentity([0xaa; 8]);
        let a = announce(ClockIdentity([1; 8]), gm, 128, 10);
        let b = announce(ClockIdentity([2; 8]), gm, 128, 12);
        assert_eq!(ComparisonDataSet::compare_announces(&a, &b, receiver()), ComparisonResult::Better);
        assert_eq!(ComparisonDataSet::compare_announces(&b, &a, receiver()), ComparisonResult::Worse);
    }

    #[test]
    fn same_grandmaster_one_step_apart_breaks_on_identities() {
        let gm = ClockIdentity([0xaa; 8]);
        // receiver identity 0x10.. is greater than sender identity 0x01..
        let a = announce(ClockIdentity([1; 8]), gm, 128, 3);
        let b = announce(ClockIdentity([1; 8]), gm, 128, 2);
        assert_eq!(
            ComparisonDataSet::compare_announces(&a, &b, receiver()),
            ComparisonResult::WorseByTopology
        );
        assert_eq!(
            ComparisonDataSet::compare_announces(&b, &a, receiver()),
            ComparisonResult::BetterByTopology
        );
    }

    #[test]
    fn equal_steps_tie_break_on_sender_identity() {
        let gm = ClockIdentity([0xaa; 8]);
        let a = announce(ClockIdentity([1; 8]), gm, 128, 4);
        let b = announce(ClockIdentity([2; 8]), gm, 128, 4);
        assert_eq!(
            ComparisonDataSet::compare_announces(&a, &b, receiver()),
            ComparisonResult::BetterByTopology
        );
        assert_eq!(
            ComparisonDataSet::compare_announces(&b, &a, receiver()),
            ComparisonResult::WorseByTopology
        );
    }

    #[test]
    fn duplicate_announces_are_error2() {
        let gm = ClockIdentity([0xaa; 8]);
        let a = announce(ClockIdentity([1; 8]), gm, 128, 4);
        assert_eq!(
            ComparisonDataSet::compare_announces(&a, &a.clone(), receiver()),
            ComparisonResult::Error2
        );
    }

    #[test]
    fn quality_fields_order_in_sequence() {
        let mut a = announce(ClockIdentity([1; 8]), ClockIdentity([0xaa; 8]), 128, 0);
        let b = announce(ClockIdentity([2; 8]), ClockIdentity([0xbb; 8]), 128, 0);

        a.grandmaster_clock_quality.clock_class = 5;
        assert_eq!(ComparisonDataSet::compare_announces(&a, &b, receiver()), ComparisonResult::Better);

        a.grandmaster_clock_quality.clock_class = 6;
        a.grandmaster_clock_quality.clock_accuracy = ClockAccuracy::WITHIN_25_NS;
        assert_eq!(ComparisonDataSet::compare_announces(&a, &b, receiver()), ComparisonResult::Better);

        a.grandmaster_clock_quality.clock_accuracy = ClockAccuracy::WITHIN_100_NS;
        a.grandmaster_priority2 = 127;
        assert_eq!(ComparisonDataSet::compare_announces(&a, &b, receiver()), ComparisonResult::Better);

        // everything equal except the grandmaster identity: lower wins
        a.grandmaster_priority2 = 128;
        assert_eq!(ComparisonDataSet::compare_announces(&a, &b, receiver()), ComparisonResult::Better);
        assert_eq!(ComparisonDataSet::compare_announces(&b, &a, receiver()), ComparisonResult::Worse);
    }

    #[test]
    fn outcome_ordering_is_total() {
        use ComparisonResult::*;
        let mut outcomes = vec![Better, Worse, Error1, BetterByTopology, Error2, WorseByTopology];
        outcomes.sort();
        assert_eq!(
            outcomes,
            vec![Worse, WorseByTopology, Error1, Error2, BetterByTopology, Better]
        );
    }
}
