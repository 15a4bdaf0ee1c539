//! Port state decisions, IEEE 1588-2019 9.3.5.

use crate::bmca::{ComparisonDataSet, ComparisonResult};
use crate::datasets::DefaultDs;
use crate::message::Announce;
use crate::types::PortIdentity;

/// State decision codes, Tables 30-33.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateDecision {
    /// Master: a clockClass 1-127 instance that is the grandmaster of the
    /// domain.
    M1,
    /// Master: a clockClass 128+ instance that is the grandmaster of the
    /// domain.
    M2,
    /// Master on a port that is not on the grandmaster instance.
    M3,
    /// Slave.
    S1,
    /// Passive: a clockClass 1-127 instance yielding or breaking a loop.
    P1,
    /// Passive: a clockClass 128+ instance breaking a timing loop.
    P2,
    /// No qualified master seen; remain listening.
    Listening,
}

/// The recommended-state computation for one port.
///
/// `e_best` is the best qualified Announce across the instance;
/// `e_rbest` the best on this port. Only the ordinary slave-capable
/// subset is exercised here: a slave-only clock can never be elected
/// master, so with any qualified Announce in sight the decision is S1.
pub fn recommended_state(
    default_ds: &DefaultDs,
    e_best: Option<&Announce>,
    receiver: PortIdentity,
) -> StateDecision {
    let Some(best) = e_best else {
        return if default_ds.slave_only {
            StateDecision::Listening
        } else {
            // no master in sight: a master-capable clock takes over
            if default_ds.clock_quality.clock_class < 128 {
                StateDecision::M1
            } else {
                StateDecision::M2
            }
        };
    };

    if default_ds.slave_only {
        return StateDecision::S1;
    }

    let d0 = ComparisonDataSet::from_default_ds(default_ds);
    let best_set = ComparisonDataSet::from_announce(best, receiver);

    if default_ds.clock_quality.clock_class < 128 {
        // class 1-127 clocks never leave master for a foreign grandmaster
        return if d0.compare(&best_set) >= ComparisonResult::BetterByTopology {
            StateDecision::M1
        } else {
            StateDecision::P1
        };
    }

    match d0.compare(&best_set) {
        ComparisonResult::Better | ComparisonResult::BetterByTopology => StateDecision::M2,
        _ => StateDecision::S1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FlagField, Header, MessageType, HEADER_SIZE};
    use crate::time::Timestamp;
    use crate::types::{ClockIdentity, ClockQuality, SdoId, TimeSource, Version};

    fn grandmaster_announce() -> Announce {
        Announce {
            header: Header {
                sdo_id: SdoId(0),
                message_type: MessageType::ANNOUNCE,
                version: Version::default(),
                message_length: (HEADER_SIZE + Announce::BODY_SIZE) as u16,
                domain_number: 0,
                flags: FlagField::PTP_TIMESCALE,
                correction_field: 0,
                source_port_identity: PortIdentity::new(ClockIdentity([2; 8]), 1),
                sequence_id: 1,
                log_message_interval: 1,
            },
            origin_timestamp: Timestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority1: 128,
            grandmaster_clock_quality: ClockQuality {
                clock_class: 6,
                clock_accuracy: crate::types::ClockAccuracy::WITHIN_100_NS,
                offset_scaled_log_variance: 0x4000,
            },
            grandmaster_priority2: 128,
            grandmaster_identity: ClockIdentity([2; 8]),
            steps_removed: 0,
            time_source: TimeSource::GNSS,
        }
    }

    #[test]
    fn slave_only_is_s1_with_a_master_in_sight() {
        let default_ds = DefaultDs::new(true);
        let receiver = PortIdentity::new(ClockIdentity([1; 8]), 1);
        let announce = grandmaster_announce();
        assert_eq!(
            recommended_state(&default_ds, Some(&announce), receiver),
            StateDecision::S1
        );
    }

    #[test]
    fn slave_only_listens_without_masters() {
        let default_ds = DefaultDs::new(true);
        let receiver = PortIdentity::new(ClockIdentity([1; 8]), 1);
        assert_eq!(recommended_state(&default_ds, None, receiver), StateDecision::Listening);
    }

    #[test]
    fn default_class_clock_yields_to_a_better_master() {
        let default_ds = DefaultDs::new(false); // class 248
        let receiver = PortIdentity::new(ClockIdentity([1; 8]), 1);
        let announce = grandmaster_announce(); // class 6
        assert_eq!(
            recommended_state(&default_ds, Some(&announce), receiver),
            StateDecision::S1
        );
        assert_eq!(recommended_state(&default_ds, None, receiver), StateDecision::M2);
    }
}
