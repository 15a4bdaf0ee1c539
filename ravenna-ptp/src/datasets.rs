//! The instance and port data sets, IEEE 1588-2019 8.2.

use std::time::Duration;

use crate::message::Announce;
use crate::profile::Profile;
use crate::time::TimeInterval;
use crate::types::{
    ClockIdentity, ClockQuality, DelayMechanism, PortIdentity, PortState, SdoId, TimeSource,
    Version,
};
use crate::PtpError;

/// Default data set, 8.2.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultDs {
    pub clock_identity: ClockIdentity,
    pub number_ports: u16,
    pub clock_quality: ClockQuality,
    pub priority1: u8,
    pub priority2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
    pub sdo_id: SdoId,
}

impl DefaultDs {
    pub fn new(slave_only: bool) -> DefaultDs {
        DefaultDs {
            clock_identity: ClockIdentity::default(),
            number_ports: 0,
            clock_quality: ClockQuality::new(slave_only),
            priority1: 128,
            priority2: 128,
            domain_number: 0,
            slave_only,
            sdo_id: SdoId::default(),
        }
    }
}

/// Current data set, 8.2.2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentDs {
    pub steps_removed: u16,
    pub offset_from_master: TimeInterval,
    pub mean_delay: TimeInterval,
}

/// Parent data set, 8.2.3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentDs {
    pub parent_port_identity: PortIdentity,
    pub parent_stats: bool,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority1: u8,
    pub grandmaster_priority2: u8,
}

impl ParentDs {
    /// Initialization values when the instance is its own parent, 8.2.3.2.
    pub fn from_default(default_ds: &DefaultDs) -> ParentDs {
        ParentDs {
            parent_port_identity: PortIdentity::new(default_ds.clock_identity, 0),
            parent_stats: false,
            grandmaster_identity: default_ds.clock_identity,
            grandmaster_clock_quality: default_ds.clock_quality,
            grandmaster_priority1: default_ds.priority1,
            grandmaster_priority2: default_ds.priority2,
        }
    }

    /// S1 update: adopt the elected grandmaster from its Announce.
    pub fn update_from_announce(&mut self, announce: &Announce) {
        self.parent_port_identity = announce.header.source_port_identity;
        self.grandmaster_identity = announce.grandmaster_identity;
        self.grandmaster_clock_quality = announce.grandmaster_clock_quality;
        self.grandmaster_priority1 = announce.grandmaster_priority1;
        self.grandmaster_priority2 = announce.grandmaster_priority2;
    }
}

/// Time properties data set, 8.2.4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimePropertiesDs {
    pub current_utc_offset: i16,
    pub current_utc_offset_valid: bool,
    pub leap59: bool,
    pub leap61: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
    pub ptp_timescale: bool,
    pub time_source: TimeSource,
}

impl TimePropertiesDs {
    /// S1 update from the elected grandmaster's Announce flags.
    pub fn update_from_announce(&mut self, announce: &Announce) {
        use crate::message::FlagField;

        let flags = announce.header.flags;
        self.current_utc_offset = announce.current_utc_offset;
        self.current_utc_offset_valid = flags.contains(FlagField::CURRENT_UTC_OFFSET_VALID);
        self.leap59 = flags.contains(FlagField::LEAP59);
        self.leap61 = flags.contains(FlagField::LEAP61);
        self.time_traceable = flags.contains(FlagField::TIME_TRACEABLE);
        self.frequency_traceable = flags.contains(FlagField::FREQUENCY_TRACEABLE);
        self.ptp_timescale = flags.contains(FlagField::PTP_TIMESCALE);
        self.time_source = announce.time_source;
    }
}

/// Port data set, 8.2.15.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDs {
    pub port_identity: PortIdentity,
    pub port_state: PortState,
    /// Range [0, 5].
    pub log_min_delay_req_interval: i8,
    pub mean_link_delay: TimeInterval,
    /// Log2 seconds between Announce messages, range [0, 4]. Uniform
    /// throughout a domain, 7.7.2.2.
    pub log_announce_interval: i8,
    /// Announce intervals before the parent is declared lost, range
    /// [2, 10]. 7.7.3.1 recommends at least 3.
    pub announce_receipt_timeout: u8,
    /// Range [-1, 1].
    pub log_sync_interval: i8,
    pub delay_mechanism: DelayMechanism,
    pub log_min_pdelay_req_interval: i8,
    pub version: Version,
    pub delay_asymmetry: TimeInterval,
}

impl PortDs {
    pub fn new(port_identity: PortIdentity) -> PortDs {
        PortDs {
            port_identity,
            port_state: PortState::Initializing,
            log_min_delay_req_interval: 0,
            mean_link_delay: TimeInterval::ZERO,
            log_announce_interval: 1,
            announce_receipt_timeout: 3,
            log_sync_interval: 0,
            delay_mechanism: DelayMechanism::E2e,
            log_min_pdelay_req_interval: 0,
            version: Version::default(),
            delay_asymmetry: TimeInterval::ZERO,
        }
    }

    /// Nominal period between Announce messages.
    pub fn announce_interval(&self) -> Duration {
        log_interval(self.log_announce_interval)
    }

    /// How long without a qualified Announce before the port falls back to
    /// listening.
    pub fn announce_receipt_timeout_interval(&self) -> Duration {
        self.announce_interval() * u32::from(self.announce_receipt_timeout)
    }

    /// Checks the configurable members against a profile's ranges.
    pub fn validate(&self, profile: &Profile) -> Result<(), PtpError> {
        if !profile.log_announce_interval.contains(self.log_announce_interval) {
            return Err(PtpError::PortConfigOutOfRange);
        }
        if !profile.log_sync_interval.contains(self.log_sync_interval) {
            return Err(PtpError::PortConfigOutOfRange);
        }
        if !profile.log_min_delay_req_interval.contains(self.log_min_delay_req_interval) {
            return Err(PtpError::PortConfigOutOfRange);
        }
        if !profile
            .announce_receipt_timeout
            .contains(i8::try_from(self.announce_receipt_timeout).unwrap_or(i8::MAX))
        {
            return Err(PtpError::PortConfigOutOfRange);
        }
        Ok(())
    }
}

/// 2^log seconds as a duration. Negative logs give sub-second periods.
pub fn log_interval(log: i8) -> Duration {
    if log >= 0 {
        Duration::from_secs(1 << log)
    } else {
        Duration::from_secs_f64(1.0 / f64::from(1u32 << -log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_ds_initializes_from_default_ds() {
        let mut default_ds = DefaultDs::new(true);
        default_ds.clock_identity = ClockIdentity([1; 8]);
        let parent = ParentDs::from_default(&default_ds);
        assert_eq!(parent.grandmaster_identity, default_ds.clock_identity);
        assert_eq!(parent.grandmaster_clock_quality.clock_class, 255);
        assert_eq!(parent.grandmaster_priority1, 128);
    }

    #[test]
    fn announce_intervals_follow_the_log() {
        let mut port_ds = PortDs::new(PortIdentity::default());
        assert_eq!(port_ds.announce_interval(), Duration::from_secs(2));
        assert_eq!(port_ds.announce_receipt_timeout_interval(), Duration::from_secs(6));

        port_ds.log_announce_interval = 0;
        port_ds.announce_receipt_timeout = 10;
        assert_eq!(port_ds.announce_receipt_timeout_interval(), Duration::from_secs(10));
    }

    #[test]
    fn sub_second_log_intervals() {
        assert_eq!(log_interval(-1), Duration::from_secs_f64(0.5));
        assert_eq!(log_interval(2), Duration::from_secs(4));
    }

    #[test]
    fn profile_validation_catches_out_of_range_values() {
        let mut port_ds = PortDs::new(PortIdentity::default());
        assert!(port_ds.validate(&Profile::DEFAULT_E2E).is_ok());

        port_ds.log_announce_interval = 7;
        assert_eq!(
            port_ds.validate(&Profile::DEFAULT_E2E),
            Err(PtpError::PortConfigOutOfRange)
        );
    }
}
