//! The PTP instance: datasets, the local clock, and the ordered list of
//! ports.

use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use ravenna_core::math::SlidingMedian;
use ravenna_core::sync::RealtimeSharedObject;
use ravenna_core::util::MacAddress;

use crate::clock::LocalClock;
use crate::datasets::{CurrentDs, DefaultDs, ParentDs, PortDs, TimePropertiesDs};
use crate::message::Announce;
use crate::port::PtpPort;
use crate::profile::Profile;
use crate::state::{recommended_state, StateDecision};
use crate::time::TimeInterval;
use crate::types::{ClockIdentity, PortIdentity, PortState};
use crate::PtpError;

/// Snapshot of the servo published towards realtime consumers.
#[derive(Debug, Copy, Clone, Default)]
pub struct ClockStatus {
    pub offset_from_master: TimeInterval,
    pub mean_path_delay: TimeInterval,
    pub locked: bool,
    pub calibrated: bool,
    pub parent_identity: ClockIdentity,
    pub port_state: PortState,
}

/// Instance-wide mutable state handed to port handlers.
pub struct InstanceState {
    pub default_ds: DefaultDs,
    pub current_ds: CurrentDs,
    pub parent_ds: ParentDs,
    pub time_properties_ds: TimePropertiesDs,
    pub clock: LocalClock,
    pub(crate) mean_delay_filter: SlidingMedian<i64, 16>,
    clock_status: Arc<RealtimeSharedObject<ClockStatus>>,
    port_state_hint: PortState,
}

impl InstanceState {
    /// Pushes the current servo view through the realtime handoff. A
    /// failed publication is back-pressure, not an error; the next
    /// measurement retries.
    pub(crate) fn publish_clock_status(&mut self) {
        let status = ClockStatus {
            offset_from_master: self.current_ds.offset_from_master,
            mean_path_delay: self.current_ds.mean_delay,
            locked: self.clock.is_locked(),
            calibrated: self.clock.is_calibrated(),
            parent_identity: self.parent_ds.grandmaster_identity,
            port_state: self.port_state_hint,
        };

        if !self.clock_status.update(status) {
            log::warn!("clock status publication failed, realtime reader held the lock");
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub slave_only: bool,
    pub domain_number: u8,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig { slave_only: true, domain_number: 0 }
    }
}

/// An ordinary clock with one or more ports on distinct interfaces.
pub struct PtpInstance {
    state: InstanceState,
    ports: Vec<PtpPort>,
}

impl PtpInstance {
    /// Only slave-only ordinary clocks are supported; anything else is a
    /// configuration error.
    pub fn new(config: InstanceConfig) -> Result<PtpInstance, PtpError> {
        if !config.slave_only {
            return Err(PtpError::OnlySlaveSupported);
        }

        let mut default_ds = DefaultDs::new(true);
        default_ds.domain_number = config.domain_number;
        let parent_ds = ParentDs::from_default(&default_ds);

        Ok(PtpInstance {
            state: InstanceState {
                default_ds,
                current_ds: CurrentDs::default(),
                parent_ds,
                time_properties_ds: TimePropertiesDs::default(),
                clock: LocalClock::new(),
                mean_delay_filter: SlidingMedian::new(),
                clock_status: Arc::new(RealtimeSharedObject::new(ClockStatus::default())),
                port_state_hint: PortState::Initializing,
            },
            ports: Vec::new(),
        })
    }

    /// Adds a port bound to `interface_addr`. The first port seals the
    /// clock identity from that interface's MAC address; further ports
    /// share it.
    pub fn add_port(&mut self, interface_addr: Ipv4Addr, mac: MacAddress) -> Result<(), PtpError> {
        if self.ports.is_empty() {
            let identity = ClockIdentity::from_mac(mac);
            if !identity.is_valid() {
                return Err(PtpError::InvalidClockIdentity);
            }
            self.state.default_ds.clock_identity = identity;
            self.state.parent_ds = ParentDs::from_default(&self.state.default_ds);
        }

        let port_number = self.ports.len() as u16 + 1;
        let port_identity = PortIdentity::new(self.state.default_ds.clock_identity, port_number);

        let port = PtpPort::new(interface_addr, port_identity).map_err(|e| {
            log::error!("opening ptp port on {interface_addr}: {e}");
            PtpError::PortSetupFailed
        })?;
        port.port_ds().validate(&Profile::DEFAULT_E2E)?;

        self.ports.push(port);
        self.state.default_ds.number_ports = self.ports.len() as u16;
        self.state.port_state_hint = PortState::Listening;

        log::info!("ptp port {port_identity} listening on {interface_addr}");
        Ok(())
    }

    pub fn default_ds(&self) -> &DefaultDs {
        &self.state.default_ds
    }

    pub fn current_ds(&self) -> &CurrentDs {
        &self.state.current_ds
    }

    pub fn parent_ds(&self) -> &ParentDs {
        &self.state.parent_ds
    }

    pub fn time_properties_ds(&self) -> &TimePropertiesDs {
        &self.state.time_properties_ds
    }

    pub fn clock(&self) -> &LocalClock {
        &self.state.clock
    }

    pub fn ports(&self) -> &[PtpPort] {
        &self.ports
    }

    pub fn port_ds(&self, index: usize) -> Option<&PortDs> {
        self.ports.get(index).map(|port| port.port_ds())
    }

    /// The wait-free handoff a realtime thread reads the servo state
    /// through.
    pub fn clock_status(&self) -> Arc<RealtimeSharedObject<ClockStatus>> {
        self.state.clock_status.clone()
    }

    /// One reactor turn: wait for socket readiness or the next timer,
    /// dispatch, then re-run timers and the BMCA.
    pub fn run_once(&mut self, max_wait: Duration) -> io::Result<()> {
        let now = Instant::now();

        let mut timeout = max_wait;
        for port in &self.ports {
            if let Some(deadline) = port.next_deadline() {
                timeout = timeout.min(deadline.saturating_duration_since(now));
            }
        }

        {
            let mut fds: Vec<PollFd> = Vec::with_capacity(self.ports.len() * 2);
            for port in &self.ports {
                for fd in port.fds() {
                    fds.push(PollFd::new(fd, PollFlags::POLLIN));
                }
            }

            if !fds.is_empty() {
                let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
                match poll(&mut fds, PollTimeout::from(millis)) {
                    Ok(_) => {}
                    Err(nix::errno::Errno::EINTR) => return Ok(()),
                    Err(errno) => return Err(io::Error::from(errno)),
                }
            } else {
                std::thread::sleep(timeout);
            }
        }

        for port in &mut self.ports {
            port.handle_ready(&mut self.state);
        }

        let now = Instant::now();
        for port in &mut self.ports {
            port.poll_timers(&mut self.state, now);
        }

        let changed = self
            .ports
            .iter_mut()
            .fold(false, |acc, port| port.take_qualification_changed() || acc);
        if changed {
            self.run_bmca(now);
        }

        Ok(())
    }

    /// Runs the reactor until an I/O error occurs.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.run_once(Duration::from_secs(1))?;
        }
    }

    /// Re-elects the best master and applies the state decisions,
    /// IEEE 1588-2019 9.3.3.
    pub fn run_bmca(&mut self, now: Instant) {
        // E_best: the best qualified Announce across all ports
        let e_best: Option<Announce> = {
            let mut best: Option<(&Announce, PortIdentity)> = None;
            for port in &self.ports {
                let Some(challenger) = port.foreign_masters().best() else {
                    continue;
                };
                best = match best {
                    None => Some((challenger, port.port_identity())),
                    Some((incumbent, receiver)) => {
                        use crate::bmca::{ComparisonDataSet, ComparisonResult};
                        let outcome = ComparisonDataSet::compare_announces(
                            challenger, incumbent, receiver,
                        );
                        if outcome >= ComparisonResult::BetterByTopology {
                            Some((challenger, port.port_identity()))
                        } else {
                            Some((incumbent, receiver))
                        }
                    }
                };
            }
            best.map(|(announce, _)| announce.clone())
        };

        for port in &mut self.ports {
            let decision = recommended_state(
                &self.state.default_ds,
                e_best.as_ref(),
                port.port_identity(),
            );

            match decision {
                StateDecision::S1 => {
                    let announce = e_best.as_ref().expect("S1 implies a best master");
                    let new_parent = announce.header.source_port_identity
                        != self.state.parent_ds.parent_port_identity;

                    self.state.parent_ds.update_from_announce(announce);
                    self.state.current_ds.steps_removed = announce.steps_removed + 1;
                    self.state.time_properties_ds.update_from_announce(announce);

                    if new_parent {
                        log::info!(
                            "selected grandmaster {} via {}",
                            announce.grandmaster_identity,
                            announce.header.source_port_identity,
                        );
                        port.clear_sequences();
                    }
                    port.reset_announce_deadline(now);

                    if matches!(port.state(), PortState::Listening | PortState::PreMaster) {
                        port.set_state(PortState::Uncalibrated);
                    }
                }
                StateDecision::Listening => {
                    if !matches!(port.state(), PortState::Listening) {
                        port.set_state(PortState::Listening);
                        port.clear_sequences();
                    }
                }
                // master/passive decisions cannot be reached for a
                // slave-only instance
                StateDecision::M1 | StateDecision::M2 | StateDecision::M3 => {
                    log::warn!("master decision {decision:?} on slave-only instance, ignoring");
                }
                StateDecision::P1 | StateDecision::P2 => {
                    port.set_state(PortState::Passive);
                }
            }
        }

        if let Some(port) = self.ports.first() {
            self.state.port_state_hint = port.state();
        }
        self.state.publish_clock_status();
    }

    /// Test and embedder hook: drive the instance without sockets.
    pub fn state_mut(&mut self) -> (&mut InstanceState, &mut [PtpPort]) {
        (&mut self.state, &mut self.ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_master_capable_configuration() {
        let config = InstanceConfig { slave_only: false, domain_number: 0 };
        assert!(matches!(PtpInstance::new(config), Err(PtpError::OnlySlaveSupported)));
    }

    #[test]
    fn new_instance_is_its_own_parent() {
        let instance = PtpInstance::new(InstanceConfig::default()).unwrap();
        assert_eq!(
            instance.parent_ds().grandmaster_identity,
            instance.default_ds().clock_identity
        );
        assert_eq!(instance.default_ds().clock_quality.clock_class, 255);
        assert_eq!(instance.default_ds().number_ports, 0);
    }

    #[test]
    fn clock_status_is_readable_before_sync() {
        let instance = PtpInstance::new(InstanceConfig::default()).unwrap();
        let status = instance.clock_status();
        let lock = status.lock_realtime();
        let snapshot = lock.get().expect("status present");
        assert!(!snapshot.locked);
        assert!(!snapshot.calibrated);
    }
}
