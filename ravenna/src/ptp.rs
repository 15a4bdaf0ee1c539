use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use structopt::StructOpt;

use ravenna_core::util::MacAddress;
use ravenna_ptp::instance::{InstanceConfig, PtpInstance};

use crate::RunError;

#[derive(StructOpt, Debug)]
pub struct PtpOpt {
    /// Interface address to bind the PTP port to.
    #[structopt(long, name = "addr", env = "RAVENNA_INTERFACE", default_value = "0.0.0.0")]
    pub interface_addr: Ipv4Addr,

    /// MAC address of that interface; seals the clock identity.
    #[structopt(long, name = "mac", env = "RAVENNA_INTERFACE_MAC")]
    pub interface_mac: MacAddress,

    /// PTP domain number.
    #[structopt(long, default_value = "0")]
    pub domain: u8,
}

pub fn run(opt: PtpOpt) -> Result<(), RunError> {
    let config = InstanceConfig { slave_only: true, domain_number: opt.domain };
    let mut instance = PtpInstance::new(config).map_err(RunError::Ptp)?;
    instance
        .add_port(opt.interface_addr, opt.interface_mac)
        .map_err(RunError::Ptp)?;

    log::info!(
        "ptp instance up, clock_identity={} domain={}",
        instance.default_ds().clock_identity,
        opt.domain,
    );

    let mut last_report = Instant::now();

    loop {
        instance.run_once(Duration::from_secs(1)).map_err(RunError::Io)?;

        if last_report.elapsed() >= Duration::from_secs(5) {
            last_report = Instant::now();
            let current = instance.current_ds();
            log::info!(
                "offset_from_master={} mean_delay={} locked={} gm={}",
                current.offset_from_master,
                current.mean_delay,
                instance.clock().is_locked(),
                instance.parent_ds().grandmaster_identity,
            );
        }
    }
}
