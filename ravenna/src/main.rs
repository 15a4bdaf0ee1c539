mod ptp;
mod receive;
mod thread;

use std::process::ExitCode;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "ravenna", about = "AES67/RAVENNA network audio tools")]
enum Opt {
    /// Run a slave-only PTP clock and report its synchronization state.
    Ptp(ptp::PtpOpt),
    /// Receive RTP audio streams described by an SDP file.
    Receive(receive::ReceiveOpt),
}

#[derive(Debug)]
pub enum RunError {
    Ptp(ravenna_ptp::PtpError),
    Listen(ravenna_net::ListenError),
    Sdp(String),
    Io(std::io::Error),
}

fn main() -> Result<(), ExitCode> {
    env_logger::init_from_env(
        env_logger::Env::default().default_filter_or("info"),
    );

    let opt = Opt::from_args();

    let result = match opt {
        Opt::Ptp(opt) => ptp::run(opt),
        Opt::Receive(opt) => receive::run(opt),
    };

    result.map_err(|err| {
        eprintln!("error: {err:?}");
        ExitCode::FAILURE
    })
}
