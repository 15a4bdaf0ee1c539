use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum PtpError {
    #[error("invalid data")]
    InvalidData,
    #[error("invalid header length")]
    InvalidHeaderLength,
    #[error("invalid message length")]
    InvalidMessageLength,
    #[error("invalid clock identity")]
    InvalidClockIdentity,
    #[error("only slave-only instances are supported")]
    OnlySlaveSupported,
    #[error("only ordinary clocks are supported")]
    OnlyOrdinaryClockSupported,
    #[error("port data set value out of range")]
    PortConfigOutOfRange,
    #[error("failed to open port sockets")]
    PortSetupFailed,
}
