//! A session description codec: RFC 8866 plus the AES67 (RFC 7273) and
//! RAVENNA attribute extensions.
//!
//! Parsing is strict about field order and reports the first failure as a
//! human-readable string. Emission produces a canonical ordering, byte
//! stable across runs, with CRLF newlines by default. Validation is a
//! separate pass from parsing.

mod connection;
mod format;
mod media;
mod media_clock;
mod origin;
mod parser;
mod reference_clock;
mod session;
mod source_filter;
mod time_active;
mod types;

pub use connection::Connection;
pub use format::Format;
pub use media::MediaDescription;
pub use media_clock::MediaClock;
pub use origin::Origin;
pub use reference_clock::{PtpVersionId, ReferenceClock};
pub use session::SessionDescription;
pub use source_filter::SourceFilter;
pub use time_active::TimeActive;
pub use types::{AddrType, ClockDomain, FilterMode, MediaDirection, NetType};

/// Parse and validation failures carry a message naming the field and the
/// problem.
pub type SdpResult<T> = Result<T, String>;

pub const CRLF: &str = "\r\n";
