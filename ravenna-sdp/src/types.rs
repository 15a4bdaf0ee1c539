use std::fmt;

use crate::parser::LineParser;
use crate::SdpResult;

pub const SDP_INET: &str = "IN";
pub const SDP_IP4: &str = "IP4";
pub const SDP_IP6: &str = "IP6";
pub const SDP_WILDCARD: &str = "*";

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum NetType {
    #[default]
    Undefined,
    Internet,
}

impl fmt::Display for NetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetType::Internet => f.write_str(SDP_INET),
            NetType::Undefined => f.write_str("undefined"),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum AddrType {
    #[default]
    Undefined,
    Ip4,
    Ip6,
    /// The `*` wildcard allowed in source filters.
    Any,
}

impl fmt::Display for AddrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrType::Ip4 => f.write_str(SDP_IP4),
            AddrType::Ip6 => f.write_str(SDP_IP6),
            AddrType::Any => f.write_str(SDP_WILDCARD),
            AddrType::Undefined => f.write_str("undefined"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaDirection {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl MediaDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDirection::SendRecv => "sendrecv",
            MediaDirection::SendOnly => "sendonly",
            MediaDirection::RecvOnly => "recvonly",
            MediaDirection::Inactive => "inactive",
        }
    }

    pub fn from_key(key: &str) -> Option<MediaDirection> {
        match key {
            "sendrecv" => Some(MediaDirection::SendRecv),
            "sendonly" => Some(MediaDirection::SendOnly),
            "recvonly" => Some(MediaDirection::RecvOnly),
            "inactive" => Some(MediaDirection::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    Undefined,
    Include,
    Exclude,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Include => f.write_str("incl"),
            FilterMode::Exclude => f.write_str("excl"),
            FilterMode::Undefined => f.write_str("undefined"),
        }
    }
}

/// The RAVENNA `clock-domain` attribute: `a=clock-domain:PTPv2 <domain>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClockDomain {
    pub domain: i32,
}

impl ClockDomain {
    pub const ATTRIBUTE: &'static str = "clock-domain";

    pub fn parse(value: &str) -> SdpResult<ClockDomain> {
        let mut parser = LineParser::new(value);

        let Some(source) = parser.split(' ') else {
            return Err("clock_domain: failed to parse sync source".to_string());
        };
        if source != "PTPv2" {
            return Err("clock_domain: unsupported sync source".to_string());
        }

        let Some(domain) = parser.read_int::<i32>() else {
            return Err("clock_domain: invalid domain".to_string());
        };

        Ok(ClockDomain { domain })
    }

    pub fn validate(&self) -> SdpResult<()> {
        if self.domain < 0 {
            return Err("clock_domain: domain is negative".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for ClockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={}:PTPv2 {}", ClockDomain::ATTRIBUTE, self.domain)
    }
}
