use std::fmt;

use crate::parser::LineParser;
use crate::SdpResult;

/// PTP flavor named in a `ts-refclk` attribute, RFC 7273 4.8.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PtpVersionId {
    Ieee1588_2002,
    Ieee1588_2008,
    Ieee8021As2011,
    Traceable,
}

impl PtpVersionId {
    fn as_str(&self) -> &'static str {
        match self {
            PtpVersionId::Ieee1588_2002 => "IEEE1588-2002",
            PtpVersionId::Ieee1588_2008 => "IEEE1588-2008",
            PtpVersionId::Ieee8021As2011 => "IEEE802.1AS-2011",
            PtpVersionId::Traceable => "traceable",
        }
    }

    fn from_str(value: &str) -> Option<PtpVersionId> {
        match value {
            "IEEE1588-2002" => Some(PtpVersionId::Ieee1588_2002),
            "IEEE1588-2008" => Some(PtpVersionId::Ieee1588_2008),
            "IEEE802.1AS-2011" => Some(PtpVersionId::Ieee8021As2011),
            "traceable" => Some(PtpVersionId::Traceable),
            _ => None,
        }
    }
}

/// The `a=ts-refclk:ptp=...` reference clock, RFC 7273 + AES67.
///
/// Forms: `ptp=<version>[:<gmid>[:<domain>]]` and `ptp=traceable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceClock {
    pub ptp_version: PtpVersionId,
    pub gmid: Option<String>,
    pub domain: Option<i32>,
}

impl ReferenceClock {
    pub const ATTRIBUTE: &'static str = "ts-refclk";

    pub fn parse(value: &str) -> SdpResult<ReferenceClock> {
        let mut parser = LineParser::new(value);

        if !parser.skip("ptp=") {
            return Err("ts-refclk: only the ptp clock source is supported".to_string());
        }

        let Some(version_str) = parser.split(':') else {
            return Err("ts-refclk: failed to parse ptp version".to_string());
        };
        let Some(ptp_version) = PtpVersionId::from_str(version_str) else {
            return Err("ts-refclk: unknown ptp version".to_string());
        };

        let mut clock = ReferenceClock { ptp_version, gmid: None, domain: None };

        if let Some(gmid) = parser.split(':') {
            if gmid.is_empty() {
                return Err("ts-refclk: gmid is empty".to_string());
            }
            clock.gmid = Some(gmid.to_string());

            if let Some(domain_str) = parser.read_until_end() {
                let Ok(domain) = domain_str.parse() else {
                    return Err("ts-refclk: failed to parse domain".to_string());
                };
                clock.domain = Some(domain);
            }
        }

        Ok(clock)
    }
}

impl fmt::Display for ReferenceClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={}:ptp={}", ReferenceClock::ATTRIBUTE, self.ptp_version.as_str())?;
        if let Some(gmid) = &self.gmid {
            write!(f, ":{gmid}")?;
            if let Some(domain) = self.domain {
                write!(f, ":{domain}")?;
            }
        }
        Ok(())
    }
}
