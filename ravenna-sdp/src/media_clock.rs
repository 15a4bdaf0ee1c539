use std::fmt;

use crate::parser::LineParser;
use crate::SdpResult;

/// The `a=mediaclk:direct=<offset>` media clock, RFC 7273 5.2, with the
/// RAVENNA-specific `rate=<num>/<den>` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaClock {
    /// RTP timestamp at which the media clock started.
    pub offset: u32,
    pub rate: Option<(u32, u32)>,
}

impl MediaClock {
    pub const ATTRIBUTE: &'static str = "mediaclk";

    pub fn parse(value: &str) -> SdpResult<MediaClock> {
        let mut parser = LineParser::new(value);

        if !parser.skip("direct=") {
            return Err("mediaclk: only the direct reference is supported".to_string());
        }

        let Some(offset) = parser.read_int::<u32>() else {
            return Err("mediaclk: failed to parse offset".to_string());
        };

        let mut clock = MediaClock { offset, rate: None };

        if parser.skip(" rate=") {
            let Some(numerator) = parser.read_int::<u32>() else {
                return Err("mediaclk: failed to parse rate numerator".to_string());
            };
            if !parser.skip_char('/') {
                return Err("mediaclk: expecting '/' in rate".to_string());
            }
            let Some(denominator) = parser.read_int::<u32>() else {
                return Err("mediaclk: failed to parse rate denominator".to_string());
            };
            clock.rate = Some((numerator, denominator));
        }

        if !parser.is_exhausted() {
            return Err("mediaclk: unexpected characters at end of value".to_string());
        }

        Ok(clock)
    }
}

impl fmt::Display for MediaClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={}:direct={}", MediaClock::ATTRIBUTE, self.offset)?;
        if let Some((numerator, denominator)) = self.rate {
            write!(f, " rate={numerator}/{denominator}")?;
        }
        Ok(())
    }
}
