use std::fmt;

use crate::parser::LineParser;
use crate::SdpResult;

/// One payload format: the `m=` payload type joined with its `a=rtpmap`
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Format {
    pub payload_type: u8,
    pub encoding_name: String,
    pub clock_rate: u32,
    pub num_channels: u32,
}

impl Format {
    /// Parses an rtpmap value: `<pt> <encoding>/<rate>[/<channels>]`.
    pub fn parse_rtpmap(value: &str) -> SdpResult<Format> {
        let mut parser = LineParser::new(value);
        let mut format = Format::default();

        let Some(payload_type) = parser.read_int::<u8>() else {
            return Err("rtpmap: invalid payload type".to_string());
        };
        format.payload_type = payload_type;

        if !parser.skip_char(' ') {
            return Err("rtpmap: expecting space after payload type".to_string());
        }

        let Some(encoding_name) = parser.split('/') else {
            return Err("rtpmap: failed to parse encoding name".to_string());
        };
        format.encoding_name = encoding_name.to_string();

        let Some(clock_rate) = parser.read_int::<u32>() else {
            return Err("rtpmap: invalid clock rate".to_string());
        };
        format.clock_rate = clock_rate;

        if parser.skip_char('/') {
            // strictly the encoding parameter could be anything, but in
            // practice it carries the channel count
            let Some(num_channels) = parser.read_int::<u32>() else {
                return Err("rtpmap: failed to parse number of channels".to_string());
            };
            format.num_channels = num_channels;
        } else {
            format.num_channels = 1;
        }

        Ok(format)
    }

    /// The rtpmap value for this format.
    pub fn rtpmap_value(&self) -> String {
        format!(
            "{} {}/{}/{}",
            self.payload_type, self.encoding_name, self.clock_rate, self.num_channels
        )
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rtpmap_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aes67_l24() {
        let format = Format::parse_rtpmap("96 L24/48000/8").unwrap();
        assert_eq!(format.payload_type, 96);
        assert_eq!(format.encoding_name, "L24");
        assert_eq!(format.clock_rate, 48000);
        assert_eq!(format.num_channels, 8);
        assert_eq!(format.rtpmap_value(), "96 L24/48000/8");
    }

    #[test]
    fn channel_count_defaults_to_one() {
        let format = Format::parse_rtpmap("0 PCMU/8000").unwrap();
        assert_eq!(format.num_channels, 1);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Format::parse_rtpmap("x L24/48000").is_err());
        assert!(Format::parse_rtpmap("96 L24").is_err());
        assert!(Format::parse_rtpmap("96 L24/x").is_err());
        assert!(Format::parse_rtpmap("96 L24/48000/x").is_err());
    }
}
