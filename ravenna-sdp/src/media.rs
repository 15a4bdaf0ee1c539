use std::collections::BTreeMap;
use std::fmt::Write;

use crate::connection::Connection;
use crate::format::Format;
use crate::media_clock::MediaClock;
use crate::parser::LineParser;
use crate::reference_clock::ReferenceClock;
use crate::source_filter::SourceFilter;
use crate::types::{ClockDomain, MediaDirection};
use crate::SdpResult;

/// One `m=` section with the session-level fields it overrides and the
/// RAVENNA extension attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaDescription {
    pub media_type: String,
    pub port: u16,
    pub number_of_ports: u16,
    pub protocol: String,
    pub formats: Vec<Format>,
    pub connections: Vec<Connection>,
    pub information: Option<String>,
    pub bandwidth: Vec<String>,
    pub key: Option<String>,
    /// Packet time in milliseconds.
    pub ptime: Option<f64>,
    pub max_ptime: Option<f64>,
    pub direction: Option<MediaDirection>,
    pub reference_clock: Option<ReferenceClock>,
    pub media_clock: Option<MediaClock>,
    pub clock_domain: Option<ClockDomain>,
    /// RAVENNA: RTP timestamp of the stream's epoch.
    pub sync_time: Option<u32>,
    /// RAVENNA: permissible media-clock deviation as a fraction.
    pub clock_deviation: Option<(u32, u32)>,
    /// Legacy RAVENNA frame count.
    pub framecount: Option<u16>,
    pub mid: Option<String>,
    pub source_filters: Vec<SourceFilter>,
    /// Attributes this parser has no schema for, preserved verbatim.
    pub attributes: BTreeMap<String, String>,
}

impl MediaDescription {
    /// Parses an `m=` line: `<media> <port>[/<count>] <proto> <fmt>...`.
    pub fn parse(line: &str) -> SdpResult<MediaDescription> {
        let mut parser = LineParser::new(line);

        if !parser.skip("m=") {
            return Err("media: expecting 'm='".to_string());
        }

        let mut media = MediaDescription::default();

        let Some(media_type) = parser.split(' ') else {
            return Err("media: failed to parse media type".to_string());
        };
        media.media_type = media_type.to_string();

        let Some(port) = parser.read_int::<u16>() else {
            return Err("media: failed to parse port as integer".to_string());
        };
        media.port = port;

        if parser.skip_char('/') {
            let Some(count) = parser.read_int::<u16>() else {
                return Err("media: failed to parse number of ports as integer".to_string());
            };
            media.number_of_ports = count;
        } else {
            media.number_of_ports = 1;
        }
        parser.skip_char(' ');

        let Some(protocol) = parser.split(' ') else {
            return Err("media: failed to parse protocol".to_string());
        };
        media.protocol = protocol.to_string();

        while let Some(format_str) = parser.split(' ') {
            let Ok(payload_type) = format_str.parse::<u8>() else {
                return Err("media: format integer parsing failed".to_string());
            };
            media.formats.push(Format { payload_type, ..Format::default() });
        }

        Ok(media)
    }

    /// Parses an `a=` line inside this media section.
    pub fn parse_attribute(&mut self, line: &str) -> SdpResult<()> {
        let mut parser = LineParser::new(line);

        if !parser.skip("a=") {
            return Err("attribute: expecting 'a='".to_string());
        }

        let Some(key) = parser.split(':') else {
            return Err("attribute: expecting key".to_string());
        };

        if let Some(direction) = MediaDirection::from_key(key) {
            self.direction = Some(direction);
            return Ok(());
        }

        match key {
            "rtpmap" => {
                let Some(value) = parser.read_until_end() else {
                    return Err("media: failed to parse rtpmap value".to_string());
                };
                let format = Format::parse_rtpmap(value)?;
                let known = self
                    .formats
                    .iter_mut()
                    .find(|f| f.payload_type == format.payload_type);
                match known {
                    Some(slot) => *slot = format,
                    None => return Err("media: rtpmap attribute for unknown payload type".to_string()),
                }
            }
            "ptime" => {
                let Some(ptime) = parser.read_float() else {
                    return Err("media: failed to parse ptime value".to_string());
                };
                if ptime < 0.0 {
                    return Err("media: ptime must be a positive number".to_string());
                }
                self.ptime = Some(ptime);
            }
            "maxptime" => {
                let Some(max_ptime) = parser.read_float() else {
                    return Err("media: failed to parse maxptime value".to_string());
                };
                if max_ptime < 0.0 {
                    return Err("media: maxptime must be a positive number".to_string());
                }
                self.max_ptime = Some(max_ptime);
            }
            ReferenceClock::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("media: failed to parse ts-refclk value".to_string());
                };
                self.reference_clock = Some(ReferenceClock::parse(value)?);
            }
            MediaClock::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("media: failed to parse mediaclk value".to_string());
                };
                self.media_clock = Some(MediaClock::parse(value)?);
            }
            ClockDomain::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("media: failed to parse clock-domain value".to_string());
                };
                self.clock_domain = Some(ClockDomain::parse(value)?);
            }
            "sync-time" => {
                let Some(sync_time) = parser.read_int::<u32>() else {
                    return Err("media: failed to parse sync-time value".to_string());
                };
                self.sync_time = Some(sync_time);
            }
            "clock-deviation" => {
                let Some(numerator) = parser.read_int::<u32>() else {
                    return Err("media: failed to parse clock-deviation value".to_string());
                };
                if !parser.skip_char('/') {
                    return Err(
                        "media: expecting '/' after clock-deviation numerator value".to_string()
                    );
                }
                let Some(denominator) = parser.read_int::<u32>() else {
                    return Err("media: failed to parse clock-deviation denominator value".to_string());
                };
                self.clock_deviation = Some((numerator, denominator));
            }
            "framecount" => {
                let Some(framecount) = parser.read_int::<u16>() else {
                    return Err("media: failed to parse framecount value".to_string());
                };
                self.framecount = Some(framecount);
            }
            "mid" => {
                let Some(mid) = parser.read_until_end() else {
                    return Err("media: failed to parse mid value".to_string());
                };
                self.mid = Some(mid.to_string());
            }
            SourceFilter::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("media: failed to parse source-filter value".to_string());
                };
                self.add_or_update_source_filter(SourceFilter::parse(value)?);
            }
            _ => {
                let Some(value) = parser.read_until_end() else {
                    return Err("media: failed to parse attribute value".to_string());
                };
                log::trace!("preserving unknown media attribute '{key}'");
                self.attributes.insert(key.to_string(), value.to_string());
            }
        }

        Ok(())
    }

    pub fn add_or_update_format(&mut self, format: Format) {
        for slot in &mut self.formats {
            if slot.payload_type == format.payload_type {
                *slot = format;
                return;
            }
        }
        self.formats.push(format);
    }

    pub fn add_or_update_source_filter(&mut self, filter: SourceFilter) {
        for slot in &mut self.source_filters {
            if slot.net_type == filter.net_type
                && slot.addr_type == filter.addr_type
                && slot.dest_address == filter.dest_address
            {
                *slot = filter;
                return;
            }
        }
        self.source_filters.push(filter);
    }

    pub fn validate(&self) -> SdpResult<()> {
        if self.media_type.is_empty() {
            return Err("media: media type is empty".to_string());
        }
        if self.port == 0 {
            return Err("media: port is 0".to_string());
        }
        if self.number_of_ports == 0 {
            return Err("media: number of ports is 0".to_string());
        }
        if self.protocol.is_empty() {
            return Err("media: protocol is empty".to_string());
        }
        if self.formats.is_empty() {
            return Err("media: no formats specified".to_string());
        }
        for connection in &self.connections {
            connection.validate()?;
        }
        for filter in &self.source_filters {
            filter.validate()?;
        }
        Ok(())
    }

    /// Appends this section in the canonical emission order.
    pub fn emit(&self, out: &mut String, newline: &str) {
        let _ = write!(out, "m={} {}", self.media_type, self.port);
        if self.number_of_ports > 1 {
            let _ = write!(out, "/{}", self.number_of_ports);
        }
        let _ = write!(out, " {}", self.protocol);
        for format in &self.formats {
            let _ = write!(out, " {}", format.payload_type);
        }
        out.push_str(newline);

        if let Some(information) = &self.information {
            let _ = write!(out, "i={information}{newline}");
        }

        for connection in &self.connections {
            let _ = write!(out, "{connection}{newline}");
        }

        for bandwidth in &self.bandwidth {
            let _ = write!(out, "b={bandwidth}{newline}");
        }

        for format in &self.formats {
            if !format.encoding_name.is_empty() {
                let _ = write!(out, "a=rtpmap:{format}{newline}");
            }
        }

        if let Some(ptime) = self.ptime {
            let _ = write!(out, "a=ptime:{ptime}{newline}");
        }
        if let Some(max_ptime) = self.max_ptime {
            let _ = write!(out, "a=maxptime:{max_ptime}{newline}");
        }
        if let Some(mid) = &self.mid {
            let _ = write!(out, "a=mid:{mid}{newline}");
        }
        if let Some(direction) = self.direction {
            let _ = write!(out, "a={direction}{newline}");
        }
        if let Some(reference_clock) = &self.reference_clock {
            let _ = write!(out, "{reference_clock}{newline}");
        }
        if let Some(media_clock) = &self.media_clock {
            let _ = write!(out, "{media_clock}{newline}");
        }
        if let Some(clock_domain) = &self.clock_domain {
            let _ = write!(out, "{clock_domain}{newline}");
        }
        if let Some(sync_time) = self.sync_time {
            let _ = write!(out, "a=sync-time:{sync_time}{newline}");
        }
        if let Some((numerator, denominator)) = self.clock_deviation {
            let _ = write!(out, "a=clock-deviation:{numerator}/{denominator}{newline}");
        }
        for filter in &self.source_filters {
            let _ = write!(out, "{filter}{newline}");
        }
        if let Some(framecount) = self.framecount {
            let _ = write!(out, "a=framecount:{framecount}{newline}");
        }
        if let Some(key) = &self.key {
            let _ = write!(out, "k={key}{newline}");
        }
        for (key, value) in &self.attributes {
            let _ = write!(out, "a={key}:{value}{newline}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_m_line() {
        let media = MediaDescription::parse("m=audio 5004 RTP/AVP 96 97").unwrap();
        assert_eq!(media.media_type, "audio");
        assert_eq!(media.port, 5004);
        assert_eq!(media.number_of_ports, 1);
        assert_eq!(media.protocol, "RTP/AVP");
        assert_eq!(media.formats.len(), 2);
        assert_eq!(media.formats[0].payload_type, 96);
        assert_eq!(media.formats[1].payload_type, 97);
    }

    #[test]
    fn port_count_suffix() {
        let media = MediaDescription::parse("m=audio 5004/2 RTP/AVP 96").unwrap();
        assert_eq!(media.number_of_ports, 2);
    }

    #[test]
    fn rtpmap_binds_to_declared_payload_type() {
        let mut media = MediaDescription::parse("m=audio 5004 RTP/AVP 96").unwrap();
        media.parse_attribute("a=rtpmap:96 L24/48000/8").unwrap();
        assert_eq!(media.formats[0].encoding_name, "L24");

        let err = media.parse_attribute("a=rtpmap:97 L16/48000/2").unwrap_err();
        assert_eq!(err, "media: rtpmap attribute for unknown payload type");
    }

    #[test]
    fn ravenna_attributes() {
        let mut media = MediaDescription::parse("m=audio 5004 RTP/AVP 96").unwrap();
        media.parse_attribute("a=sync-time:963214424").unwrap();
        media.parse_attribute("a=clock-deviation:999/1000").unwrap();
        media.parse_attribute("a=framecount:48").unwrap();
        media.parse_attribute("a=clock-domain:PTPv2 0").unwrap();
        media.parse_attribute("a=mid:PRIMARY").unwrap();

        assert_eq!(media.sync_time, Some(963214424));
        assert_eq!(media.clock_deviation, Some((999, 1000)));
        assert_eq!(media.framecount, Some(48));
        assert_eq!(media.clock_domain, Some(ClockDomain { domain: 0 }));
        assert_eq!(media.mid.as_deref(), Some("PRIMARY"));
    }

    #[test]
    fn unknown_attributes_are_preserved() {
        let mut media = MediaDescription::parse("m=audio 5004 RTP/AVP 96").unwrap();
        media.parse_attribute("a=x-custom:hello world").unwrap();
        assert_eq!(media.attributes.get("x-custom").map(String::as_str), Some("hello world"));
    }

    #[test]
    fn validation_reports_the_first_failure() {
        let media = MediaDescription::parse("m=audio 0 RTP/AVP 96").unwrap();
        assert_eq!(media.validate(), Err("media: port is 0".to_string()));

        let mut media = MediaDescription::parse("m=audio 5004 RTP/AVP 96").unwrap();
        media.number_of_ports = 0;
        assert_eq!(media.validate(), Err("media: number of ports is 0".to_string()));

        let media = MediaDescription::parse("m=audio 5004 RTP/AVP").unwrap();
        assert_eq!(media.validate(), Err("media: no formats specified".to_string()));
    }
}
