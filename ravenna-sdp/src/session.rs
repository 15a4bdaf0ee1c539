use std::collections::BTreeMap;
use std::fmt::Write;

use crate::connection::Connection;
use crate::media::MediaDescription;
use crate::media_clock::MediaClock;
use crate::origin::Origin;
use crate::parser::LineParser;
use crate::reference_clock::ReferenceClock;
use crate::source_filter::SourceFilter;
use crate::time_active::TimeActive;
use crate::types::{ClockDomain, MediaDirection};
use crate::{SdpResult, CRLF};

/// A parsed session description.
///
/// Immutable once parsed in normal use; builders mutate a draft and then
/// emit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDescription {
    pub version: u32,
    pub origin: Origin,
    pub session_name: String,
    pub information: Option<String>,
    pub connection: Option<Connection>,
    pub bandwidth: Vec<String>,
    pub key: Option<String>,
    pub time_active: TimeActive,
    pub direction: Option<MediaDirection>,
    pub reference_clock: Option<ReferenceClock>,
    pub media_clock: Option<MediaClock>,
    pub clock_domain: Option<ClockDomain>,
    pub sync_time: Option<u32>,
    pub source_filters: Vec<SourceFilter>,
    /// Attributes this parser has no schema for, preserved verbatim.
    pub attributes: BTreeMap<String, String>,
    pub media: Vec<MediaDescription>,
}

/// Field order ranks inside the session section. RFC 8866 requires a
/// strict forward order; `a`/`b`/`k` may repeat after `t`.
fn session_rank(key: char) -> Option<(u8, bool)> {
    match key {
        'v' => Some((0, false)),
        'o' => Some((1, false)),
        's' => Some((2, false)),
        'i' => Some((3, false)),
        'c' => Some((4, false)),
        't' => Some((5, false)),
        'b' | 'k' | 'a' => Some((6, true)),
        'm' => Some((7, true)),
        _ => None,
    }
}

impl SessionDescription {
    /// Parses a complete session description. Lines may end in LF or CRLF;
    /// blank lines are skipped. The first malformed or out-of-order line
    /// aborts the parse.
    pub fn parse(text: &str) -> SdpResult<SessionDescription> {
        let mut session = SessionDescription::default();
        let mut last_rank: i16 = -1;
        let mut in_media = false;

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if line.is_empty() {
                continue;
            }

            let key = line.chars().next().unwrap_or('\0');
            if line.len() < 2 || line.as_bytes()[1] != b'=' {
                return Err(format!("malformed line: {line}"));
            }

            let Some((rank, repeatable)) = session_rank(key) else {
                return Err(format!("unknown line: {line}"));
            };

            if !in_media {
                let rank = i16::from(rank);
                // a/b/k and m may repeat, but only once t has been seen
                let ordered = if repeatable { last_rank >= 5 } else { rank > last_rank };
                if !ordered {
                    return Err(format!("line out of order: {line}"));
                }
                last_rank = last_rank.max(rank);
            }

            match key {
                'v' => session.version = parse_version(line)?,
                'o' => session.origin = Origin::parse(line)?,
                's' => session.session_name = line[2..].to_string(),
                'i' => {
                    let information = line[2..].to_string();
                    match session.media.last_mut() {
                        Some(media) => media.information = Some(information),
                        None => session.information = Some(information),
                    }
                }
                'c' => {
                    let connection = Connection::parse(line)?;
                    match session.media.last_mut() {
                        Some(media) => media.connections.push(connection),
                        None => session.connection = Some(connection),
                    }
                }
                'b' => {
                    let bandwidth = line[2..].to_string();
                    match session.media.last_mut() {
                        Some(media) => media.bandwidth.push(bandwidth),
                        None => session.bandwidth.push(bandwidth),
                    }
                }
                'k' => {
                    let key_value = line[2..].to_string();
                    match session.media.last_mut() {
                        Some(media) => media.key = Some(key_value),
                        None => session.key = Some(key_value),
                    }
                }
                't' => session.time_active = TimeActive::parse(line)?,
                'a' => match session.media.last_mut() {
                    Some(media) => media.parse_attribute(line)?,
                    None => session.parse_attribute(line)?,
                },
                'm' => {
                    session.media.push(MediaDescription::parse(line)?);
                    in_media = true;
                }
                _ => unreachable!("rank table covers all keys"),
            }
        }

        Ok(session)
    }

    /// Parses an `a=` line at session level.
    fn parse_attribute(&mut self, line: &str) -> SdpResult<()> {
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
            ReferenceClock::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("session: failed to parse ts-refclk value".to_string());
                };
                self.reference_clock = Some(ReferenceClock::parse(value)?);
            }
            MediaClock::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("session: failed to parse mediaclk value".to_string());
                };
                self.media_clock = Some(MediaClock::parse(value)?);
            }
            ClockDomain::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("session: failed to parse clock-domain value".to_string());
                };
                self.clock_domain = Some(ClockDomain::parse(value)?);
            }
            "sync-time" => {
                let Some(sync_time) = parser.read_int::<u32>() else {
                    return Err("session: failed to parse sync-time value".to_string());
                };
                self.sync_time = Some(sync_time);
            }
            SourceFilter::ATTRIBUTE => {
                let Some(value) = parser.read_until_end() else {
                    return Err("session: failed to parse source-filter value".to_string());
                };
                self.add_or_update_source_filter(SourceFilter::parse(value)?);
            }
            _ => {
                let Some(value) = parser.read_until_end() else {
                    return Err("session: failed to parse attribute value".to_string());
                };
                log::trace!("preserving unknown session attribute '{key}'");
                self.attributes.insert(key.to_string(), value.to_string());
            }
        }

        Ok(())
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

    /// Semantic validation, separate from parsing. Reports the first
    /// failure.
    pub fn validate(&self) -> SdpResult<()> {
        if self.version != 0 {
            return Err("session: version must be 0".to_string());
        }
        self.origin.validate()?;
        self.time_active.validate()?;
        if let Some(connection) = &self.connection {
            connection.validate()?;
        }
        for filter in &self.source_filters {
            filter.validate()?;
        }
        for media in &self.media {
            media.validate()?;
        }
        Ok(())
    }

    /// Emits with CRLF line endings.
    pub fn emit(&self) -> String {
        self.emit_with_newline(CRLF)
    }

    /// Emits in the canonical order, byte stable across runs.
    pub fn emit_with_newline(&self, newline: &str) -> String {
        let mut out = String::new();

        let _ = write!(out, "v={}{newline}", self.version);
        let _ = write!(out, "{}{newline}", self.origin);
        let _ = write!(
            out,
            "s={}{newline}",
            if self.session_name.is_empty() { "-" } else { &self.session_name }
        );
        if let Some(information) = &self.information {
            let _ = write!(out, "i={information}{newline}");
        }
        if let Some(connection) = &self.connection {
            let _ = write!(out, "{connection}{newline}");
        }
        let _ = write!(out, "{}{newline}", self.time_active);
        for bandwidth in &self.bandwidth {
            let _ = write!(out, "b={bandwidth}{newline}");
        }
        if let Some(key) = &self.key {
            let _ = write!(out, "k={key}{newline}");
        }
        if let Some(clock_domain) = &self.clock_domain {
            let _ = write!(out, "{clock_domain}{newline}");
        }
        if let Some(reference_clock) = &self.reference_clock {
            let _ = write!(out, "{reference_clock}{newline}");
        }
        if let Some(direction) = self.direction {
            let _ = write!(out, "a={direction}{newline}");
        }
        if let Some(media_clock) = &self.media_clock {
            let _ = write!(out, "{media_clock}{newline}");
        }
        if let Some(sync_time) = self.sync_time {
            let _ = write!(out, "a=sync-time:{sync_time}{newline}");
        }
        for filter in &self.source_filters {
            let _ = write!(out, "{filter}{newline}");
        }
        for (key, value) in &self.attributes {
            let _ = write!(out, "a={key}:{value}{newline}");
        }

        for media in &self.media {
            media.emit(&mut out, newline);
        }

        out
    }
}

fn parse_version(line: &str) -> SdpResult<u32> {
    let mut parser = LineParser::new(line);
    if !parser.skip("v=") {
        return Err("expecting line to start with 'v='".to_string());
    }
    match parser.read_int::<u32>() {
        Some(0) if parser.is_exhausted() => Ok(0),
        Some(_) => Err("invalid version".to_string()),
        None => Err("failed to parse integer from string".to_string()),
    }
}
