use std::fmt;

use crate::parser::LineParser;
use crate::types::{AddrType, FilterMode, NetType, SDP_INET, SDP_IP4, SDP_IP6, SDP_WILDCARD};
use crate::SdpResult;

/// RFC 4570 source filter: restricts which source addresses may feed a
/// destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    pub mode: FilterMode,
    pub net_type: NetType,
    pub addr_type: AddrType,
    pub dest_address: String,
    pub src_list: Vec<String>,
}

impl SourceFilter {
    pub const ATTRIBUTE: &'static str = "source-filter";

    /// Parses the attribute value, which by RFC 4570 begins with a space:
    /// `a=source-filter: <mode> <nettype> <addrtype> <dest> <src>...`.
    pub fn parse(value: &str) -> SdpResult<SourceFilter> {
        let mut parser = LineParser::new(value);
        let mut filter = SourceFilter::default();

        if !parser.skip_char(' ') {
            return Err("source_filter: leading space not found".to_string());
        }

        match parser.split(' ') {
            Some("incl") => filter.mode = FilterMode::Include,
            Some("excl") => filter.mode = FilterMode::Exclude,
            Some(_) => return Err("source_filter: invalid filter mode".to_string()),
            None => return Err("source_filter: filter mode not found".to_string()),
        }

        match parser.split(' ') {
            Some(SDP_INET) => filter.net_type = NetType::Internet,
            Some(_) => return Err("source_filter: invalid network type".to_string()),
            None => return Err("source_filter: network type not found".to_string()),
        }

        match parser.split(' ') {
            Some(SDP_IP4) => filter.addr_type = AddrType::Ip4,
            Some(SDP_IP6) => filter.addr_type = AddrType::Ip6,
            Some(SDP_WILDCARD) => filter.addr_type = AddrType::Any,
            Some(_) => return Err("source_filter: invalid address type".to_string()),
            None => return Err("source_filter: address type not found".to_string()),
        }

        match parser.split(' ') {
            Some("") => return Err("source_filter: destination address is empty".to_string()),
            Some(dest) => filter.dest_address = dest.to_string(),
            None => return Err("source_filter: destination address not found".to_string()),
        }

        while let Some(source) = parser.split(' ') {
            if source.is_empty() {
                return Err("source_filter: source address is empty".to_string());
            }
            filter.src_list.push(source.to_string());
        }

        Ok(filter)
    }

    pub fn validate(&self) -> SdpResult<()> {
        if self.mode == FilterMode::Undefined {
            return Err("source_filter: mode is undefined".to_string());
        }
        if self.net_type == NetType::Undefined {
            return Err("source_filter: network type is undefined".to_string());
        }
        if self.addr_type == AddrType::Undefined {
            return Err("source_filter: address type is undefined".to_string());
        }
        if self.dest_address.is_empty() {
            return Err("source_filter: destination address is empty".to_string());
        }
        if self.src_list.is_empty() {
            return Err("source_filter: source list is empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a={}: {} {} {} {}",
            SourceFilter::ATTRIBUTE,
            self.mode,
            self.net_type,
            self.addr_type,
            self.dest_address
        )?;
        for source in &self.src_list {
            write!(f, " {source}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_include_filter_with_sources() {
        let filter = SourceFilter::parse(" incl IN IP4 239.0.0.1 192.168.1.1 192.168.1.2").unwrap();
        assert_eq!(filter.mode, FilterMode::Include);
        assert_eq!(filter.addr_type, AddrType::Ip4);
        assert_eq!(filter.dest_address, "239.0.0.1");
        assert_eq!(filter.src_list, vec!["192.168.1.1", "192.168.1.2"]);
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn emit_round_trips() {
        let filter = SourceFilter::parse(" excl IN * 239.0.0.1 10.0.0.1").unwrap();
        let line = filter.to_string();
        assert_eq!(line, "a=source-filter: excl IN * 239.0.0.1 10.0.0.1");
        let value = line.strip_prefix("a=source-filter:").unwrap();
        assert_eq!(SourceFilter::parse(value).unwrap(), filter);
    }

    #[test]
    fn empty_source_list_fails_validation() {
        let filter = SourceFilter::parse(" incl IN IP4 239.0.0.1").unwrap();
        assert_eq!(
            filter.validate(),
            Err("source_filter: source list is empty".to_string())
        );
    }

    #[test]
    fn missing_leading_space_is_rejected() {
        assert!(SourceFilter::parse("incl IN IP4 239.0.0.1 10.0.0.1").is_err());
    }
}
