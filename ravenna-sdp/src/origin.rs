use std::fmt;

use crate::parser::LineParser;
use crate::types::{AddrType, NetType, SDP_INET, SDP_IP4, SDP_IP6};
use crate::SdpResult;

/// The `o=` line: originator and session identification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: String,
    pub session_version: u64,
    pub network_type: NetType,
    pub address_type: AddrType,
    pub unicast_address: String,
}

impl Origin {
    pub fn parse(line: &str) -> SdpResult<Origin> {
        let mut parser = LineParser::new(line);

        if !parser.skip("o=") {
            return Err("origin: expecting 'o='".to_string());
        }

        let mut origin = Origin::default();

        let Some(username) = parser.split(' ') else {
            return Err("origin: failed to parse username".to_string());
        };
        origin.username = username.to_string();

        let Some(session_id) = parser.split(' ') else {
            return Err("origin: failed to parse session id".to_string());
        };
        origin.session_id = session_id.to_string();

        let Some(version) = parser.read_int::<u64>() else {
            return Err("origin: failed to parse session version".to_string());
        };
        origin.session_version = version;
        parser.skip_char(' ');

        match parser.split(' ') {
            Some(SDP_INET) => origin.network_type = NetType::Internet,
            Some(_) => return Err("origin: invalid network type".to_string()),
            None => return Err("origin: failed to parse network type".to_string()),
        }

        match parser.split(' ') {
            Some(SDP_IP4) => origin.address_type = AddrType::Ip4,
            Some(SDP_IP6) => origin.address_type = AddrType::Ip6,
            Some(_) => return Err("origin: invalid address type".to_string()),
            None => return Err("origin: failed to parse address type".to_string()),
        }

        let Some(address) = parser.split(' ') else {
            return Err("origin: failed to parse address".to_string());
        };
        origin.unicast_address = address.to_string();

        Ok(origin)
    }

    pub fn validate(&self) -> SdpResult<()> {
        if self.session_id.is_empty() {
            return Err("origin: session id is empty".to_string());
        }
        if self.unicast_address.is_empty() {
            return Err("origin: unicast address is empty".to_string());
        }
        if self.network_type == NetType::Undefined {
            return Err("origin: network type is undefined".to_string());
        }
        if self.address_type == AddrType::Undefined {
            return Err("origin: address type is undefined".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "o={} {} {} {} {} {}",
            if self.username.is_empty() { "-" } else { &self.username },
            self.session_id,
            self.session_version,
            self.network_type,
            self.address_type,
            self.unicast_address,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_six_fields() {
        let origin = Origin::parse("o=- 1311738121 1311738121 IN IP4 192.168.1.1").unwrap();
        assert_eq!(origin.username, "-");
        assert_eq!(origin.session_id, "1311738121");
        assert_eq!(origin.session_version, 1311738121);
        assert_eq!(origin.network_type, NetType::Internet);
        assert_eq!(origin.address_type, AddrType::Ip4);
        assert_eq!(origin.unicast_address, "192.168.1.1");
        assert!(origin.validate().is_ok());
    }

    #[test]
    fn emit_round_trips() {
        let origin = Origin::parse("o=alice 123 456 IN IP6 ::1").unwrap();
        assert_eq!(Origin::parse(&origin.to_string()).unwrap(), origin);
    }

    #[test]
    fn rejects_bad_network_and_address_types() {
        assert!(Origin::parse("o=- 1 1 XX IP4 10.0.0.1").is_err());
        assert!(Origin::parse("o=- 1 1 IN IPX 10.0.0.1").is_err());
        assert!(Origin::parse("o=- 1 x IN IP4 10.0.0.1").is_err());
        assert!(Origin::parse("x=- 1 1 IN IP4 10.0.0.1").is_err());
    }
}
