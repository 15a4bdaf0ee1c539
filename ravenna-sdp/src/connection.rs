use std::fmt;

use crate::parser::LineParser;
use crate::types::{AddrType, NetType, SDP_INET, SDP_IP4, SDP_IP6};
use crate::SdpResult;

/// The `c=` line: connection address, with the optional `/ttl` and
/// `/count` suffixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub network_type: NetType,
    pub address_type: AddrType,
    pub address: String,
    pub ttl: Option<u32>,
    pub number_of_addresses: Option<u32>,
}

impl Connection {
    pub fn parse(line: &str) -> SdpResult<Connection> {
        let mut parser = LineParser::new(line);

        if !parser.skip("c=") {
            return Err("connection: expecting 'c='".to_string());
        }

        let mut connection = Connection::default();

        match parser.split(' ') {
            Some(SDP_INET) => connection.network_type = NetType::Internet,
            Some(_) => return Err("connection: invalid network type".to_string()),
            None => return Err("connection: failed to parse network type".to_string()),
        }

        match parser.split(' ') {
            Some(SDP_IP4) => connection.address_type = AddrType::Ip4,
            Some(SDP_IP6) => connection.address_type = AddrType::Ip6,
            Some(_) => return Err("connection: invalid address type".to_string()),
            None => return Err("connection: failed to parse address type".to_string()),
        }

        if let Some(address) = parser.split('/') {
            connection.address = address.to_string();
        }

        if parser.is_exhausted() {
            return Ok(connection);
        }

        // IPv4 multicast requires a TTL before the optional address count;
        // IPv6 has no TTL and goes straight to the count
        match connection.address_type {
            AddrType::Ip4 => {
                let Some(ttl) = parser.read_int::<u32>() else {
                    return Err("connection: failed to parse ttl for ipv4 address".to_string());
                };
                connection.ttl = Some(ttl);

                if parser.skip_char('/') {
                    let Some(count) = parser.read_int::<u32>() else {
                        return Err(
                            "connection: failed to parse number of addresses for ipv4 address"
                                .to_string(),
                        );
                    };
                    connection.number_of_addresses = Some(count);
                }
            }
            AddrType::Ip6 => {
                let Some(count) = parser.read_int::<u32>() else {
                    return Err(
                        "connection: failed to parse number of addresses for ipv6 address"
                            .to_string(),
                    );
                };
                connection.number_of_addresses = Some(count);
            }
            _ => {}
        }

        if !parser.is_exhausted() {
            return Err("connection: unexpected characters at end of line".to_string());
        }

        Ok(connection)
    }

    pub fn validate(&self) -> SdpResult<()> {
        if self.network_type == NetType::Undefined {
            return Err("connection: network type is undefined".to_string());
        }
        if self.address_type == AddrType::Undefined {
            return Err("connection: address type is undefined".to_string());
        }
        if self.address.is_empty() {
            return Err("connection: address is empty".to_string());
        }
        match self.address_type {
            AddrType::Ip4 => {
                if self.ttl.is_none() {
                    return Err("connection: ttl is required for ipv4 address".to_string());
                }
            }
            AddrType::Ip6 => {
                if self.ttl.is_some() {
                    return Err("connection: ttl is not allowed for ipv6 address".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c={} {} {}", self.network_type, self.address_type, self.address)?;
        if let Some(ttl) = self.ttl {
            write!(f, "/{ttl}")?;
        }
        if let Some(count) = self.number_of_addresses {
            write!(f, "/{count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_with_ttl_and_count() {
        let connection = Connection::parse("c=IN IP4 239.0.0.1/32").unwrap();
        assert_eq!(connection.address, "239.0.0.1");
        assert_eq!(connection.ttl, Some(32));
        assert_eq!(connection.number_of_addresses, None);
        assert!(connection.validate().is_ok());

        let connection = Connection::parse("c=IN IP4 239.0.0.1/32/3").unwrap();
        assert_eq!(connection.number_of_addresses, Some(3));
        assert_eq!(connection.to_string(), "c=IN IP4 239.0.0.1/32/3");
    }

    #[test]
    fn ipv6_takes_count_without_ttl() {
        let connection = Connection::parse("c=IN IP6 ff15::101/3").unwrap();
        assert_eq!(connection.ttl, None);
        assert_eq!(connection.number_of_addresses, Some(3));
        assert!(connection.validate().is_ok());
    }

    #[test]
    fn ipv4_without_ttl_fails_validation_not_parsing() {
        let connection = Connection::parse("c=IN IP4 10.0.0.1").unwrap();
        assert_eq!(
            connection.validate(),
            Err("connection: ttl is required for ipv4 address".to_string())
        );
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(Connection::parse("c=IN IP4 239.0.0.1/32x").is_err());
    }
}
