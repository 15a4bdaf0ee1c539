use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A six-octet hardware address.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid mac address")]
pub struct ParseMacError;

impl MacAddress {
    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Accepts the conventional `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`
    /// forms.
    fn from_str(s: &str) -> Result<MacAddress, ParseMacError> {
        let mut bytes = [0u8; 6];
        let mut count = 0;

        for part in s.split(|c| c == ':' || c == '-') {
            if count == 6 || part.len() != 2 {
                return Err(ParseMacError);
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| ParseMacError)?;
            count += 1;
        }

        if count != 6 {
            return Err(ParseMacError);
        }

        Ok(MacAddress(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats() {
        let mac: MacAddress = "39:a7:94:07:cb:d0".parse().unwrap();
        assert_eq!(mac.bytes(), &[0x39, 0xa7, 0x94, 0x07, 0xcb, 0xd0]);
        assert_eq!(mac.to_string(), "39:a7:94:07:cb:d0");

        let dashed: MacAddress = "39-A7-94-07-CB-D0".parse().unwrap();
        assert_eq!(dashed, mac);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("39:a7:94:07:cb".parse::<MacAddress>().is_err());
        assert!("39:a7:94:07:cb:d0:11".parse::<MacAddress>().is_err());
        assert!("zz:a7:94:07:cb:d0".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }
}
