use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The version of the NMOS API itself, `v<major>.<minor>`. Not to be
/// confused with resource versions.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: i16,
    pub minor: i16,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid api version")]
pub struct ParseApiVersionError;

impl ApiVersion {
    pub const V1_2: ApiVersion = ApiVersion { major: 1, minor: 2 };
    pub const V1_3: ApiVersion = ApiVersion { major: 1, minor: 3 };

    /// The node API versions this implementation speaks.
    pub const SUPPORTED: [ApiVersion; 2] = [ApiVersion::V1_2, ApiVersion::V1_3];

    pub fn is_valid(&self) -> bool {
        self.major > 0 && self.minor >= 0
    }

    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = ParseApiVersionError;

    /// Strict parse: `v<major>.<minor>` with no surrounding whitespace.
    fn from_str(input: &str) -> Result<ApiVersion, ParseApiVersionError> {
        let rest = input.strip_prefix('v').ok_or(ParseApiVersionError)?;
        let (major, minor) = rest.split_once('.').ok_or(ParseApiVersionError)?;

        if major.is_empty()
            || minor.is_empty()
            || !major.bytes().all(|b| b.is_ascii_digit())
            || !minor.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseApiVersionError);
        }

        Ok(ApiVersion {
            major: major.parse().map_err(|_| ParseApiVersionError)?,
            minor: minor.parse().map_err(|_| ParseApiVersionError)?,
        })
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<ApiVersion, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
