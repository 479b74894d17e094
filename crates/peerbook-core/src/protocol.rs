//! Semantically versioned protocol identifiers
//!
//! Protocols are named by paths whose last segment is a `major.minor.patch`
//! version, e.g. `/chat/1.0.0` or `/ipfs/id/1.0.0`.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolParseError;

/// A `major.minor.patch` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A protocol identifier with a semantic version
///
/// Serializes as its canonical string; deserializing goes through the same
/// validation as parsing. Ordered by name, then by version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVerProtocol {
    /// Path without the version, e.g. `/ipfs/id`
    name: String,
    version: SemVer,
}

impl SemVerProtocol {
    /// Create a protocol from a name path and version
    ///
    /// The name must be a non-empty path starting with `/`, e.g. `/ipfs/id`.
    pub fn new(name: impl Into<String>, version: SemVer) -> Result<Self, ProtocolParseError> {
        let name = name.into();
        let Some(path) = name.strip_prefix('/') else {
            return Err(ProtocolParseError::MissingLeadingSlash(name));
        };
        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(ProtocolParseError::MissingName(name));
        }
        Ok(Self { name, version })
    }

    /// The protocol path without its version
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The protocol version
    pub fn version(&self) -> SemVer {
        self.version
    }

    /// Canonical string form, as stored and negotiated
    pub fn string_value(&self) -> String {
        self.to_string()
    }

    /// Same protocol name and same major version
    pub fn is_compatible_with(&self, other: &SemVerProtocol) -> bool {
        self.name == other.name && self.version.major == other.version.major
    }
}

impl FromStr for SemVerProtocol {
    type Err = ProtocolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('/') {
            return Err(ProtocolParseError::MissingLeadingSlash(s.to_string()));
        }
        let (name, version) = s
            .rsplit_once('/')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| ProtocolParseError::MissingName(s.to_string()))?;

        let invalid = || ProtocolParseError::InvalidVersion {
            protocol: s.to_string(),
            version: version.to_string(),
        };
        let mut parts = version.split('.');
        let mut next = || -> Result<u64, ProtocolParseError> {
            parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())
        };
        let semver = SemVer::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        Self::new(name, semver).map_err(|_| ProtocolParseError::MissingName(s.to_string()))
    }
}

impl TryFrom<String> for SemVerProtocol {
    type Error = ProtocolParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemVerProtocol> for String {
    fn from(protocol: SemVerProtocol) -> Self {
        protocol.to_string()
    }
}

impl Display for SemVerProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let proto: SemVerProtocol = "/chat/1.0.0".parse().unwrap();
        assert_eq!(proto.name(), "/chat");
        assert_eq!(proto.version(), SemVer::new(1, 0, 0));
        assert_eq!(proto.string_value(), "/chat/1.0.0");
    }

    #[test]
    fn test_parse_nested_name() {
        let proto: SemVerProtocol = "/ipfs/id/push/1.2.3".parse().unwrap();
        assert_eq!(proto.name(), "/ipfs/id/push");
        assert_eq!(proto.to_string(), "/ipfs/id/push/1.2.3");
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            "chat/1.0.0".parse::<SemVerProtocol>(),
            Err(ProtocolParseError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            "/1.0.0".parse::<SemVerProtocol>(),
            Err(ProtocolParseError::MissingName(_))
        ));
        assert!(matches!(
            "/chat//1.0.0".parse::<SemVerProtocol>(),
            Err(ProtocolParseError::MissingName(_))
        ));
        assert!(matches!(
            "/chat/1.0".parse::<SemVerProtocol>(),
            Err(ProtocolParseError::InvalidVersion { .. })
        ));
        assert!(matches!(
            "/chat/1.0.0.0".parse::<SemVerProtocol>(),
            Err(ProtocolParseError::InvalidVersion { .. })
        ));
        assert!(matches!(
            "/chat/one.0.0".parse::<SemVerProtocol>(),
            Err(ProtocolParseError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_new_validates_name() {
        let version = SemVer::new(1, 0, 0);

        let proto = SemVerProtocol::new("/chat", version).unwrap();
        assert_eq!(proto, "/chat/1.0.0".parse().unwrap());

        assert!(matches!(
            SemVerProtocol::new("chat", version),
            Err(ProtocolParseError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            SemVerProtocol::new("/", version),
            Err(ProtocolParseError::MissingName(_))
        ));
        assert!(matches!(
            SemVerProtocol::new("/ipfs//id", version),
            Err(ProtocolParseError::MissingName(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let proto: SemVerProtocol = "/ipfs/id/1.0.0".parse().unwrap();
        let bytes = postcard::to_allocvec(&proto).unwrap();
        assert_eq!(postcard::from_bytes::<SemVerProtocol>(&bytes).unwrap(), proto);

        let bytes = postcard::to_allocvec("chat/1.0.0").unwrap();
        assert!(postcard::from_bytes::<SemVerProtocol>(&bytes).is_err());
    }

    #[test]
    fn test_ordering() {
        let mut protocols: Vec<SemVerProtocol> =
            ["/mail/1.0.0", "/chat/2.0.0", "/chat/1.10.0", "/chat/1.2.0"]
                .iter()
                .map(|s| s.parse().unwrap())
                .collect();
        protocols.sort();

        let sorted: Vec<_> = protocols.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, ["/chat/1.2.0", "/chat/1.10.0", "/chat/2.0.0", "/mail/1.0.0"]);
    }

    #[test]
    fn test_compatibility() {
        let a: SemVerProtocol = "/chat/1.0.0".parse().unwrap();
        let b: SemVerProtocol = "/chat/1.4.2".parse().unwrap();
        let c: SemVerProtocol = "/chat/2.0.0".parse().unwrap();
        let d: SemVerProtocol = "/mail/1.0.0".parse().unwrap();

        assert!(a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&c));
        assert!(!a.is_compatible_with(&d));
    }
}
