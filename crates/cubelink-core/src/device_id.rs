//! Canonical device identifiers.
//!
//! The Cube reports ids in several decorations: `{abc-1}` in notifications
//! and circuit listings, bare `abc-1` in most command parameters. A
//! [`DeviceId`] always holds the bare form so ids from either source compare
//! equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A device, sensor, valve, or circuit id with enclosing braces stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Canonicalize a raw id.
    ///
    /// Strips one leading `{` and one trailing `}` if present. Anything else
    /// passes through unchanged.
    pub fn canonical(raw: &str) -> Self {
        let trimmed = raw.strip_prefix('{').unwrap_or(raw);
        let trimmed = trimmed.strip_suffix('}').unwrap_or(trimmed);
        Self(trimmed.to_string())
    }

    /// The bare id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The braced form the Cube uses in its own listings.
    pub fn braced(&self) -> String {
        format!("{{{}}}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self::canonical(s);
        if id.0.is_empty() {
            return Err(DeviceIdError::Empty(s.to_string()));
        }
        Ok(id)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DeviceIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl PartialEq<str> for DeviceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DeviceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Error parsing a device id.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceIdError {
    #[error("device id is empty after canonicalization, got: {0:?}")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_enclosing_braces() {
        assert_eq!(DeviceId::canonical("{abc-1}"), "abc-1");
    }

    #[test]
    fn bare_id_unchanged() {
        assert_eq!(DeviceId::canonical("abc-1"), "abc-1");
    }

    #[test]
    fn strips_only_one_pair() {
        assert_eq!(DeviceId::canonical("{{abc}}"), "{abc}");
    }

    #[test]
    fn half_decorated() {
        assert_eq!(DeviceId::canonical("{abc"), "abc");
        assert_eq!(DeviceId::canonical("abc}"), "abc");
    }

    #[test]
    fn parse_rejects_empty() {
        assert!("{}".parse::<DeviceId>().is_err());
        assert!("".parse::<DeviceId>().is_err());
    }

    #[test]
    fn braced_form() {
        let id: DeviceId = "{xyz}".parse().unwrap();
        assert_eq!(id.braced(), "{xyz}");
        assert_eq!(id.to_string(), "xyz");
    }

    #[test]
    fn serde_canonicalizes() {
        let id: DeviceId = serde_json::from_str(r#""{d1}""#).unwrap();
        assert_eq!(id, "d1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""d1""#);
    }
}
