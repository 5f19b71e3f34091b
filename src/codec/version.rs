//! Format version gate.
//!
//! Documents declare their format version on the root element. Anything newer
//! than [`SUPPORTED_VERSION`] is rejected before any element is interpreted;
//! older versions are read as-is because the schema only ever grows.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{DawProjectError, Result};

/// Version written by the encoder.
pub const FORMAT_VERSION: &str = "1.0";

/// Highest version the decoder understands.
pub const SUPPORTED_VERSION: FormatVersion = FormatVersion { major: 1, minor: 0 };

/// A `major.minor` format version. A trailing `.patch` is accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        if let Some(patch) = parts.next() {
            patch.parse::<u32>().ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor })
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Reject versions that cannot be parsed or are newer than supported.
pub fn check_version(found: &str) -> Result<FormatVersion> {
    let unsupported = || DawProjectError::UnsupportedVersion {
        found: found.to_string(),
        supported: SUPPORTED_VERSION.to_string(),
    };
    let version = FormatVersion::parse(found).ok_or_else(unsupported)?;
    match version.cmp(&SUPPORTED_VERSION) {
        Ordering::Greater => Err(unsupported()),
        _ => Ok(version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_format_version_matches_supported() {
        assert_eq!(FormatVersion::parse(FORMAT_VERSION), Some(SUPPORTED_VERSION));
    }

    #[test_case("1.0", true ; "current")]
    #[test_case("1", true ; "major only")]
    #[test_case("0.9", true ; "older minor")]
    #[test_case("1.0.3", true ; "patch ignored")]
    #[test_case("1.1", false ; "newer minor")]
    #[test_case("2.0", false ; "newer major")]
    #[test_case("", false ; "empty")]
    #[test_case("one", false ; "not a number")]
    #[test_case("1.0.0.0", false ; "too many parts")]
    fn test_check_version(version: &str, ok: bool) {
        let result = check_version(version);
        assert_eq!(result.is_ok(), ok, "{version}: {result:?}");
        if let Err(err) = result {
            assert_eq!(err.error_code(), "UNSUPPORTED_VERSION");
        }
    }
}
