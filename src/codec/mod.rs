//! DAWProject XML codec
//!
//! `encode` writes a validated project as canonical XML; `decode` parses,
//! version-gates, maps and validates a document. Both sides share one
//! validation gate, so a project accepted by one is accepted by the other.
//!
//! # Forward compatibility
//!
//! - Unknown attributes on `Project`, `Track`, `Channel`, `Device` and `Clip`
//!   are kept in the entity's `extensions` and written back, sorted by name,
//!   after the known attributes. Any XML name is accepted as a key.
//! - Unknown attributes on other elements are dropped.
//! - Unknown child elements are skipped and logged at `debug`, as are
//!   `<Parameters>` children without a `name` or `value`.
//! - Unknown parameter kinds, prefixed ones included, are kept as
//!   [`ParameterValue::Other`].
//!
//! Track nesting is capped at [`MAX_TRACK_DEPTH`]; deeper documents are
//! rejected as malformed.
//!
//! [`ParameterValue::Other`]: crate::model::ParameterValue::Other
//! [`MAX_TRACK_DEPTH`]: crate::structure::MAX_TRACK_DEPTH

pub mod decode;
pub(crate) mod dom;
pub mod encode;
pub mod validate;
pub mod version;

use sha2::{Digest, Sha256};

pub use decode::{decode, decode_str};
pub use encode::{encode, encode_to_string};
pub use validate::validate;
pub use version::{check_version, FormatVersion, FORMAT_VERSION, SUPPORTED_VERSION};

use crate::error::Result;
use crate::model::Project;

/// SHA-256 of the canonical encoding, as lowercase hex.
///
/// Two projects with equal fingerprints encode to identical bytes.
pub fn fingerprint(project: &Project) -> Result<String> {
    let bytes = encode(project)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Application;

    #[test]
    fn test_fingerprint_is_stable() {
        let project = Project::new(Application::new("Test", "1.0").unwrap()).unwrap();
        let a = fingerprint(&project).unwrap();
        let b = fingerprint(&decode(&encode(&project).unwrap()).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
