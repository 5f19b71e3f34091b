//! Error handling for dawproject
//!
//! Every failure names the offending entity, field or id so that callers can
//! report precise diagnostics. Nothing is silently repaired.

use thiserror::Error;

/// Result type alias for dawproject operations
pub type Result<T> = std::result::Result<T, DawProjectError>;

/// Main error type for model construction, validation and the XML codec
#[derive(Error, Debug)]
pub enum DawProjectError {
    // Model Errors
    #[error("Invalid field '{field}' on {entity}: {value} ({reason})")]
    InvalidField {
        entity: String,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Duplicate id: {id}")]
    DuplicateId { id: String },

    #[error("Dangling reference from {element}: no entity with id '{id}'")]
    DanglingReference { element: String, id: String },

    #[error("Routing cycle: {}", path.join(" -> "))]
    RoutingCycle { path: Vec<String> },

    // Document Errors
    #[error("Unsupported format version {found} (highest supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("Malformed document: {reason}")]
    MalformedDocument { reason: String },

    // Writer Errors
    #[error("XML writer error: {0}")]
    Xml(#[from] quick_xml::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DawProjectError {
    pub(crate) fn invalid(
        entity: impl Into<String>,
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        DawProjectError::InvalidField {
            entity: entity.into(),
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn dangling(element: impl Into<String>, id: impl Into<String>) -> Self {
        DawProjectError::DanglingReference {
            element: element.into(),
            id: id.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DawProjectError::MalformedDocument {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            DawProjectError::InvalidField { .. } => "INVALID_FIELD",
            DawProjectError::DuplicateId { .. } => "DUPLICATE_ID",
            DawProjectError::DanglingReference { .. } => "DANGLING_REFERENCE",
            DawProjectError::RoutingCycle { .. } => "ROUTING_CYCLE",
            DawProjectError::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            DawProjectError::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
            DawProjectError::Xml(_) => "XML_ERROR",
            DawProjectError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns true if the error describes the project or document content
    /// rather than a failure of the writer itself.
    pub fn is_content_error(&self) -> bool {
        !matches!(
            self,
            DawProjectError::Xml(_) | DawProjectError::Serialization(_)
        )
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            DawProjectError::InvalidField { .. } => {
                Some("Correct the field value and rebuild the entity.")
            }
            DawProjectError::DuplicateId { .. } => {
                Some("Give every track, channel, device, send, clip and lane its own id.")
            }
            DawProjectError::DanglingReference { .. } => {
                Some("Add the referenced entity or remove the reference first.")
            }
            DawProjectError::RoutingCycle { .. } => {
                Some("Route one of the listed channels to a different destination.")
            }
            DawProjectError::UnsupportedVersion { .. } => {
                Some("Upgrade dawproject to a release that understands this format version.")
            }
            DawProjectError::MalformedDocument { .. } => {
                Some("Check that the file is a complete DAWProject XML document.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DawProjectError::DuplicateId {
            id: "track-1".to_string(),
        };
        assert_eq!(err.error_code(), "DUPLICATE_ID");
        assert!(err.is_content_error());
    }

    #[test]
    fn test_routing_cycle_message_lists_path() {
        let err = DawProjectError::RoutingCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Routing cycle: a -> b -> a");
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_invalid_field_carries_context() {
        let err = DawProjectError::invalid("Channel 'ch-1'", "pan", 1.5, "must be within [-1, 1]");
        match &err {
            DawProjectError::InvalidField {
                entity,
                field,
                value,
                ..
            } => {
                assert_eq!(entity, "Channel 'ch-1'");
                assert_eq!(*field, "pan");
                assert_eq!(value, "1.5");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
