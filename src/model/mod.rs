//! Entity Model
//!
//! Plain data types describing a DAW project. Every constructor validates its
//! fields and fails with `InvalidField`; the same checks run again in the
//! codec's validation gate because fields stay public for direct assignment.

pub mod arrangement;
pub mod channel;
pub mod device;
pub mod enums;
pub mod project;
pub mod track;

use std::collections::BTreeMap;

pub use arrangement::{
    Arrangement, AutomationLane, AutomationPoint, AutomationTarget, ClipPlacement, Marker,
    TempoPoint, TimeSignature, TimeSignaturePoint,
};
pub use channel::{db_to_linear, linear_to_db, AuxSend, Channel, ChannelConfig};
pub use device::{Device, DeviceConfig, Parameter, ParameterSet, ParameterValue};
pub use enums::{ChannelParameter, ContentType, DeviceRole, MixerRole, SendType, TimeUnit};
pub use project::{Application, MetaData, Project, Transport};
pub use track::{Track, TrackConfig};

use crate::error::{DawProjectError, Result};

/// Unknown attributes kept verbatim for forward compatibility.
pub type Extensions = BTreeMap<String, String>;

pub(crate) fn label(kind: &str, id: &str) -> String {
    format!("{} '{}'", kind, id)
}

pub(crate) fn check_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(DawProjectError::invalid(
            label(kind, id),
            "id",
            format!("{:?}", id),
            "must not be empty",
        ));
    }
    Ok(())
}

pub(crate) fn check_name(entity: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DawProjectError::invalid(
            entity,
            "name",
            format!("{:?}", name),
            "must not be empty",
        ));
    }
    Ok(())
}

/// Checks `min <= value <= max` and rejects NaN/infinite values.
pub(crate) fn check_range(
    entity: &str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(DawProjectError::invalid(
            entity,
            field,
            value,
            format!("must be within [{}, {}]", min, max),
        ));
    }
    Ok(())
}

/// Checks `value >= min` and rejects NaN/infinite values.
pub(crate) fn check_at_least(entity: &str, field: &'static str, value: f64, min: f64) -> Result<()> {
    if !value.is_finite() || value < min {
        return Err(DawProjectError::invalid(
            entity,
            field,
            value,
            format!("must be a finite value >= {}", min),
        ));
    }
    Ok(())
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// XML 1.0 `Name` production (element and attribute names, prefixes included).
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

/// Extension keys must be XML names that do not shadow a known attribute.
pub(crate) fn check_extensions(entity: &str, extensions: &Extensions, known: &[&str]) -> Result<()> {
    for key in extensions.keys() {
        if !is_xml_name(key) {
            return Err(DawProjectError::invalid(
                entity,
                "extensions",
                key,
                "not a valid XML attribute name",
            ));
        }
        if known.contains(&key.as_str()) {
            return Err(DawProjectError::invalid(
                entity,
                "extensions",
                key,
                "shadows a known attribute",
            ));
        }
    }
    Ok(())
}
