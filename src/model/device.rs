//! Devices and their parameter sets
//!
//! A device's parameters are a free-form, ordered bag of named values as
//! supplied by whatever produced the settings (an EQ, a compressor, a plugin).
//! Names are unique within one device; value kinds this crate does not know
//! are kept verbatim instead of being coerced.

use serde::{Deserialize, Serialize};

use super::{check_extensions, check_id, check_name, is_xml_name, label, DeviceRole, Extensions};
use crate::error::{DawProjectError, Result};

/// Attribute names the codec writes for a device.
pub(crate) const DEVICE_ATTRIBUTES: &[&str] =
    &["id", "name", "role", "enabled", "deviceID", "deviceVendor"];

/// Element names of the parameter kinds the codec maps to typed values.
pub(crate) const PARAMETER_KINDS: &[&str] = &[
    "RealParameter",
    "IntegerParameter",
    "BoolParameter",
    "TextParameter",
];

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Real(f64),
    Integer(i64),
    Bool(bool),
    Text(String),
    /// A value kind written by a newer tool, kept as its element name and raw value.
    Other { kind: String, value: String },
}

impl ParameterValue {
    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Real(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Real(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

/// One named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
}

/// Ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    entries: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter; a name already present is an error.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DawProjectError::invalid(
                "ParameterSet",
                "parameters",
                format!("{:?}", name),
                "parameter name must not be empty",
            ));
        }
        if self.contains(&name) {
            return Err(DawProjectError::invalid(
                "ParameterSet",
                "parameters",
                name,
                "parameter names must be unique per device",
            ));
        }
        self.entries.push(Parameter {
            name,
            value: value.into(),
        });
        Ok(())
    }

    /// Replace the value of an existing parameter or append a new one.
    ///
    /// Returns the previous value if there was one.
    pub fn set(&mut self, name: &str, value: impl Into<ParameterValue>) -> Result<Option<ParameterValue>> {
        match self.entries.iter_mut().find(|p| p.name == name) {
            Some(param) => Ok(Some(std::mem::replace(&mut param.value, value.into()))),
            None => self.insert(name, value).map(|_| None),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.entries.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first duplicated name, if any. Deserialized sets bypass `insert`.
    pub(crate) fn first_duplicate(&self) -> Option<&str> {
        self.entries.iter().enumerate().find_map(|(i, p)| {
            self.entries[..i]
                .iter()
                .any(|q| q.name == p.name)
                .then_some(p.name.as_str())
        })
    }
}

/// Configuration for [`Device::new`].
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    pub role: DeviceRole,
    pub enabled: bool,
    /// Plugin or built-in device identifier.
    pub device_id: Option<String>,
    pub vendor: Option<String>,
    pub parameters: ParameterSet,
}

/// A processing device in a channel's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub role: DeviceRole,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl Device {
    /// Create a device, rejecting empty ids/names and duplicate parameter names.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let device = Self {
            id: config.id,
            name: config.name,
            role: config.role,
            enabled: config.enabled,
            device_id: config.device_id,
            vendor: config.vendor,
            parameters: config.parameters,
            extensions: Extensions::new(),
        };
        device.check()?;
        Ok(device)
    }

    /// Field-level checks shared by the constructor and the validation gate.
    pub fn check(&self) -> Result<()> {
        check_id("Device", &self.id)?;
        let entity = label("Device", &self.id);
        check_name(&entity, &self.name)?;
        if let Some(name) = self.parameters.first_duplicate() {
            return Err(DawProjectError::invalid(
                entity,
                "parameters",
                name,
                "parameter names must be unique per device",
            ));
        }
        for param in self.parameters.iter() {
            if param.name.trim().is_empty() {
                return Err(DawProjectError::invalid(
                    entity,
                    "parameters",
                    format!("{:?}", param.name),
                    "parameter name must not be empty",
                ));
            }
            if let ParameterValue::Real(v) = param.value {
                if !v.is_finite() {
                    return Err(DawProjectError::invalid(
                        entity,
                        "parameters",
                        format!("{}={}", param.name, v),
                        "real parameters must be finite",
                    ));
                }
            }
            if let ParameterValue::Other { kind, .. } = &param.value {
                if !is_xml_name(kind) || PARAMETER_KINDS.contains(&kind.as_str()) {
                    return Err(DawProjectError::invalid(
                        entity,
                        "parameters",
                        format!("{} ({})", param.name, kind),
                        "preserved parameter kind must be an unrecognised element name",
                    ));
                }
            }
        }
        check_extensions(&entity, &self.extensions, DEVICE_ATTRIBUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq_config() -> DeviceConfig {
        DeviceConfig {
            id: "eq-1".into(),
            name: "EQ".into(),
            role: DeviceRole::AudioFx,
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_parameter_set_preserves_order() {
        let mut params = ParameterSet::new();
        params.insert("low_gain", -3.0).unwrap();
        params.insert("bands", 4_i64).unwrap();
        params.insert("bypass", false).unwrap();

        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["low_gain", "bands", "bypass"]);
        assert_eq!(params.get("bands").and_then(|v| v.as_f64()), Some(4.0));
    }

    #[test]
    fn test_parameter_set_rejects_duplicates() {
        let mut params = ParameterSet::new();
        params.insert("gain", 1.0).unwrap();
        let err = params.insert("gain", 2.0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FIELD");

        let previous = params.set("gain", 2.0).unwrap();
        assert_eq!(previous, Some(ParameterValue::Real(1.0)));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_device_new_rejects_empty_name() {
        let config = DeviceConfig {
            name: "  ".into(),
            ..eq_config()
        };
        assert!(Device::new(config).is_err());
    }

    #[test]
    fn test_preserved_parameter_kinds() {
        let mut device = Device::new(eq_config()).unwrap();
        let other = |kind: &str| ParameterValue::Other {
            kind: kind.into(),
            value: "x".into(),
        };
        device.parameters.insert("curve", other("vnd:CurveParameter")).unwrap();
        device.parameters.insert("größe", other("GrößeParameter")).unwrap();
        assert!(device.check().is_ok());

        device.parameters.set("curve", other("Curve Parameter")).unwrap();
        assert!(device.check().is_err());
        device.parameters.set("curve", other("RealParameter")).unwrap();
        assert!(device.check().is_err());
    }

    #[test]
    fn test_device_check_catches_assigned_nan() {
        let mut device = Device::new(eq_config()).unwrap();
        device.parameters.insert("gain", f64::NAN).unwrap();
        assert!(device.check().is_err());
    }
}
