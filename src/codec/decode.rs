//! XML → Project
//!
//! Decoding runs in three stages: well-formedness (quick-xml into a small
//! element tree), the version gate, then element mapping. The mapped project
//! goes through the same validation gate as the encoder, so every reference
//! is resolved and every range checked before a project is handed out.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use super::dom::{self, Element};
use super::validate::validate;
use super::version::check_version;
use crate::error::{DawProjectError, Result};
use crate::model::arrangement::CLIP_ATTRIBUTES;
use crate::model::channel::{CHANNEL_ATTRIBUTES, PAN_MAX, PAN_MIN};
use crate::model::device::DEVICE_ATTRIBUTES;
use crate::model::project::PROJECT_ATTRIBUTES;
use crate::model::track::TRACK_ATTRIBUTES;
use crate::model::{
    db_to_linear, label, Application, Arrangement, AutomationLane, AutomationPoint,
    AutomationTarget, AuxSend, Channel, ChannelParameter, ClipPlacement, ContentType, Device,
    DeviceRole, Marker, MetaData, MixerRole, ParameterSet, ParameterValue, Project, SendType,
    TempoPoint, TimeSignature, TimeSignaturePoint, TimeUnit, Track, Transport,
};
use crate::structure::{Structure, MAX_TRACK_DEPTH};

/// Decode UTF-8 XML bytes into a validated project.
pub fn decode(bytes: &[u8]) -> Result<Project> {
    let xml = std::str::from_utf8(bytes).map_err(|err| {
        DawProjectError::malformed(format!("document is not valid UTF-8: {}", err))
    })?;
    decode_str(xml)
}

/// Decode an XML string into a validated project.
pub fn decode_str(xml: &str) -> Result<Project> {
    let root = dom::parse(xml)?;
    if root.name != "Project" {
        return Err(DawProjectError::malformed(format!(
            "root element is <{}>, expected <Project>",
            root.name
        )));
    }
    let version = root.required("version")?;
    check_version(version)?;

    let project = decode_project(&root)?;
    validate(&project)?;
    debug!(
        version = %project.version,
        tracks = project.structure.len(),
        "project decoded"
    );
    Ok(project)
}

// ============================================================================
// Attribute helpers
// ============================================================================

fn parse<T>(entity: &str, field: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err: T::Err| DawProjectError::invalid(entity, field, raw, err.to_string()))
}

fn required<T>(el: &Element, entity: &str, name: &'static str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse(entity, name, el.required(name)?)
}

fn optional<T>(el: &Element, entity: &str, name: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    el.attr(name).map(|raw| parse(entity, name, raw)).transpose()
}

/// Parse a closed-vocabulary token, reporting the entity it belongs to.
fn token<T>(entity: &str, field: &'static str, raw: &str) -> Result<T>
where
    T: FromStr<Err = DawProjectError>,
{
    raw.parse().map_err(|err| match err {
        DawProjectError::InvalidField { reason, .. } => {
            DawProjectError::invalid(entity, field, raw, reason)
        }
        other => other,
    })
}

fn optional_token<T>(el: &Element, entity: &str, name: &'static str) -> Result<Option<T>>
where
    T: FromStr<Err = DawProjectError>,
{
    el.attr(name).map(|raw| token(entity, name, raw)).transpose()
}

fn skip(parent: &Element, child: &Element) {
    debug!(parent = %parent.name, element = %child.name, "ignoring unknown element");
}

// ============================================================================
// Project
// ============================================================================

fn decode_project(root: &Element) -> Result<Project> {
    let mut application = None;
    let mut metadata = MetaData::default();
    let mut transport = Transport::default();
    let mut structure = Structure::new();
    let mut arrangement = Arrangement::new();

    for child in &root.children {
        match child.name.as_str() {
            "Application" => {
                application = Some(Application {
                    name: child.required("name")?.to_string(),
                    version: child.attr("version").unwrap_or_default().to_string(),
                });
            }
            "MetaData" => {
                metadata = MetaData {
                    title: child.attr("title").map(String::from),
                    artist: child.attr("artist").map(String::from),
                    comment: child.attr("comment").map(String::from),
                };
            }
            "Transport" => transport = decode_transport(child)?,
            "Structure" => {
                for el in &child.children {
                    match el.name.as_str() {
                        "Track" => structure.push(decode_track(el, 0)?),
                        _ => skip(child, el),
                    }
                }
            }
            "Arrangement" => arrangement = decode_arrangement(child)?,
            _ => skip(root, child),
        }
    }

    let application = application
        .ok_or_else(|| DawProjectError::malformed("<Project> has no <Application> element"))?;

    Ok(Project {
        version: root.required("version")?.to_string(),
        application,
        metadata,
        transport,
        structure,
        arrangement,
        extensions: root.unknown_attributes(PROJECT_ATTRIBUTES),
    })
}

fn decode_transport(el: &Element) -> Result<Transport> {
    let mut transport = Transport::default();
    for child in &el.children {
        match child.name.as_str() {
            "Tempo" => transport.tempo = parse("Transport", "tempo", child.required("value")?)?,
            "TimeSignature" => transport.time_signature = decode_signature(child, "Transport")?,
            _ => skip(el, child),
        }
    }
    Ok(transport)
}

fn decode_signature(el: &Element, entity: &str) -> Result<TimeSignature> {
    Ok(TimeSignature {
        numerator: required(el, entity, "numerator")?,
        denominator: required(el, entity, "denominator")?,
    })
}

// ============================================================================
// Structure
// ============================================================================

/// Nesting is bounded by [`MAX_TRACK_DEPTH`], which keeps the recursion shallow.
fn decode_track(el: &Element, depth: usize) -> Result<Track> {
    if depth > MAX_TRACK_DEPTH {
        return Err(DawProjectError::malformed(format!(
            "{} is nested deeper than {} levels",
            el.describe(),
            MAX_TRACK_DEPTH
        )));
    }
    let id = el.required("id")?.to_string();
    let entity = label("Track", &id);

    let content_types = el
        .attr("contentType")
        .unwrap_or_default()
        .split_whitespace()
        .map(|raw| token::<ContentType>(&entity, "content_types", raw))
        .collect::<Result<BTreeSet<_>>>()?;

    let mut channel = None;
    let mut children = Vec::new();
    for child in &el.children {
        match child.name.as_str() {
            "Channel" => {
                if channel.is_some() {
                    return Err(DawProjectError::malformed(format!(
                        "{} has more than one <Channel>",
                        el.describe()
                    )));
                }
                channel = Some(decode_channel(child)?);
            }
            "Track" => children.push(decode_track(child, depth + 1)?),
            _ => skip(el, child),
        }
    }
    let channel = channel.ok_or_else(|| {
        DawProjectError::malformed(format!("{} has no <Channel>", el.describe()))
    })?;

    Ok(Track {
        id,
        name: el.required("name")?.to_string(),
        content_types,
        color: el.attr("color").map(String::from),
        channel,
        children,
        extensions: el.unknown_attributes(TRACK_ATTRIBUTES),
    })
}

fn decode_channel(el: &Element) -> Result<Channel> {
    let id = el.required("id")?.to_string();
    let entity = label("Channel", &id);

    let mut channel = Channel {
        role: token::<MixerRole>(&entity, "role", el.required("role")?)?,
        audio_channels: optional(el, &entity, "audioChannels")?.unwrap_or(2),
        volume: 1.0,
        pan: 0.0,
        muted: false,
        solo: optional(el, &entity, "solo")?.unwrap_or(false),
        destination: el.attr("destination").map(String::from),
        devices: Vec::new(),
        sends: Vec::new(),
        extensions: el.unknown_attributes(CHANNEL_ATTRIBUTES),
        id,
    };

    for child in &el.children {
        match child.name.as_str() {
            "Volume" => channel.volume = decode_volume(child, &entity)?,
            "Pan" => channel.pan = decode_pan(child, &entity)?,
            "Mute" => channel.muted = parse(&entity, "muted", child.required("value")?)?,
            "Devices" => {
                for device in &child.children {
                    match device.name.as_str() {
                        "Device" => channel.devices.push(decode_device(device)?),
                        _ => skip(child, device),
                    }
                }
            }
            "Sends" => {
                for send in &child.children {
                    match send.name.as_str() {
                        "Send" => channel.sends.push(decode_send(send)?),
                        _ => skip(child, send),
                    }
                }
            }
            _ => skip(el, child),
        }
    }
    Ok(channel)
}

/// Linear gain, converting from decibels when the element says so.
fn decode_volume(el: &Element, entity: &str) -> Result<f64> {
    let value: f64 = parse(entity, "volume", el.required("value")?)?;
    match el.attr("unit").unwrap_or("linear") {
        "linear" => Ok(value),
        "decibel" => Ok(db_to_linear(value)),
        other => Err(DawProjectError::invalid(
            entity,
            "volume",
            other,
            "unit must be linear or decibel",
        )),
    }
}

/// Pan in [-1, 1]; other declared ranges are mapped linearly onto it.
fn decode_pan(el: &Element, entity: &str) -> Result<f64> {
    let value: f64 = parse(entity, "pan", el.required("value")?)?;
    let min = optional(el, entity, "min")?.unwrap_or(PAN_MIN);
    let max = optional(el, entity, "max")?.unwrap_or(PAN_MAX);
    if min == PAN_MIN && max == PAN_MAX {
        return Ok(value);
    }
    if !min.is_finite() || !max.is_finite() || max <= min {
        return Err(DawProjectError::invalid(
            entity,
            "pan",
            format!("[{}, {}]", min, max),
            "declared pan range must be finite with min < max",
        ));
    }
    let pan = PAN_MIN + (value - min) / (max - min) * (PAN_MAX - PAN_MIN);
    warn!(entity, value, min, max, pan, "rescaled pan into [-1, 1]");
    Ok(pan)
}

fn decode_device(el: &Element) -> Result<Device> {
    let id = el.required("id")?.to_string();
    let entity = label("Device", &id);

    let mut parameters = ParameterSet::new();
    for child in &el.children {
        match child.name.as_str() {
            "Parameters" => {
                for param in &child.children {
                    let (Some(name), Some(raw)) = (param.attr("name"), param.attr("value")) else {
                        debug!(
                            device = %id,
                            element = %param.name,
                            "skipping parameter without name or value"
                        );
                        continue;
                    };
                    let value = match param.name.as_str() {
                        "RealParameter" => ParameterValue::Real(parse(&entity, "parameters", raw)?),
                        "IntegerParameter" => {
                            ParameterValue::Integer(parse(&entity, "parameters", raw)?)
                        }
                        "BoolParameter" => ParameterValue::Bool(parse(&entity, "parameters", raw)?),
                        "TextParameter" => ParameterValue::Text(raw.to_string()),
                        kind => {
                            debug!(device = %id, kind, "keeping unrecognised parameter kind");
                            ParameterValue::Other {
                                kind: kind.to_string(),
                                value: raw.to_string(),
                            }
                        }
                    };
                    if parameters.contains(name) {
                        return Err(DawProjectError::invalid(
                            entity,
                            "parameters",
                            name,
                            "parameter names must be unique per device",
                        ));
                    }
                    parameters.insert(name, value)?;
                }
            }
            _ => skip(el, child),
        }
    }

    Ok(Device {
        name: el.required("name")?.to_string(),
        role: optional_token(el, &entity, "role")?.unwrap_or(DeviceRole::AudioFx),
        enabled: optional(el, &entity, "enabled")?.unwrap_or(true),
        device_id: el.attr("deviceID").map(String::from),
        vendor: el.attr("deviceVendor").map(String::from),
        parameters,
        extensions: el.unknown_attributes(DEVICE_ATTRIBUTES),
        id,
    })
}

fn decode_send(el: &Element) -> Result<AuxSend> {
    let id = el.required("id")?.to_string();
    let entity = label("Send", &id);

    let mut volume = 1.0;
    for child in &el.children {
        match child.name.as_str() {
            "Volume" => volume = decode_volume(child, &entity)?,
            _ => skip(el, child),
        }
    }

    Ok(AuxSend {
        destination: el.required("destination")?.to_string(),
        volume,
        send_type: optional_token(el, &entity, "type")?.unwrap_or(SendType::Post),
        enabled: optional(el, &entity, "enabled")?.unwrap_or(true),
        id,
    })
}

// ============================================================================
// Arrangement
// ============================================================================

fn decode_arrangement(el: &Element) -> Result<Arrangement> {
    let mut arrangement = Arrangement {
        time_unit: optional_token(el, "Arrangement", "timeUnit")?.unwrap_or(TimeUnit::Beats),
        ..Arrangement::default()
    };

    for child in &el.children {
        match child.name.as_str() {
            "TempoAutomation" => {
                for point in children_named(child, "RealPoint") {
                    arrangement.tempo.push(TempoPoint {
                        time: required(point, "TempoAutomation", "time")?,
                        bpm: parse("TempoAutomation", "tempo", point.required("value")?)?,
                    });
                }
            }
            "TimeSignatureAutomation" => {
                for point in children_named(child, "TimeSignaturePoint") {
                    arrangement.time_signatures.push(TimeSignaturePoint {
                        time: required(point, "TimeSignatureAutomation", "time")?,
                        signature: decode_signature(point, "TimeSignatureAutomation")?,
                    });
                }
            }
            "Markers" => {
                for marker in children_named(child, "Marker") {
                    arrangement.markers.push(Marker {
                        time: required(marker, "Marker", "time")?,
                        name: marker.required("name")?.to_string(),
                    });
                }
            }
            "Clips" => {
                for clip in children_named(child, "Clip") {
                    arrangement.clips.push(decode_clip(clip)?);
                }
            }
            "Automation" => {
                for lane in children_named(child, "Points") {
                    arrangement.automation.push(decode_lane(lane)?);
                }
            }
            _ => skip(el, child),
        }
    }
    Ok(arrangement)
}

/// Children with the given name; anything else is logged and skipped.
fn children_named<'a>(parent: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    parent.children.iter().filter(move |child| {
        let keep = child.name == name;
        if !keep {
            skip(parent, child);
        }
        keep
    })
}

fn decode_clip(el: &Element) -> Result<ClipPlacement> {
    let id = el.required("id")?.to_string();
    let entity = label("Clip", &id);

    let mut file = None;
    for child in &el.children {
        match child.name.as_str() {
            "File" => file = Some(child.required("path")?.to_string()),
            _ => skip(el, child),
        }
    }

    Ok(ClipPlacement {
        track: el.required("track")?.to_string(),
        time: required(el, &entity, "time")?,
        duration: required(el, &entity, "duration")?,
        play_start: optional(el, &entity, "playStart")?.unwrap_or(0.0),
        name: el.attr("name").map(String::from),
        file,
        extensions: el.unknown_attributes(CLIP_ATTRIBUTES),
        id,
    })
}

fn decode_lane(el: &Element) -> Result<AutomationLane> {
    let id = el.required("id")?.to_string();
    let entity = label("AutomationLane", &id);

    let mut target = None;
    let mut points = Vec::new();
    for child in &el.children {
        match child.name.as_str() {
            "Target" => target = Some(decode_target(child, &entity)?),
            "RealPoint" => points.push(AutomationPoint {
                time: required(child, &entity, "time")?,
                value: required(child, &entity, "value")?,
            }),
            _ => skip(el, child),
        }
    }
    let target = target
        .ok_or_else(|| DawProjectError::malformed(format!("{} has no <Target>", el.describe())))?;

    Ok(AutomationLane { id, target, points })
}

fn decode_target(el: &Element, entity: &str) -> Result<AutomationTarget> {
    let parameter = el.required("parameter")?;
    if let Some(channel) = el.attr("channel") {
        return Ok(AutomationTarget::Channel {
            channel: channel.to_string(),
            parameter: token::<ChannelParameter>(entity, "target", parameter)?,
        });
    }
    if let Some(device) = el.attr("device") {
        return Ok(AutomationTarget::Device {
            device: device.to_string(),
            parameter: parameter.to_string(),
        });
    }
    Err(DawProjectError::malformed(format!(
        "<Target> of {} names neither a channel nor a device",
        entity
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Project version="1.0">
  <Application name="Test" version="1"/>
  <Structure>
    <Track id="master" name="Master" contentType="audio">
      <Channel id="master-ch" role="master" audioChannels="2" solo="false">
        <Volume unit="linear" value="1"/>
        <Pan unit="normalized" min="-1" max="1" value="0"/>
        <Mute value="false"/>
      </Channel>
    </Track>
  </Structure>
  <Arrangement timeUnit="beats"/>
</Project>
"#;

    fn with_track(track: &str) -> String {
        MINIMAL.replace("  </Structure>", &format!("{}\n  </Structure>", track))
    }

    #[test]
    fn test_decode_minimal() {
        let project = decode(MINIMAL.as_bytes()).unwrap();
        assert_eq!(project.version, "1.0");
        assert_eq!(project.application.name, "Test");
        let master = project.track("master").unwrap();
        assert_eq!(master.role(), MixerRole::Master);
        assert!(master.carries(ContentType::Audio));
        assert_eq!(project.transport, Transport::default());
    }

    #[test]
    fn test_channel_defaults_when_children_missing() {
        let xml = with_track(
            r#"<Track id="t" name="T"><Channel id="t-ch" role="regular" destination="master-ch"/></Track>"#,
        );
        let project = decode_str(&xml).unwrap();
        let channel = project.channel("t-ch").unwrap();
        assert_eq!(channel.volume, 1.0);
        assert_eq!(channel.pan, 0.0);
        assert!(!channel.muted);
        assert_eq!(channel.audio_channels, 2);
    }

    #[test]
    fn test_pan_range_rescaled() {
        let xml = with_track(
            r#"<Track id="t" name="T"><Channel id="t-ch" role="regular">
                 <Pan unit="normalized" min="0" max="1" value="0.75"/>
               </Channel></Track>"#,
        );
        let project = decode_str(&xml).unwrap();
        assert_relative_eq!(project.channel("t-ch").unwrap().pan, 0.5);
    }

    #[test]
    fn test_decibel_volume_converted() {
        let xml = with_track(
            r#"<Track id="t" name="T"><Channel id="t-ch" role="regular">
                 <Volume unit="decibel" value="-6"/>
               </Channel></Track>"#,
        );
        let project = decode_str(&xml).unwrap();
        assert_relative_eq!(project.channel("t-ch").unwrap().volume, 0.501187, epsilon = 1e-6);
    }

    #[test]
    fn test_unknown_role_token() {
        let xml = MINIMAL.replace("role=\"master\"", "role=\"MASTER\"");
        match decode_str(&xml) {
            Err(DawProjectError::InvalidField { entity, field, value, .. }) => {
                assert_eq!(entity, "Channel 'master-ch'");
                assert_eq!(field, "role");
                assert_eq!(value, "MASTER");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_track_without_channel() {
        let xml = with_track(r#"<Track id="t" name="T"/>"#);
        assert!(matches!(
            decode_str(&xml),
            Err(DawProjectError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_version_checked_before_mapping() {
        let xml = r#"<Project version="2.0"><Structure><Track/></Structure></Project>"#;
        assert!(matches!(
            decode_str(xml),
            Err(DawProjectError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_wrong_root() {
        let err = decode_str(r#"<Song version="1.0"/>"#).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode(&[0x3c, 0xff, 0xfe]).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }

    #[test]
    fn test_unknown_parameter_kind_kept() {
        let xml = with_track(
            r#"<Track id="t" name="T"><Channel id="t-ch" role="regular">
                 <Devices>
                   <Device id="dev" name="Synth" role="instrument" enabled="true">
                     <Parameters>
                       <RealParameter name="cutoff" value="0.25"/>
                       <EnumParameter name="mode" value="saw"/>
                     </Parameters>
                   </Device>
                 </Devices>
               </Channel></Track>"#,
        );
        let project = decode_str(&xml).unwrap();
        let device = project.channel("t-ch").unwrap().device("dev").unwrap();
        assert_eq!(device.role, DeviceRole::Instrument);
        assert_eq!(device.parameters.get("cutoff"), Some(&ParameterValue::Real(0.25)));
        assert_eq!(
            device.parameters.get("mode"),
            Some(&ParameterValue::Other {
                kind: "EnumParameter".into(),
                value: "saw".into()
            })
        );
    }

    #[test]
    fn test_parameter_elements_from_newer_writers() {
        let xml = with_track(
            r#"<Track id="t" name="T"><Channel id="t-ch" role="regular">
                 <Devices><Device id="dev" name="Synth"><Parameters>
                   <ParameterGroup label="filter"/>
                   <RealParameter value="0.5"/>
                   <vnd:CurveParameter name="curve" value="0 0.5 1"/>
                   <RealParameter name="cutoff" value="0.25"/>
                 </Parameters></Device></Devices>
               </Channel></Track>"#,
        );
        let project = decode_str(&xml).unwrap();
        let device = project.channel("t-ch").unwrap().device("dev").unwrap();
        let names: Vec<_> = device.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["curve", "cutoff"]);
        assert_eq!(
            device.parameters.get("curve"),
            Some(&ParameterValue::Other {
                kind: "vnd:CurveParameter".into(),
                value: "0 0.5 1".into()
            })
        );
    }

    fn nested_tracks(depth: usize) -> String {
        let mut xml = String::new();
        for i in 0..depth {
            xml.push_str(&format!(
                r#"<Track id="t{i}" name="T{i}"><Channel id="t{i}-ch" role="regular"/>"#
            ));
        }
        xml.push_str(&"</Track>".repeat(depth));
        with_track(&xml)
    }

    #[test]
    fn test_nesting_up_to_the_limit_round_trips() {
        let project = decode_str(&nested_tracks(MAX_TRACK_DEPTH + 1)).unwrap();
        let deepest = project.structure.depth_first().map(|(depth, _)| depth).max();
        assert_eq!(deepest, Some(MAX_TRACK_DEPTH));

        let xml = crate::codec::encode(&project).unwrap();
        assert_eq!(decode(&xml).unwrap(), project);
    }

    #[test]
    fn test_nesting_past_the_limit_is_malformed() {
        let err = decode_str(&nested_tracks(MAX_TRACK_DEPTH + 2)).unwrap_err();
        assert!(err.to_string().contains("nested deeper than"), "{err}");
    }

    #[test]
    fn test_runaway_nesting_is_malformed() {
        let err = decode_str(&nested_tracks(20_000)).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }

    #[test]
    fn test_duplicate_parameter_name() {
        let xml = with_track(
            r#"<Track id="t" name="T"><Channel id="t-ch" role="regular">
                 <Devices><Device id="dev" name="EQ"><Parameters>
                   <RealParameter name="gain" value="1"/>
                   <RealParameter name="gain" value="2"/>
                 </Parameters></Device></Devices>
               </Channel></Track>"#,
        );
        assert!(matches!(
            decode_str(&xml),
            Err(DawProjectError::InvalidField { field: "parameters", .. })
        ));
    }
}
