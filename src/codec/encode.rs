//! Project → XML
//!
//! Elements are written in a fixed order: application, metadata, transport,
//! structure (depth first, stored child order), arrangement. References are
//! written as id attributes only. Floats use the shortest representation that
//! parses back to the same value, so encoding is byte-stable and lossless.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use tracing::debug;

use super::validate::validate;
use crate::error::{DawProjectError, Result};
use crate::model::{
    Arrangement, AutomationLane, AutomationTarget, AuxSend, Channel, ClipPlacement, Device,
    Extensions, ParameterValue, Project, Track,
};

/// Validate and encode a project as UTF-8 XML bytes.
pub fn encode(project: &Project) -> Result<Vec<u8>> {
    validate(project)?;
    let mut out = XmlOut::new();
    out.project(project)?;
    let bytes = out.finish();
    debug!(bytes = bytes.len(), "project encoded");
    Ok(bytes)
}

/// Like [`encode`] but returns a `String`.
pub fn encode_to_string(project: &Project) -> Result<String> {
    let bytes = encode(project)?;
    String::from_utf8(bytes)
        .map_err(|err| DawProjectError::malformed(format!("encoder produced invalid UTF-8: {}", err)))
}

type Attrs<'a> = Vec<(&'a str, String)>;

fn num(value: f64) -> String {
    format!("{}", value)
}

fn flag(value: bool) -> String {
    value.to_string()
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn finish(self) -> Vec<u8> {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        bytes
    }

    fn tag<'a>(name: &'a str, attrs: &[(&str, String)], extensions: Option<&Extensions>) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for (key, value) in attrs {
            start.push_attribute((*key, value.as_str()));
        }
        if let Some(extensions) = extensions {
            for (key, value) in extensions {
                start.push_attribute((key.as_str(), value.as_str()));
            }
        }
        start
    }

    fn empty(&mut self, name: &str, attrs: Attrs<'_>) -> Result<()> {
        self.writer
            .write_event(Event::Empty(Self::tag(name, &attrs, None)))?;
        Ok(())
    }

    fn start(&mut self, name: &str, attrs: Attrs<'_>, extensions: Option<&Extensions>) -> Result<()> {
        self.writer
            .write_event(Event::Start(Self::tag(name, &attrs, extensions)))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn project(&mut self, project: &Project) -> Result<()> {
        self.writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            Some("yes"),
        )))?;
        self.start(
            "Project",
            vec![("version", project.version.clone())],
            Some(&project.extensions),
        )?;

        self.empty(
            "Application",
            vec![
                ("name", project.application.name.clone()),
                ("version", project.application.version.clone()),
            ],
        )?;

        let meta = &project.metadata;
        if !meta.is_empty() {
            let mut attrs = Attrs::new();
            if let Some(title) = &meta.title {
                attrs.push(("title", title.clone()));
            }
            if let Some(artist) = &meta.artist {
                attrs.push(("artist", artist.clone()));
            }
            if let Some(comment) = &meta.comment {
                attrs.push(("comment", comment.clone()));
            }
            self.empty("MetaData", attrs)?;
        }

        self.start("Transport", Attrs::new(), None)?;
        self.empty(
            "Tempo",
            vec![("unit", "bpm".into()), ("value", num(project.transport.tempo))],
        )?;
        let signature = project.transport.time_signature;
        self.empty(
            "TimeSignature",
            vec![
                ("numerator", signature.numerator.to_string()),
                ("denominator", signature.denominator.to_string()),
            ],
        )?;
        self.end("Transport")?;

        let roots = project.structure.roots();
        if roots.is_empty() {
            self.empty("Structure", Attrs::new())?;
        } else {
            self.start("Structure", Attrs::new(), None)?;
            for track in roots {
                self.track(track)?;
            }
            self.end("Structure")?;
        }

        self.arrangement(&project.arrangement)?;
        self.end("Project")
    }

    /// Depth is bounded by the validation gate ([`crate::structure::MAX_TRACK_DEPTH`]).
    fn track(&mut self, track: &Track) -> Result<()> {
        let content: Vec<&str> = track.content_types.iter().map(|c| c.as_str()).collect();
        let mut attrs = vec![
            ("id", track.id.clone()),
            ("name", track.name.clone()),
            ("contentType", content.join(" ")),
        ];
        if let Some(color) = &track.color {
            attrs.push(("color", color.clone()));
        }
        self.start("Track", attrs, Some(&track.extensions))?;
        self.channel(&track.channel)?;
        for child in &track.children {
            self.track(child)?;
        }
        self.end("Track")
    }

    fn channel(&mut self, channel: &Channel) -> Result<()> {
        let mut attrs = vec![
            ("id", channel.id.clone()),
            ("role", channel.role.as_str().to_string()),
            ("audioChannels", channel.audio_channels.to_string()),
            ("solo", flag(channel.solo)),
        ];
        if let Some(dest) = &channel.destination {
            attrs.push(("destination", dest.clone()));
        }
        self.start("Channel", attrs, Some(&channel.extensions))?;
        self.volume(channel.volume)?;
        self.empty(
            "Pan",
            vec![
                ("unit", "normalized".into()),
                ("min", num(crate::model::channel::PAN_MIN)),
                ("max", num(crate::model::channel::PAN_MAX)),
                ("value", num(channel.pan)),
            ],
        )?;
        self.empty("Mute", vec![("value", flag(channel.muted))])?;

        if !channel.devices.is_empty() {
            self.start("Devices", Attrs::new(), None)?;
            for device in &channel.devices {
                self.device(device)?;
            }
            self.end("Devices")?;
        }
        if !channel.sends.is_empty() {
            self.start("Sends", Attrs::new(), None)?;
            for send in &channel.sends {
                self.send(send)?;
            }
            self.end("Sends")?;
        }
        self.end("Channel")
    }

    fn volume(&mut self, volume: f64) -> Result<()> {
        self.empty(
            "Volume",
            vec![("unit", "linear".into()), ("value", num(volume))],
        )
    }

    fn device(&mut self, device: &Device) -> Result<()> {
        let mut attrs = vec![
            ("id", device.id.clone()),
            ("name", device.name.clone()),
            ("role", device.role.as_str().to_string()),
            ("enabled", flag(device.enabled)),
        ];
        if let Some(device_id) = &device.device_id {
            attrs.push(("deviceID", device_id.clone()));
        }
        if let Some(vendor) = &device.vendor {
            attrs.push(("deviceVendor", vendor.clone()));
        }
        if device.parameters.is_empty() {
            self.writer.write_event(Event::Empty(Self::tag(
                "Device",
                &attrs,
                Some(&device.extensions),
            )))?;
            return Ok(());
        }

        self.start("Device", attrs, Some(&device.extensions))?;
        self.start("Parameters", Attrs::new(), None)?;
        for param in device.parameters.iter() {
            let (kind, value) = match &param.value {
                ParameterValue::Real(v) => ("RealParameter", num(*v)),
                ParameterValue::Integer(v) => ("IntegerParameter", v.to_string()),
                ParameterValue::Bool(v) => ("BoolParameter", flag(*v)),
                ParameterValue::Text(v) => ("TextParameter", v.clone()),
                ParameterValue::Other { kind, value } => (kind.as_str(), value.clone()),
            };
            self.empty(kind, vec![("name", param.name.clone()), ("value", value)])?;
        }
        self.end("Parameters")?;
        self.end("Device")
    }

    fn send(&mut self, send: &AuxSend) -> Result<()> {
        self.start(
            "Send",
            vec![
                ("id", send.id.clone()),
                ("destination", send.destination.clone()),
                ("type", send.send_type.as_str().to_string()),
                ("enabled", flag(send.enabled)),
            ],
            None,
        )?;
        self.volume(send.volume)?;
        self.end("Send")
    }

    fn arrangement(&mut self, arrangement: &Arrangement) -> Result<()> {
        let attrs = vec![("timeUnit", arrangement.time_unit.as_str().to_string())];
        let is_empty = arrangement.tempo.is_empty()
            && arrangement.time_signatures.is_empty()
            && arrangement.markers.is_empty()
            && arrangement.clips.is_empty()
            && arrangement.automation.is_empty();
        if is_empty {
            return self.empty("Arrangement", attrs);
        }

        self.start("Arrangement", attrs, None)?;
        if !arrangement.tempo.is_empty() {
            self.start("TempoAutomation", Attrs::new(), None)?;
            for point in &arrangement.tempo {
                self.empty(
                    "RealPoint",
                    vec![("time", num(point.time)), ("value", num(point.bpm))],
                )?;
            }
            self.end("TempoAutomation")?;
        }
        if !arrangement.time_signatures.is_empty() {
            self.start("TimeSignatureAutomation", Attrs::new(), None)?;
            for point in &arrangement.time_signatures {
                self.empty(
                    "TimeSignaturePoint",
                    vec![
                        ("time", num(point.time)),
                        ("numerator", point.signature.numerator.to_string()),
                        ("denominator", point.signature.denominator.to_string()),
                    ],
                )?;
            }
            self.end("TimeSignatureAutomation")?;
        }
        if !arrangement.markers.is_empty() {
            self.start("Markers", Attrs::new(), None)?;
            for marker in &arrangement.markers {
                self.empty(
                    "Marker",
                    vec![("time", num(marker.time)), ("name", marker.name.clone())],
                )?;
            }
            self.end("Markers")?;
        }
        if !arrangement.clips.is_empty() {
            self.start("Clips", Attrs::new(), None)?;
            for clip in &arrangement.clips {
                self.clip(clip)?;
            }
            self.end("Clips")?;
        }
        if !arrangement.automation.is_empty() {
            self.start("Automation", Attrs::new(), None)?;
            for lane in &arrangement.automation {
                self.lane(lane)?;
            }
            self.end("Automation")?;
        }
        self.end("Arrangement")
    }

    fn clip(&mut self, clip: &ClipPlacement) -> Result<()> {
        let mut attrs = vec![
            ("id", clip.id.clone()),
            ("track", clip.track.clone()),
            ("time", num(clip.time)),
            ("duration", num(clip.duration)),
            ("playStart", num(clip.play_start)),
        ];
        if let Some(name) = &clip.name {
            attrs.push(("name", name.clone()));
        }
        match &clip.file {
            Some(path) => {
                self.start("Clip", attrs, Some(&clip.extensions))?;
                self.empty("File", vec![("path", path.clone())])?;
                self.end("Clip")
            }
            None => {
                self.writer.write_event(Event::Empty(Self::tag(
                    "Clip",
                    &attrs,
                    Some(&clip.extensions),
                )))?;
                Ok(())
            }
        }
    }

    fn lane(&mut self, lane: &AutomationLane) -> Result<()> {
        self.start("Points", vec![("id", lane.id.clone())], None)?;
        match &lane.target {
            AutomationTarget::Channel { channel, parameter } => self.empty(
                "Target",
                vec![
                    ("channel", channel.clone()),
                    ("parameter", parameter.as_str().to_string()),
                ],
            )?,
            AutomationTarget::Device { device, parameter } => self.empty(
                "Target",
                vec![("device", device.clone()), ("parameter", parameter.clone())],
            )?,
        }
        for point in &lane.points {
            self.empty(
                "RealPoint",
                vec![("time", num(point.time)), ("value", num(point.value))],
            )?;
        }
        self.end("Points")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Application, ChannelConfig, ContentType, DeviceConfig, MixerRole, ParameterSet,
        TrackConfig,
    };
    use std::collections::BTreeSet;

    fn project() -> Project {
        let mut project = Project::new(Application::new("Mixer", "2.1").unwrap()).unwrap();
        let master = Track::new(TrackConfig {
            id: "master".into(),
            name: "Master".into(),
            content_types: BTreeSet::from([ContentType::Audio]),
            color: None,
            channel: Channel::new(ChannelConfig {
                id: "master-ch".into(),
                role: MixerRole::Master,
                ..Default::default()
            })
            .unwrap(),
        })
        .unwrap();
        project.add_track(master).unwrap();

        let mut parameters = ParameterSet::new();
        parameters.insert("gain", -3.5).unwrap();
        parameters.insert("label", "a<b & \"c\"").unwrap();
        let eq = Device::new(DeviceConfig {
            id: "eq".into(),
            name: "EQ".into(),
            enabled: true,
            parameters,
            ..Default::default()
        })
        .unwrap();
        let lead = Track::new(TrackConfig {
            id: "lead".into(),
            name: "Lead Synth".into(),
            content_types: BTreeSet::from([ContentType::Notes, ContentType::Audio]),
            color: Some("#ff8800".into()),
            channel: Channel::new(ChannelConfig {
                id: "lead-ch".into(),
                pan: 0.2,
                volume: 0.8,
                destination: Some("master-ch".into()),
                devices: vec![eq],
                ..Default::default()
            })
            .unwrap(),
        })
        .unwrap();
        project.add_track(lead).unwrap();
        project
    }

    #[test]
    fn test_encode_is_idempotent() {
        let p = project();
        assert_eq!(encode(&p).unwrap(), encode(&p).unwrap());
    }

    #[test]
    fn test_encode_layout() {
        let xml = encode_to_string(&project()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(xml.contains("<Project version=\"1.0\">"));
        assert!(xml.contains("<Channel id=\"master-ch\" role=\"master\""));
        assert!(xml.contains("contentType=\"audio notes\""));
        assert!(xml.contains("destination=\"master-ch\""));
        assert!(xml.contains("<Pan unit=\"normalized\" min=\"-1\" max=\"1\" value=\"0.2\"/>"));
        assert!(xml.contains("<RealParameter name=\"gain\" value=\"-3.5\"/>"));
        assert!(xml.contains("&lt;b &amp; &quot;c&quot;"));

        let application = xml.find("<Application").unwrap();
        let structure = xml.find("<Structure").unwrap();
        let arrangement = xml.find("<Arrangement").unwrap();
        assert!(application < structure && structure < arrangement);
        assert_eq!(xml.matches("<Channel ").count(), 2);
    }

    #[test]
    fn test_encode_refuses_invalid_project() {
        let mut p = project();
        p.channel_mut("master-ch").unwrap().destination = Some("lead-ch".into());
        assert!(matches!(
            encode(&p),
            Err(DawProjectError::RoutingCycle { .. })
        ));
    }

    #[test]
    fn test_encode_refuses_over_deep_nesting() {
        let mut p = project();
        let mut chain: Option<Track> = None;
        for i in (0..=crate::structure::MAX_TRACK_DEPTH).rev() {
            let mut track = Track::new(TrackConfig {
                id: format!("n{i}"),
                name: "Nested".into(),
                content_types: BTreeSet::new(),
                color: None,
                channel: Channel::new(ChannelConfig {
                    id: format!("n{i}-ch"),
                    ..Default::default()
                })
                .unwrap(),
            })
            .unwrap();
            track.children.extend(chain.take());
            chain = Some(track);
        }
        p.track_mut("lead").unwrap().children.extend(chain);
        assert!(matches!(
            encode(&p),
            Err(DawProjectError::InvalidField { field: "depth", .. })
        ));
    }

    #[test]
    fn test_num_round_trips() {
        for v in [0.1, 1.0 / 3.0, 1e-12, 123456789.125, -0.5] {
            assert_eq!(num(v).parse::<f64>().unwrap(), v);
        }
        assert_eq!(num(1.0), "1");
    }
}
