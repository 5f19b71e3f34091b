//! Project builder
//!
//! Turns per-track mix settings (gain in dB, pan, EQ and compressor
//! parameters, an audio file) into a routed project: one master track plus a
//! regular audio track per settings entry, each sending to master. Every value
//! goes through the validating constructors, so out-of-range settings fail
//! with `InvalidField` instead of being clamped.

use std::collections::BTreeSet;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    db_to_linear, Application, Channel, ChannelConfig, ClipPlacement, ContentType, Device,
    DeviceConfig, DeviceRole, MetaData, MixerRole, ParameterSet, Project, TimeSignature, Track,
    TrackConfig, Transport,
};

/// Mix settings for one audio track.
#[derive(Debug, Clone)]
pub struct TrackSettings {
    /// Track id; generated when `None`.
    pub id: Option<String>,
    pub name: String,
    /// Channel gain in dB (0 = unity).
    pub gain_db: f64,
    /// -1.0 (left) to 1.0 (right).
    pub pan: f64,
    pub color: Option<String>,
    /// EQ parameters; no EQ device is added when empty.
    pub eq: ParameterSet,
    /// Compressor parameters; no compressor device is added when empty.
    pub compressor: ParameterSet,
    /// Audio file for a clip at the start of the arrangement.
    pub audio_file: Option<String>,
    /// Length of that clip in arrangement time units.
    pub clip_length: f64,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            gain_db: 0.0,
            pan: 0.0,
            color: None,
            eq: ParameterSet::new(),
            compressor: ParameterSet::new(),
            audio_file: None,
            clip_length: 4.0,
        }
    }
}

impl TrackSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

fn generate_id(kind: &str) -> String {
    format!("{}-{}", kind, Uuid::new_v4().simple())
}

/// Builds a project around a master bus.
#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    project: Project,
    master_channel: String,
}

impl ProjectBuilder {
    /// Start a project whose only track is the master bus.
    pub fn new(application: Application) -> Result<Self> {
        let mut project = Project::new(application)?;
        let master_channel = generate_id("channel");
        let master = Track::new(TrackConfig {
            id: generate_id("track"),
            name: "Master".to_string(),
            content_types: BTreeSet::from([ContentType::Audio]),
            color: None,
            channel: Channel::new(ChannelConfig {
                id: master_channel.clone(),
                role: MixerRole::Master,
                ..Default::default()
            })?,
        })?;
        project.add_track(master)?;
        Ok(Self {
            project,
            master_channel,
        })
    }

    pub fn master_channel_id(&self) -> &str {
        &self.master_channel
    }

    pub fn metadata(mut self, metadata: MetaData) -> Self {
        self.project.metadata = metadata;
        self
    }

    pub fn transport(mut self, tempo: f64, time_signature: TimeSignature) -> Result<Self> {
        self.project.transport = Transport::new(tempo, time_signature)?;
        Ok(self)
    }

    /// Add an audio track routed to master. Returns the new track's id.
    ///
    /// Nothing is added if any setting is rejected.
    pub fn add_track(&mut self, settings: TrackSettings) -> Result<String> {
        let track_id = settings.id.clone().unwrap_or_else(|| generate_id("track"));

        let mut devices = Vec::new();
        if !settings.eq.is_empty() {
            devices.push(Device::new(DeviceConfig {
                id: generate_id("device"),
                name: "EQ".to_string(),
                role: DeviceRole::AudioFx,
                enabled: true,
                device_id: Some("eq".to_string()),
                vendor: None,
                parameters: settings.eq,
            })?);
        }
        if !settings.compressor.is_empty() {
            devices.push(Device::new(DeviceConfig {
                id: generate_id("device"),
                name: "Compressor".to_string(),
                role: DeviceRole::AudioFx,
                enabled: true,
                device_id: Some("compressor".to_string()),
                vendor: None,
                parameters: settings.compressor,
            })?);
        }

        let channel = Channel::new(ChannelConfig {
            id: generate_id("channel"),
            role: MixerRole::Regular,
            volume: db_to_linear(settings.gain_db),
            pan: settings.pan,
            destination: Some(self.master_channel.clone()),
            devices,
            ..Default::default()
        })?;
        let track = Track::new(TrackConfig {
            id: track_id.clone(),
            name: settings.name.clone(),
            content_types: BTreeSet::from([ContentType::Audio]),
            color: settings.color,
            channel,
        })?;

        let clip = match settings.audio_file {
            Some(path) => Some(
                ClipPlacement::new(generate_id("clip"), &track_id, 0.0, settings.clip_length)?
                    .with_name(&settings.name)
                    .with_file(path),
            ),
            None => None,
        };

        self.project.add_track(track)?;
        if let Some(clip) = clip {
            if let Err(err) = self.project.add_clip(clip) {
                self.project.remove_track(&track_id)?;
                return Err(err);
            }
        }
        debug!(track = %track_id, name = %settings.name, "track added");
        Ok(track_id)
    }

    /// Validate and return the finished project.
    pub fn build(self) -> Result<Project> {
        self.project.validate()?;
        info!(tracks = self.project.structure.len(), "project built");
        Ok(self.project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DawProjectError;
    use approx::assert_relative_eq;

    fn builder() -> ProjectBuilder {
        ProjectBuilder::new(Application::new("Builder", "0.1").unwrap()).unwrap()
    }

    #[test]
    fn test_track_routed_to_master() {
        let mut b = builder();
        let mut eq = ParameterSet::new();
        eq.insert("low_gain", 2.0).unwrap();
        let id = b
            .add_track(TrackSettings {
                gain_db: -6.0,
                pan: -0.3,
                eq,
                audio_file: Some("audio/vocals.wav".into()),
                ..TrackSettings::new("Vocals")
            })
            .unwrap();
        let master = b.master_channel_id().to_string();
        let project = b.build().unwrap();

        let track = project.track(&id).unwrap();
        assert_eq!(track.channel.destination.as_deref(), Some(master.as_str()));
        assert_relative_eq!(track.channel.volume, 0.501187, epsilon = 1e-6);
        assert_eq!(track.channel.devices.len(), 1);
        assert_eq!(track.channel.devices[0].name, "EQ");

        let clips: Vec<_> = project.arrangement.clips_for_track(&id).collect();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].file.as_deref(), Some("audio/vocals.wav"));
        assert_eq!(clips[0].name.as_deref(), Some("Vocals"));
    }

    #[test]
    fn test_out_of_range_pan_rejected_not_clamped() {
        let mut b = builder();
        let err = b
            .add_track(TrackSettings {
                pan: 1.5,
                ..TrackSettings::new("Wide")
            })
            .unwrap_err();
        assert!(matches!(err, DawProjectError::InvalidField { field: "pan", .. }));
        assert_eq!(b.build().unwrap().structure.len(), 1);
    }

    #[test]
    fn test_bad_clip_length_rolls_back_track() {
        let mut b = builder();
        let err = b
            .add_track(TrackSettings {
                id: Some("drums".into()),
                audio_file: Some("drums.wav".into()),
                clip_length: 0.0,
                ..TrackSettings::new("Drums")
            })
            .unwrap_err();
        assert!(matches!(err, DawProjectError::InvalidField { field: "duration", .. }));
        assert!(b.build().unwrap().track("drums").is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut b = builder();
        let a = b.add_track(TrackSettings::new("A")).unwrap();
        let c = b.add_track(TrackSettings::new("B")).unwrap();
        assert_ne!(a, c);
        assert!(a.starts_with("track-"));
    }
}
