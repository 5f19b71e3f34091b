//! Project root aggregate
//!
//! A project exclusively owns its structure and arrangement. All mutations
//! that can break a cross-entity rule (id uniqueness, reference resolution,
//! acyclic routing) go through methods here, which re-check the affected rule
//! and roll the change back on failure.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::arrangement::check_tempo;
use super::{
    check_extensions, check_name, AuxSend, AutomationLane, AutomationTarget, Channel,
    ClipPlacement, Extensions, Track, TimeSignature,
};
use crate::codec::{self, validate, version::FORMAT_VERSION};
use crate::error::{DawProjectError, Result};
use crate::structure::Structure;
use crate::model::{label, Arrangement};

/// Attribute names the codec writes for the project root.
pub(crate) const PROJECT_ATTRIBUTES: &[&str] = &["version"];

/// The application that wrote the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub version: String,
}

impl Application {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let application = Self {
            name: name.into(),
            version: version.into(),
        };
        application.check()?;
        Ok(application)
    }

    pub fn check(&self) -> Result<()> {
        check_name("Application", &self.name)
    }
}

/// Descriptive project metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl MetaData {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.comment.is_none()
    }
}

/// Initial tempo and meter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    pub tempo: f64,
    pub time_signature: TimeSignature,
}

impl Transport {
    pub fn new(tempo: f64, time_signature: TimeSignature) -> Result<Self> {
        let transport = Self {
            tempo,
            time_signature,
        };
        transport.check()?;
        Ok(transport)
    }

    pub fn check(&self) -> Result<()> {
        check_tempo("Transport", self.tempo)?;
        self.time_signature.check()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            time_signature: TimeSignature::default(),
        }
    }
}

/// A complete DAW project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// File format version, e.g. `"1.0"`.
    pub version: String,
    pub application: Application,
    #[serde(default)]
    pub metadata: MetaData,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub structure: Structure,
    #[serde(default)]
    pub arrangement: Arrangement,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl Project {
    /// Create an empty project in the current format version.
    pub fn new(application: Application) -> Result<Self> {
        application.check()?;
        Ok(Self {
            version: FORMAT_VERSION.to_string(),
            application,
            metadata: MetaData::default(),
            transport: Transport::default(),
            structure: Structure::new(),
            arrangement: Arrangement::new(),
            extensions: Extensions::new(),
        })
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.structure.resolve(id)
    }

    pub fn track_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.structure.resolve_mut(id)
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.structure.channel(id)
    }

    pub fn channel_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.structure.channel_mut(id)
    }

    /// Append a top-level track (with any children it already has).
    pub fn add_track(&mut self, track: Track) -> Result<()> {
        check_subtree(&track)?;
        debug!(track = %track.id, "adding top-level track");
        self.structure.push(track);
        if let Err(err) = self.check_links() {
            self.structure.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Append a track as the last child of `parent_id`.
    pub fn add_child_track(&mut self, parent_id: &str, track: Track) -> Result<()> {
        check_subtree(&track)?;
        debug!(track = %track.id, parent = parent_id, "adding child track");
        self.structure.push_child(parent_id, track)?;
        if let Err(err) = self.check_links() {
            self.structure.pop_child(parent_id);
            return Err(err);
        }
        Ok(())
    }

    /// Remove a track and its children.
    ///
    /// Fails with `DanglingReference` while anything outside the removed
    /// subtree still refers to it (routing, clips, automation).
    pub fn remove_track(&mut self, id: &str) -> Result<Track> {
        let track = self
            .structure
            .resolve(id)
            .ok_or_else(|| DawProjectError::dangling("remove_track", id))?;

        let removed: Vec<&Track> = std::iter::once(track).chain(subtree(track)).collect();
        let track_ids: Vec<&str> = removed.iter().map(|t| t.id.as_str()).collect();
        let channel_ids: Vec<&str> = removed.iter().map(|t| t.channel.id.as_str()).collect();
        let device_ids: Vec<&str> = removed
            .iter()
            .flat_map(|t| t.channel.devices.iter().map(|d| d.id.as_str()))
            .collect();

        for channel in self.structure.channels() {
            if channel_ids.contains(&channel.id.as_str()) {
                continue;
            }
            if let Some(dest) = channel.destination.as_deref().filter(|d| channel_ids.contains(d)) {
                return Err(DawProjectError::dangling(label("Channel", &channel.id), dest));
            }
            if let Some(send) = channel.sends.iter().find(|s| channel_ids.contains(&s.destination.as_str())) {
                return Err(DawProjectError::dangling(label("Send", &send.id), &send.destination));
            }
        }
        if let Some(clip) = self.arrangement.clips.iter().find(|c| track_ids.contains(&c.track.as_str())) {
            return Err(DawProjectError::dangling(label("Clip", &clip.id), &clip.track));
        }
        for lane in &self.arrangement.automation {
            let target = match &lane.target {
                AutomationTarget::Channel { channel, .. } => channel,
                AutomationTarget::Device { device, .. } => device,
            };
            if channel_ids.contains(&target.as_str()) || device_ids.contains(&target.as_str()) {
                return Err(DawProjectError::dangling(label("AutomationLane", &lane.id), target));
            }
        }

        debug!(track = id, "removing track");
        self.structure
            .remove(id)
            .ok_or_else(|| DawProjectError::dangling("remove_track", id))
    }

    /// Point a channel's output at another channel, or clear it with `None`.
    pub fn set_destination(&mut self, channel_id: &str, destination: Option<&str>) -> Result<()> {
        if let Some(dest) = destination {
            if self.structure.channel(dest).is_none() {
                return Err(DawProjectError::dangling(label("Channel", channel_id), dest));
            }
        }
        let channel = self
            .structure
            .channel_mut(channel_id)
            .ok_or_else(|| DawProjectError::dangling("set_destination", channel_id))?;
        let previous = std::mem::replace(&mut channel.destination, destination.map(String::from));

        if let Err(err) = self.structure.check_routing() {
            if let Some(channel) = self.structure.channel_mut(channel_id) {
                channel.destination = previous;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Add a send to a channel.
    pub fn add_send(&mut self, channel_id: &str, send: AuxSend) -> Result<()> {
        send.check()?;
        validate::check_unused_id(self, &send.id)?;
        if self.structure.channel(&send.destination).is_none() {
            return Err(DawProjectError::dangling(label("Send", &send.id), &send.destination));
        }
        let channel = self
            .structure
            .channel_mut(channel_id)
            .ok_or_else(|| DawProjectError::dangling("add_send", channel_id))?;
        channel.sends.push(send);

        if let Err(err) = self.structure.check_routing() {
            if let Some(channel) = self.structure.channel_mut(channel_id) {
                channel.sends.pop();
            }
            return Err(err);
        }
        Ok(())
    }

    /// Place a clip on an existing track.
    pub fn add_clip(&mut self, clip: ClipPlacement) -> Result<()> {
        clip.check()?;
        validate::check_unused_id(self, &clip.id)?;
        if self.structure.resolve(&clip.track).is_none() {
            return Err(DawProjectError::dangling(label("Clip", &clip.id), &clip.track));
        }
        self.arrangement.clips.push(clip);
        Ok(())
    }

    /// Add an automation lane for an existing channel or device parameter.
    pub fn add_automation_lane(&mut self, lane: AutomationLane) -> Result<()> {
        lane.check()?;
        validate::check_unused_id(self, &lane.id)?;
        validate::check_automation_target(self, &lane)?;
        self.arrangement.automation.push(lane);
        Ok(())
    }

    /// Run the full validation gate.
    pub fn validate(&self) -> Result<()> {
        codec::validate(self)
    }

    /// Dump the project as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub(crate) fn check_project_fields(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(DawProjectError::invalid(
                "Project",
                "version",
                "\"\"",
                "must not be empty",
            ));
        }
        self.application.check()?;
        self.transport.check()?;
        check_extensions("Project", &self.extensions, PROJECT_ATTRIBUTES)
    }

    /// Cross-entity rules touched by adding tracks.
    fn check_links(&self) -> Result<()> {
        self.structure.check_depth()?;
        validate::check_unique_ids(self)?;
        validate::check_routing_references(self)?;
        validate::check_master_groups(self)?;
        self.structure.check_routing()
    }
}

fn subtree(track: &Track) -> Vec<&Track> {
    let mut out = Vec::new();
    let mut stack: Vec<&Track> = track.children.iter().rev().collect();
    while let Some(t) = stack.pop() {
        out.push(t);
        stack.extend(t.children.iter().rev());
    }
    out
}

fn check_subtree(track: &Track) -> Result<()> {
    track.check()?;
    subtree(track).into_iter().try_for_each(Track::check)
}
