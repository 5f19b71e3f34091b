//! Arrangement timeline
//!
//! Tempo and time-signature timelines, markers, clip placements and
//! automation lanes. Clips and lanes refer to tracks, channels and devices by
//! id only.

use serde::{Deserialize, Serialize};

use super::channel::{PAN_MAX, PAN_MIN};
use super::{
    check_at_least, check_extensions, check_id, check_range, label, ChannelParameter, Extensions,
    TimeUnit,
};
use crate::error::{DawProjectError, Result};

/// Slowest accepted tempo in BPM.
pub const MIN_TEMPO: f64 = 1.0;
/// Fastest accepted tempo in BPM.
pub const MAX_TEMPO: f64 = 999.0;

/// Attribute names the codec writes for a clip.
pub(crate) const CLIP_ATTRIBUTES: &[&str] =
    &["id", "track", "time", "duration", "playStart", "name"];

pub(crate) fn check_tempo(entity: &str, bpm: f64) -> Result<()> {
    check_range(entity, "tempo", bpm, MIN_TEMPO, MAX_TEMPO)
}

/// A musical meter such as 4/4 or 7/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        let signature = Self {
            numerator,
            denominator,
        };
        signature.check()?;
        Ok(signature)
    }

    pub fn check(&self) -> Result<()> {
        if self.numerator == 0 || self.numerator > 64 {
            return Err(DawProjectError::invalid(
                "TimeSignature",
                "numerator",
                self.numerator,
                "must be within [1, 64]",
            ));
        }
        if !self.denominator.is_power_of_two() || self.denominator > 64 {
            return Err(DawProjectError::invalid(
                "TimeSignature",
                "denominator",
                self.denominator,
                "must be a power of two within [1, 64]",
            ));
        }
        Ok(())
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

/// Tempo change at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub time: f64,
    pub bpm: f64,
}

/// Meter change at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignaturePoint {
    pub time: f64,
    pub signature: TimeSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub time: f64,
    pub name: String,
}

/// A clip placed on a track's lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPlacement {
    pub id: String,
    /// Id of the track the clip sits on.
    pub track: String,
    pub time: f64,
    pub duration: f64,
    /// Offset into the clip content where playback starts.
    pub play_start: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Path of the audio file backing the clip, relative to the project container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl ClipPlacement {
    pub fn new(
        id: impl Into<String>,
        track: impl Into<String>,
        time: f64,
        duration: f64,
    ) -> Result<Self> {
        let clip = Self {
            id: id.into(),
            track: track.into(),
            time,
            duration,
            play_start: 0.0,
            name: None,
            file: None,
            extensions: Extensions::new(),
        };
        clip.check()?;
        Ok(clip)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

    pub fn check(&self) -> Result<()> {
        check_id("Clip", &self.id)?;
        let entity = label("Clip", &self.id);
        if self.track.trim().is_empty() {
            return Err(DawProjectError::invalid(
                entity,
                "track",
                "\"\"",
                "must name a track id",
            ));
        }
        check_at_least(&entity, "time", self.time, 0.0)?;
        check_at_least(&entity, "play_start", self.play_start, 0.0)?;
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(DawProjectError::invalid(
                entity,
                "duration",
                self.duration,
                "must be a finite value > 0",
            ));
        }
        if let Some(file) = &self.file {
            if file.trim().is_empty() {
                return Err(DawProjectError::invalid(
                    entity,
                    "file",
                    "\"\"",
                    "audio file path must not be empty",
                ));
            }
        }
        check_extensions(&entity, &self.extensions, CLIP_ATTRIBUTES)
    }
}

/// What an automation lane drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutomationTarget {
    Channel {
        channel: String,
        parameter: ChannelParameter,
    },
    Device {
        device: String,
        parameter: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub time: f64,
    pub value: f64,
}

/// Automation for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationLane {
    pub id: String,
    pub target: AutomationTarget,
    #[serde(default)]
    pub points: Vec<AutomationPoint>,
}

impl AutomationLane {
    pub fn new(id: impl Into<String>, target: AutomationTarget) -> Result<Self> {
        let lane = Self {
            id: id.into(),
            target,
            points: Vec::new(),
        };
        lane.check()?;
        Ok(lane)
    }

    /// Append a point; times must not go backwards.
    pub fn push_point(&mut self, time: f64, value: f64) -> Result<()> {
        self.points.push(AutomationPoint { time, value });
        if let Err(err) = self.check() {
            self.points.pop();
            return Err(err);
        }
        Ok(())
    }

    pub fn check(&self) -> Result<()> {
        check_id("AutomationLane", &self.id)?;
        let entity = label("AutomationLane", &self.id);
        match &self.target {
            AutomationTarget::Channel { channel, .. } if channel.trim().is_empty() => {
                return Err(DawProjectError::invalid(entity, "target", "\"\"", "must name a channel id"));
            }
            AutomationTarget::Device { device, parameter }
                if device.trim().is_empty() || parameter.trim().is_empty() =>
            {
                return Err(DawProjectError::invalid(
                    entity,
                    "target",
                    format!("{}/{}", device, parameter),
                    "must name a device id and parameter",
                ));
            }
            _ => {}
        }
        check_timeline(&entity, self.points.iter().map(|p| p.time))?;
        for point in &self.points {
            match self.target {
                AutomationTarget::Channel {
                    parameter: ChannelParameter::Volume,
                    ..
                } => check_at_least(&entity, "value", point.value, 0.0)?,
                AutomationTarget::Channel {
                    parameter: ChannelParameter::Pan,
                    ..
                } => check_range(&entity, "value", point.value, PAN_MIN, PAN_MAX)?,
                AutomationTarget::Channel {
                    parameter: ChannelParameter::Mute,
                    ..
                } => {
                    if point.value != 0.0 && point.value != 1.0 {
                        return Err(DawProjectError::invalid(
                            entity,
                            "value",
                            point.value,
                            "mute automation takes 0 or 1",
                        ));
                    }
                }
                AutomationTarget::Device { .. } => {
                    check_range(&entity, "value", point.value, f64::MIN, f64::MAX)?
                }
            }
        }
        Ok(())
    }
}

/// Times must be finite, non-negative and non-decreasing.
fn check_timeline(entity: &str, times: impl Iterator<Item = f64>) -> Result<()> {
    let mut previous = 0.0_f64;
    for time in times {
        check_at_least(entity, "time", time, 0.0)?;
        if time < previous {
            return Err(DawProjectError::invalid(
                entity,
                "time",
                time,
                format!("timeline goes backwards (previous point at {})", previous),
            ));
        }
        previous = time;
    }
    Ok(())
}

/// The project timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub tempo: Vec<TempoPoint>,
    #[serde(default)]
    pub time_signatures: Vec<TimeSignaturePoint>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub clips: Vec<ClipPlacement>,
    #[serde(default)]
    pub automation: Vec<AutomationLane>,
}

impl Arrangement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clips placed on the given track, in stored order.
    pub fn clips_for_track<'a>(&'a self, track_id: &'a str) -> impl Iterator<Item = &'a ClipPlacement> {
        self.clips.iter().filter(move |c| c.track == track_id)
    }

    pub fn clip(&self, id: &str) -> Option<&ClipPlacement> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn lane(&self, id: &str) -> Option<&AutomationLane> {
        self.automation.iter().find(|l| l.id == id)
    }

    /// Field-level checks; references are resolved by the validation gate.
    pub fn check(&self) -> Result<()> {
        check_timeline("TempoAutomation", self.tempo.iter().map(|p| p.time))?;
        for point in &self.tempo {
            check_tempo("TempoAutomation", point.bpm)?;
        }
        check_timeline(
            "TimeSignatureAutomation",
            self.time_signatures.iter().map(|p| p.time),
        )?;
        for point in &self.time_signatures {
            point.signature.check()?;
        }
        check_timeline("Markers", self.markers.iter().map(|m| m.time))?;
        for marker in &self.markers {
            if marker.name.trim().is_empty() {
                return Err(DawProjectError::invalid(
                    "Marker",
                    "name",
                    format!("at {}", marker.time),
                    "must not be empty",
                ));
            }
        }
        for clip in &self.clips {
            clip.check()?;
        }
        for lane in &self.automation {
            lane.check()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(4, 4, true)]
    #[test_case(7, 8, true)]
    #[test_case(3, 6, false)]
    #[test_case(0, 4, false)]
    #[test_case(4, 128, false)]
    fn test_time_signature(numerator: u32, denominator: u32, ok: bool) {
        assert_eq!(TimeSignature::new(numerator, denominator).is_ok(), ok);
    }

    #[test]
    fn test_clip_rejects_zero_duration() {
        let err = ClipPlacement::new("clip-1", "track-1", 0.0, 0.0).unwrap_err();
        assert!(matches!(err, DawProjectError::InvalidField { field: "duration", .. }));
    }

    #[test]
    fn test_clip_builders() {
        let clip = ClipPlacement::new("clip-1", "track-1", 4.0, 8.0)
            .unwrap()
            .with_name("Verse")
            .with_file("audio/lead.wav");
        assert_eq!(clip.end(), 12.0);
        assert_eq!(clip.file.as_deref(), Some("audio/lead.wav"));
    }

    #[test]
    fn test_automation_lane_rejects_backwards_points() {
        let mut lane = AutomationLane::new(
            "lane-1",
            AutomationTarget::Channel {
                channel: "ch-1".into(),
                parameter: ChannelParameter::Volume,
            },
        )
        .unwrap();
        lane.push_point(0.0, 1.0).unwrap();
        lane.push_point(4.0, 0.5).unwrap();
        assert!(lane.push_point(2.0, 0.7).is_err());
        assert_eq!(lane.points.len(), 2);
    }

    #[test]
    fn test_automation_pan_range() {
        let mut lane = AutomationLane::new(
            "lane-1",
            AutomationTarget::Channel {
                channel: "ch-1".into(),
                parameter: ChannelParameter::Pan,
            },
        )
        .unwrap();
        assert!(lane.push_point(0.0, -1.0).is_ok());
        assert!(lane.push_point(1.0, 1.2).is_err());
    }

    #[test]
    fn test_arrangement_rejects_bad_tempo() {
        let mut arrangement = Arrangement::new();
        arrangement.tempo.push(TempoPoint { time: 0.0, bpm: 0.0 });
        assert!(arrangement.check().is_err());
    }

    #[test]
    fn test_clips_for_track() {
        let mut arrangement = Arrangement::new();
        arrangement.clips.push(ClipPlacement::new("a", "t1", 0.0, 1.0).unwrap());
        arrangement.clips.push(ClipPlacement::new("b", "t2", 0.0, 1.0).unwrap());
        arrangement.clips.push(ClipPlacement::new("c", "t1", 2.0, 1.0).unwrap());
        let ids: Vec<_> = arrangement.clips_for_track("t1").map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
