//! Tracks
//!
//! A track owns exactly one channel and an ordered list of child tracks. The
//! child order is the mixer display order and is preserved by the codec.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{check_extensions, check_id, check_name, label, Channel, ContentType, Extensions, MixerRole};
use crate::error::{DawProjectError, Result};

/// Attribute names the codec writes for a track.
pub(crate) const TRACK_ATTRIBUTES: &[&str] = &["id", "name", "contentType", "color"];

/// Configuration for [`Track::new`].
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub id: String,
    pub name: String,
    pub content_types: BTreeSet<ContentType>,
    /// `#rrggbb`
    pub color: Option<String>,
    pub channel: Channel,
}

/// A named lane in the project hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub content_types: BTreeSet<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub channel: Channel,
    #[serde(default)]
    pub children: Vec<Track>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl Track {
    pub fn new(config: TrackConfig) -> Result<Self> {
        let track = Self {
            id: config.id,
            name: config.name,
            content_types: config.content_types,
            color: config.color,
            channel: config.channel,
            children: Vec::new(),
            extensions: Extensions::new(),
        };
        track.check()?;
        Ok(track)
    }

    /// Mixer role of the owned channel.
    pub fn role(&self) -> MixerRole {
        self.channel.role
    }

    pub fn carries(&self, content: ContentType) -> bool {
        self.content_types.contains(&content)
    }

    /// Append a child track, keeping insertion order.
    ///
    /// Only the new child's own fields are checked here; project-wide rules
    /// (id uniqueness, routing) are enforced by `Project::add_child_track`.
    pub fn push_child(&mut self, child: Track) -> Result<()> {
        child.check()?;
        self.children.push(child);
        Ok(())
    }

    /// Field-level checks for this track only, excluding children.
    pub fn check(&self) -> Result<()> {
        check_id("Track", &self.id)?;
        let entity = label("Track", &self.id);
        check_name(&entity, &self.name)?;
        if let Some(color) = &self.color {
            let valid = color.len() == 7
                && color.starts_with('#')
                && color[1..].chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(DawProjectError::invalid(
                    entity,
                    "color",
                    color,
                    "expected #rrggbb",
                ));
            }
        }
        self.channel.check()?;
        check_extensions(&entity, &self.extensions, TRACK_ATTRIBUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelConfig;

    fn channel(id: &str) -> Channel {
        Channel::new(ChannelConfig {
            id: id.into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn config(name: &str) -> TrackConfig {
        TrackConfig {
            id: "track-1".into(),
            name: name.into(),
            content_types: BTreeSet::from([ContentType::Audio]),
            color: None,
            channel: channel("ch-1"),
        }
    }

    #[test]
    fn test_track_new() {
        let track = Track::new(config("Lead Synth")).unwrap();
        assert!(track.carries(ContentType::Audio));
        assert!(!track.carries(ContentType::Notes));
        assert_eq!(track.role(), MixerRole::Regular);
        assert!(track.children.is_empty());
    }

    #[test]
    fn test_track_new_rejects_empty_name() {
        let err = Track::new(config("")).unwrap_err();
        assert!(matches!(err, DawProjectError::InvalidField { field: "name", .. }));
    }

    #[test]
    fn test_track_color_format() {
        let mut cfg = config("Drums");
        cfg.color = Some("#a0B1c2".into());
        assert!(Track::new(cfg.clone()).is_ok());

        cfg.color = Some("red".into());
        assert!(Track::new(cfg).is_err());
    }

    #[test]
    fn test_push_child_keeps_order() {
        let mut group = Track::new(config("Group")).unwrap();
        for i in 0..3 {
            let child = Track::new(TrackConfig {
                id: format!("child-{i}"),
                name: format!("Child {i}"),
                content_types: BTreeSet::new(),
                color: None,
                channel: channel(&format!("child-ch-{i}")),
            })
            .unwrap();
            group.push_child(child).unwrap();
        }
        let ids: Vec<_> = group.children.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["child-0", "child-1", "child-2"]);
    }
}
