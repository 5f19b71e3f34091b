//! Project Structure
//!
//! The ordered forest of tracks. Tracks own their channels and children; the
//! routing graph layered on top is derived on demand (see [`routing`]).

pub mod routing;

use serde::{Deserialize, Serialize};

use crate::error::{DawProjectError, Result};
use crate::model::{label, Channel, Track};

pub use routing::RoutingGraph;

/// Deepest nesting level a track may sit at. Top-level tracks are level 0.
pub const MAX_TRACK_DEPTH: usize = 128;

/// Ordered forest of tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Structure {
    tracks: Vec<Track>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level tracks in stored order.
    pub fn roots(&self) -> &[Track] {
        &self.tracks
    }

    /// Every track, depth first, parents before children, stored order kept.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.depth_first().map(|(_, track)| track)
    }

    /// Like [`Structure::tracks`] but also yields the nesting depth (0 = top level).
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: vec![self.tracks.iter()],
        }
    }

    /// Every channel, in the same order as [`Structure::tracks`].
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.tracks().map(|t| &t.channel)
    }

    pub fn len(&self) -> usize {
        self.tracks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Look up a track anywhere in the forest.
    pub fn resolve(&self, track_id: &str) -> Option<&Track> {
        self.tracks().find(|t| t.id == track_id)
    }

    pub fn resolve_mut(&mut self, track_id: &str) -> Option<&mut Track> {
        find_track_mut(&mut self.tracks, track_id)
    }

    /// The track owning the given channel.
    pub fn track_for_channel(&self, channel_id: &str) -> Option<&Track> {
        self.tracks().find(|t| t.channel.id == channel_id)
    }

    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        self.track_for_channel(channel_id).map(|t| &t.channel)
    }

    pub fn channel_mut(&mut self, channel_id: &str) -> Option<&mut Channel> {
        find_channel_mut(&mut self.tracks, channel_id)
    }

    /// Id-indexed routing view over all channels.
    pub fn routing(&self) -> RoutingGraph<'_> {
        RoutingGraph::new(self)
    }

    /// Channels whose destination is `channel_id`.
    pub fn channels_routing_to(&self, channel_id: &str) -> Vec<&Channel> {
        self.routing().routing_to(channel_id)
    }

    pub fn is_acyclic(&self) -> bool {
        self.routing().find_cycle().is_none()
    }

    /// Fails with `RoutingCycle` if destinations and sends form a loop.
    pub fn check_routing(&self) -> Result<()> {
        self.routing().check_acyclic()
    }

    /// Fails with `InvalidField` on the first track nested below [`MAX_TRACK_DEPTH`].
    pub fn check_depth(&self) -> Result<()> {
        match self.depth_first().find(|(depth, _)| *depth > MAX_TRACK_DEPTH) {
            Some((depth, track)) => Err(DawProjectError::invalid(
                label("Track", &track.id),
                "depth",
                depth,
                format!("tracks nest at most {} levels deep", MAX_TRACK_DEPTH),
            )),
            None => Ok(()),
        }
    }

    pub(crate) fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub(crate) fn pop(&mut self) -> Option<Track> {
        self.tracks.pop()
    }

    pub(crate) fn push_child(&mut self, parent_id: &str, track: Track) -> Result<()> {
        let parent = self
            .resolve_mut(parent_id)
            .ok_or_else(|| DawProjectError::dangling(format!("parent of Track '{}'", track.id), parent_id))?;
        parent.children.push(track);
        Ok(())
    }

    pub(crate) fn pop_child(&mut self, parent_id: &str) -> Option<Track> {
        self.resolve_mut(parent_id)?.children.pop()
    }

    pub(crate) fn remove(&mut self, track_id: &str) -> Option<Track> {
        remove_track(&mut self.tracks, track_id)
    }
}

/// Depth-first iterator over a forest of tracks.
pub struct DepthFirst<'a> {
    stack: Vec<std::slice::Iter<'a, Track>>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a Track);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len().checked_sub(1)?;
            let level = self.stack.last_mut()?;
            match level.next() {
                Some(track) => {
                    self.stack.push(track.children.iter());
                    return Some((depth, track));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

fn find_track_mut<'a>(tracks: &'a mut [Track], id: &str) -> Option<&'a mut Track> {
    let mut stack: Vec<&'a mut Track> = tracks.iter_mut().rev().collect();
    while let Some(track) = stack.pop() {
        if track.id == id {
            return Some(track);
        }
        stack.extend(track.children.iter_mut().rev());
    }
    None
}

fn find_channel_mut<'a>(tracks: &'a mut [Track], id: &str) -> Option<&'a mut Channel> {
    let mut stack: Vec<&'a mut Track> = tracks.iter_mut().rev().collect();
    while let Some(track) = stack.pop() {
        if track.channel.id == id {
            return Some(&mut track.channel);
        }
        stack.extend(track.children.iter_mut().rev());
    }
    None
}

fn remove_track(tracks: &mut Vec<Track>, id: &str) -> Option<Track> {
    let mut levels: Vec<&mut Vec<Track>> = vec![tracks];
    while let Some(level) = levels.pop() {
        if let Some(index) = level.iter().position(|t| t.id == id) {
            return Some(level.remove(index));
        }
        levels.extend(level.iter_mut().map(|t| &mut t.children));
    }
    None
}
