//! Validation gate
//!
//! Runs before every encode and after every decode. Checks run in a fixed
//! order so a given invalid project always reports the same error:
//! field constraints (nesting depth first), version, id uniqueness, reference
//! resolution, master groups, routing cycles.

use std::collections::HashSet;

use tracing::debug;

use super::version::check_version;
use crate::error::{DawProjectError, Result};
use crate::model::{label, AutomationLane, AutomationTarget, MixerRole, Project, Track};

/// Check every structural and referential invariant of a project.
pub fn validate(project: &Project) -> Result<()> {
    check_fields(project)?;
    check_version(&project.version)?;
    check_unique_ids(project)?;
    check_routing_references(project)?;
    check_arrangement_references(project)?;
    check_master_groups(project)?;
    project.structure.check_routing()?;
    debug!(
        tracks = project.structure.len(),
        clips = project.arrangement.clips.len(),
        "project validated"
    );
    Ok(())
}

fn check_fields(project: &Project) -> Result<()> {
    project.check_project_fields()?;
    project.structure.check_depth()?;
    for track in project.structure.tracks() {
        track.check()?;
    }
    project.arrangement.check()
}

/// Every id-bearing entity, in document order.
fn all_ids(project: &Project) -> impl Iterator<Item = &str> {
    let structure_ids = project.structure.tracks().flat_map(|track| {
        let channel = &track.channel;
        [track.id.as_str(), channel.id.as_str()]
            .into_iter()
            .chain(channel.devices.iter().map(|d| d.id.as_str()))
            .chain(channel.sends.iter().map(|s| s.id.as_str()))
    });
    let arrangement = &project.arrangement;
    structure_ids
        .chain(arrangement.clips.iter().map(|c| c.id.as_str()))
        .chain(arrangement.automation.iter().map(|l| l.id.as_str()))
}

/// Ids share one namespace across tracks, channels, devices, sends, clips and lanes.
pub(crate) fn check_unique_ids(project: &Project) -> Result<()> {
    let mut seen = HashSet::new();
    for id in all_ids(project) {
        if !seen.insert(id) {
            return Err(DawProjectError::DuplicateId { id: id.to_string() });
        }
    }
    Ok(())
}

pub(crate) fn check_unused_id(project: &Project, id: &str) -> Result<()> {
    if all_ids(project).any(|existing| existing == id) {
        return Err(DawProjectError::DuplicateId { id: id.to_string() });
    }
    Ok(())
}

/// Channel destinations and send destinations must name existing channels.
pub(crate) fn check_routing_references(project: &Project) -> Result<()> {
    let routing = project.structure.routing();
    for channel in project.structure.channels() {
        if let Some(dest) = &channel.destination {
            if !routing.contains(dest) {
                return Err(DawProjectError::dangling(label("Channel", &channel.id), dest));
            }
        }
        for send in &channel.sends {
            if !routing.contains(&send.destination) {
                return Err(DawProjectError::dangling(label("Send", &send.id), &send.destination));
            }
        }
    }
    Ok(())
}

fn check_arrangement_references(project: &Project) -> Result<()> {
    for clip in &project.arrangement.clips {
        if project.structure.resolve(&clip.track).is_none() {
            return Err(DawProjectError::dangling(label("Clip", &clip.id), &clip.track));
        }
    }
    for lane in &project.arrangement.automation {
        check_automation_target(project, lane)?;
    }
    Ok(())
}

pub(crate) fn check_automation_target(project: &Project, lane: &AutomationLane) -> Result<()> {
    let element = label("AutomationLane", &lane.id);
    match &lane.target {
        AutomationTarget::Channel { channel, .. } => {
            if project.structure.channel(channel).is_none() {
                return Err(DawProjectError::dangling(element, channel));
            }
        }
        AutomationTarget::Device { device, parameter } => {
            let found = project
                .structure
                .channels()
                .find_map(|c| c.device(device))
                .ok_or_else(|| DawProjectError::dangling(element.clone(), device))?;
            if !found.parameters.contains(parameter) {
                return Err(DawProjectError::dangling(element, format!("{}/{}", device, parameter)));
            }
        }
    }
    Ok(())
}

/// At most one master channel among the direct children of any parent,
/// with the top-level tracks counting as one group.
pub(crate) fn check_master_groups(project: &Project) -> Result<()> {
    check_group(project.structure.roots())?;
    for track in project.structure.tracks() {
        check_group(&track.children)?;
    }
    Ok(())
}

fn check_group(group: &[Track]) -> Result<()> {
    let mut masters = group.iter().filter(|t| t.role() == MixerRole::Master);
    masters.next();
    if let Some(extra) = masters.next() {
        return Err(DawProjectError::invalid(
            label("Channel", &extra.channel.id),
            "role",
            MixerRole::Master,
            "at most one master channel per track group",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Application, Channel, ChannelConfig, ClipPlacement, Device, DeviceConfig, ParameterSet,
        TrackConfig,
    };
    use std::collections::BTreeSet;

    fn track(id: &str, role: MixerRole, destination: Option<&str>) -> Track {
        Track::new(TrackConfig {
            id: id.into(),
            name: id.into(),
            content_types: BTreeSet::new(),
            color: None,
            channel: Channel::new(ChannelConfig {
                id: format!("{id}-ch"),
                role,
                destination: destination.map(String::from),
                ..Default::default()
            })
            .unwrap(),
        })
        .unwrap()
    }

    fn project() -> Project {
        let mut p = Project::new(Application::new("Test", "1").unwrap()).unwrap();
        p.add_track(track("master", MixerRole::Master, None)).unwrap();
        p.add_track(track("lead", MixerRole::Regular, Some("master-ch"))).unwrap();
        p
    }

    #[test]
    fn test_valid_project_passes() {
        assert!(validate(&project()).is_ok());
    }

    #[test]
    fn test_direct_assignment_caught() {
        let mut p = project();
        p.channel_mut("lead-ch").unwrap().pan = 3.0;
        assert!(matches!(
            validate(&p),
            Err(DawProjectError::InvalidField { field: "pan", .. })
        ));
    }

    #[test]
    fn test_duplicate_track_id() {
        let mut p = project();
        let mut dup = track("lead", MixerRole::Regular, None);
        dup.channel.id = "other-ch".into();
        p.track_mut("master").unwrap().children.push(dup);
        assert!(matches!(
            validate(&p),
            Err(DawProjectError::DuplicateId { ref id }) if id == "lead"
        ));
    }

    #[test]
    fn test_ids_share_namespace() {
        let mut p = project();
        p.arrangement
            .clips
            .push(ClipPlacement::new("lead-ch", "lead", 0.0, 1.0).unwrap());
        assert!(matches!(validate(&p), Err(DawProjectError::DuplicateId { .. })));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut p = project();
        p.channel_mut("master-ch").unwrap().destination = Some("lead-ch".into());
        assert!(matches!(validate(&p), Err(DawProjectError::RoutingCycle { .. })));
    }

    #[test]
    fn test_dangling_clip() {
        let mut p = project();
        p.arrangement
            .clips
            .push(ClipPlacement::new("clip", "ghost", 0.0, 1.0).unwrap());
        match validate(&p) {
            Err(DawProjectError::DanglingReference { element, id }) => {
                assert_eq!(element, "Clip 'clip'");
                assert_eq!(id, "ghost");
            }
            other => panic!("expected DanglingReference, got {other:?}"),
        }
    }

    #[test]
    fn test_device_automation_target_needs_parameter() {
        let mut p = project();
        let mut parameters = ParameterSet::new();
        parameters.insert("threshold", -18.0).unwrap();
        let device = Device::new(DeviceConfig {
            id: "comp".into(),
            name: "Compressor".into(),
            enabled: true,
            parameters,
            ..Default::default()
        })
        .unwrap();
        p.channel_mut("lead-ch").unwrap().devices.push(device);

        let lane = |param: &str| {
            AutomationLane::new(
                "lane",
                AutomationTarget::Device {
                    device: "comp".into(),
                    parameter: param.into(),
                },
            )
            .unwrap()
        };
        assert!(check_automation_target(&p, &lane("threshold")).is_ok());
        assert!(check_automation_target(&p, &lane("ratio")).is_err());
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut p = project();
        p.version = "9.0".into();
        assert!(matches!(
            validate(&p),
            Err(DawProjectError::UnsupportedVersion { .. })
        ));
    }
}
