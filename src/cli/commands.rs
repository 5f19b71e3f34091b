//! CLI Command Implementations
//!
//! File I/O lives here; the library itself only sees bytes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use dawproject::codec;
use dawproject::Result;
use dawproject::{
    Application, Channel, ChannelConfig, ContentType, MixerRole, Project, Track, TrackConfig,
};

/// Expand directories into the `*.xml` files below them, sorted.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                let is_xml = entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("xml"))
                    .unwrap_or(false);
                if entry.file_type().is_file() && is_xml {
                    files.insert(entry.into_path());
                }
            }
        } else {
            files.insert(path.clone());
        }
    }
    files.into_iter().collect()
}

fn load(path: &Path) -> anyhow::Result<Project> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let project = codec::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    Ok(project)
}

/// Validate every file; returns the number of files that failed.
pub fn validate(paths: &[PathBuf]) -> anyhow::Result<usize> {
    let files = collect_files(paths);
    if files.is_empty() {
        bail!("no project files found");
    }
    info!("Validating {} file(s)", files.len());

    let mut failures = 0;
    for file in &files {
        let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        match codec::decode(&bytes) {
            Ok(project) => {
                println!("ok    {} ({} tracks)", file.display(), project.structure.len());
            }
            Err(err) => {
                failures += 1;
                warn!(file = %file.display(), code = err.error_code(), "validation failed");
                println!("FAIL  {}: {}", file.display(), err);
                if let Some(hint) = err.recovery_suggestion() {
                    println!("      hint: {}", hint);
                }
            }
        }
    }
    println!("{} checked, {} failed", files.len(), failures);
    Ok(failures)
}

/// Print a project summary, or the whole project as JSON.
pub fn inspect(path: &Path, json: bool) -> anyhow::Result<()> {
    let project = load(path)?;
    if json {
        println!("{}", project.to_json_pretty()?);
        return Ok(());
    }

    println!("Format version: {}", project.version);
    println!(
        "Application:    {} {}",
        project.application.name, project.application.version
    );
    if let Some(title) = &project.metadata.title {
        println!("Title:          {}", title);
    }
    let signature = project.transport.time_signature;
    println!(
        "Transport:      {} bpm, {}/{}",
        project.transport.tempo, signature.numerator, signature.denominator
    );

    println!("Tracks:");
    for (depth, track) in project.structure.depth_first() {
        let channel = &track.channel;
        let destination = channel
            .destination
            .as_deref()
            .map(|d| format!(" -> {}", d))
            .unwrap_or_default();
        println!(
            "{:indent$}- {} [{}] vol {} pan {}{}",
            "",
            track.name,
            channel.role,
            channel.volume,
            channel.pan,
            destination,
            indent = 2 + depth * 2
        );
        for device in &channel.devices {
            println!(
                "{:indent$}* {} ({}, {} parameters)",
                "",
                device.name,
                device.role,
                device.parameters.len(),
                indent = 4 + depth * 2
            );
        }
        for send in &channel.sends {
            println!(
                "{:indent$}~ send {} -> {} ({})",
                "",
                send.volume,
                send.destination,
                send.send_type,
                indent = 4 + depth * 2
            );
        }
    }

    let arrangement = &project.arrangement;
    println!(
        "Arrangement:    {} clip(s), {} automation lane(s), {} marker(s) [{}]",
        arrangement.clips.len(),
        arrangement.automation.len(),
        arrangement.markers.len(),
        arrangement.time_unit
    );
    Ok(())
}

/// Decode, re-encode and decode again; the fingerprints must match.
pub fn roundtrip(path: &Path) -> anyhow::Result<()> {
    let original = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let first = codec::decode(&original).with_context(|| format!("decoding {}", path.display()))?;
    let canonical = codec::encode(&first)?;
    let second = codec::decode(&canonical).context("decoding canonical encoding")?;

    let before = codec::fingerprint(&first)?;
    let after = codec::fingerprint(&second)?;
    println!("decoded:    {}", before);
    println!("re-decoded: {}", after);

    if first != second || before != after {
        bail!("round trip changed the project");
    }
    if original == canonical {
        println!("File is already in canonical form.");
    } else {
        debug!(
            original = original.len(),
            canonical = canonical.len(),
            "file differs from canonical encoding"
        );
        println!("Round trip ok (file is not in canonical form).");
    }
    Ok(())
}

/// Master bus plus one "Lead Synth" audio track routed into it.
pub fn demo_project() -> Result<Project> {
    let mut project = Project::new(Application::new("dawproject-cli", env!("CARGO_PKG_VERSION"))?)?;
    project.metadata.title = Some("Demo".to_string());

    let master = Track::new(TrackConfig {
        id: "master".to_string(),
        name: "Master".to_string(),
        content_types: BTreeSet::from([ContentType::Audio]),
        color: None,
        channel: Channel::new(ChannelConfig {
            id: "master-channel".to_string(),
            role: MixerRole::Master,
            volume: 1.0,
            pan: 0.5,
            ..Default::default()
        })?,
    })?;
    project.add_track(master)?;

    let lead = Track::new(TrackConfig {
        id: "lead".to_string(),
        name: "Lead Synth".to_string(),
        content_types: BTreeSet::from([ContentType::Audio]),
        color: Some("#3366ff".to_string()),
        channel: Channel::new(ChannelConfig {
            id: "lead-channel".to_string(),
            role: MixerRole::Regular,
            volume: 0.8,
            pan: 0.2,
            destination: Some("master-channel".to_string()),
            ..Default::default()
        })?,
    })?;
    project.add_track(lead)?;
    Ok(project)
}

/// Write the demo project to `output`.
pub fn demo(output: &Path) -> anyhow::Result<()> {
    let project = demo_project()?;
    let bytes = codec::encode(&project)?;
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    println!("Demo project written: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_walks_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.xml"), "").unwrap();
        fs::write(nested.join("a.XML"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().is_some()));
    }

    #[test]
    fn test_demo_then_validate_and_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.xml");
        demo(&path).unwrap();

        assert_eq!(validate(&[path.clone()]).unwrap(), 0);
        roundtrip(&path).unwrap();
        inspect(&path, false).unwrap();
        inspect(&path, true).unwrap();
    }

    #[test]
    fn test_validate_counts_failures() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.xml"), "<Project version=\"1.0\">").unwrap();
        assert_eq!(validate(&[dir.path().to_path_buf()]).unwrap(), 1);
    }
}
