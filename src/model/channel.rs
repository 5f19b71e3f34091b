//! Mixer channels and sends
//!
//! A channel's `destination` and each send's `destination` are channel ids,
//! not owning references. Whether they resolve, and whether they form a loop,
//! can only be decided at the project level (see `structure::routing`).

use serde::{Deserialize, Serialize};

use super::{
    check_at_least, check_extensions, check_id, check_range, label, Device, Extensions,
    MixerRole, SendType,
};
use crate::error::{DawProjectError, Result};

/// Lowest pan position (hard left).
pub const PAN_MIN: f64 = -1.0;
/// Highest pan position (hard right).
pub const PAN_MAX: f64 = 1.0;

/// Convert decibels to linear gain
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to decibels
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Attribute names the codec writes for a channel.
pub(crate) const CHANNEL_ATTRIBUTES: &[&str] =
    &["id", "role", "audioChannels", "solo", "destination"];

/// Configuration for [`Channel::new`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub id: String,
    pub role: MixerRole,
    pub audio_channels: u16,
    /// Linear gain, 1.0 = unity.
    pub volume: f64,
    pub pan: f64,
    pub muted: bool,
    pub solo: bool,
    pub destination: Option<String>,
    pub devices: Vec<Device>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            role: MixerRole::Regular,
            audio_channels: 2,
            volume: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
            destination: None,
            devices: Vec::new(),
        }
    }
}

/// A mixing strip owned by a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub role: MixerRole,
    pub audio_channels: u16,
    pub volume: f64,
    pub pan: f64,
    pub muted: bool,
    pub solo: bool,
    /// Id of the channel this one outputs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub sends: Vec<AuxSend>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl Channel {
    /// Create a channel. Out-of-range pan/volume is rejected, never clamped.
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let channel = Self {
            id: config.id,
            role: config.role,
            audio_channels: config.audio_channels,
            volume: config.volume,
            pan: config.pan,
            muted: config.muted,
            solo: config.solo,
            destination: config.destination,
            devices: config.devices,
            sends: Vec::new(),
            extensions: Extensions::new(),
        };
        channel.check()?;
        Ok(channel)
    }

    /// Field-level checks shared by the constructor and the validation gate.
    pub fn check(&self) -> Result<()> {
        check_id("Channel", &self.id)?;
        let entity = label("Channel", &self.id);
        if self.audio_channels == 0 {
            return Err(DawProjectError::invalid(
                entity,
                "audio_channels",
                self.audio_channels,
                "a channel needs at least one audio channel",
            ));
        }
        check_at_least(&entity, "volume", self.volume, 0.0)?;
        check_range(&entity, "pan", self.pan, PAN_MIN, PAN_MAX)?;
        if let Some(dest) = &self.destination {
            if dest == &self.id {
                return Err(DawProjectError::RoutingCycle {
                    path: vec![self.id.clone(), self.id.clone()],
                });
            }
        }
        for device in &self.devices {
            device.check()?;
        }
        for send in &self.sends {
            send.check()?;
        }
        check_extensions(&entity, &self.extensions, CHANNEL_ATTRIBUTES)
    }

    /// Look up a device in this channel's chain.
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Outgoing routing edges: the main destination first, then sends in order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.destination
            .as_deref()
            .into_iter()
            .chain(self.sends.iter().map(|s| s.destination.as_str()))
    }
}

/// An auxiliary feed from one channel into another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxSend {
    pub id: String,
    /// Id of the receiving channel.
    pub destination: String,
    pub volume: f64,
    pub send_type: SendType,
    pub enabled: bool,
}

impl AuxSend {
    pub fn new(
        id: impl Into<String>,
        destination: impl Into<String>,
        volume: f64,
        send_type: SendType,
    ) -> Result<Self> {
        let send = Self {
            id: id.into(),
            destination: destination.into(),
            volume,
            send_type,
            enabled: true,
        };
        send.check()?;
        Ok(send)
    }

    pub fn check(&self) -> Result<()> {
        check_id("Send", &self.id)?;
        let entity = label("Send", &self.id);
        if self.destination.trim().is_empty() {
            return Err(DawProjectError::invalid(
                entity,
                "destination",
                "\"\"",
                "must name a channel id",
            ));
        }
        check_at_least(&entity, "volume", self.volume, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn config(pan: f64, volume: f64) -> ChannelConfig {
        ChannelConfig {
            id: "ch-1".into(),
            pan,
            volume,
            ..Default::default()
        }
    }

    #[test]
    fn test_channel_new_accepts_valid_values() {
        let channel = Channel::new(config(-0.25, 0.8)).unwrap();
        assert_eq!(channel.pan, -0.25);
        assert_eq!(channel.volume, 0.8);
        assert_eq!(channel.role, MixerRole::Regular);
    }

    #[test_case(1.5, 1.0, "pan" ; "pan above range")]
    #[test_case(-1.01, 1.0, "pan" ; "pan below range")]
    #[test_case(f64::NAN, 1.0, "pan" ; "pan nan")]
    #[test_case(0.0, -0.1, "volume" ; "negative volume")]
    #[test_case(0.0, f64::INFINITY, "volume" ; "infinite volume")]
    fn test_channel_new_rejects_out_of_range(pan: f64, volume: f64, expected: &str) {
        match Channel::new(config(pan, volume)) {
            Err(DawProjectError::InvalidField { field, entity, .. }) => {
                assert_eq!(field, expected);
                assert_eq!(entity, "Channel 'ch-1'");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_self_destination_is_cycle() {
        let mut cfg = config(0.0, 1.0);
        cfg.destination = Some("ch-1".into());
        assert!(matches!(
            Channel::new(cfg),
            Err(DawProjectError::RoutingCycle { .. })
        ));
    }

    #[test]
    fn test_gain_conversions() {
        approx::assert_relative_eq!(db_to_linear(0.0), 1.0);
        approx::assert_relative_eq!(db_to_linear(-6.0), 0.501187, epsilon = 1e-6);
        approx::assert_relative_eq!(linear_to_db(db_to_linear(-12.5)), -12.5, epsilon = 1e-9);
        assert_eq!(linear_to_db(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_outputs_lists_destination_then_sends() {
        let mut cfg = config(0.0, 1.0);
        cfg.destination = Some("master".into());
        let mut channel = Channel::new(cfg).unwrap();
        channel
            .sends
            .push(AuxSend::new("send-1", "reverb", 0.5, SendType::Post).unwrap());

        let outputs: Vec<_> = channel.outputs().collect();
        assert_eq!(outputs, vec!["master", "reverb"]);
    }
}
