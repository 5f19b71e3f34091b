//! Closed vocabularies with canonical XML tokens.
//!
//! Tokens are spelled out by hand and never derived from the Rust variant
//! names, so renaming a variant can never change the file format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DawProjectError;

/// Declares a closed enum with a fixed token table, `Display` and `FromStr`.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $token:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $token)] $variant ),+
        }

        impl $name {
            /// Every member of the vocabulary, in canonical order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical XML token.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DawProjectError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err(DawProjectError::invalid(
                        stringify!($name),
                        "token",
                        other,
                        format!(
                            "expected one of: {}",
                            [$($token),+].join(", ")
                        ),
                    )),
                }
            }
        }
    };
}

token_enum! {
    /// What a track carries.
    ContentType {
        Audio => "audio",
        Notes => "notes",
        Automation => "automation",
        Video => "video",
    }
}

token_enum! {
    /// Function of a mixer channel.
    MixerRole {
        /// Final output bus.
        Master => "master",
        Regular => "regular",
        /// Effect return fed by sends.
        Effect => "effectTrack",
        Submix => "submix",
    }
}

token_enum! {
    /// Position of a device in the signal chain.
    DeviceRole {
        Instrument => "instrument",
        NoteFx => "noteFX",
        AudioFx => "audioFX",
        Analyzer => "analyzer",
    }
}

token_enum! {
    /// Tap point of a send relative to the channel fader.
    SendType {
        Pre => "pre",
        Post => "post",
    }
}

token_enum! {
    /// Unit of arrangement time values.
    TimeUnit {
        Beats => "beats",
        Seconds => "seconds",
    }
}

token_enum! {
    /// Channel parameters that automation lanes may target.
    ChannelParameter {
        Volume => "volume",
        Pan => "pan",
        Mute => "mute",
    }
}

impl Default for MixerRole {
    fn default() -> Self {
        MixerRole::Regular
    }
}

impl Default for DeviceRole {
    fn default() -> Self {
        DeviceRole::AudioFx
    }
}

impl Default for SendType {
    fn default() -> Self {
        SendType::Post
    }
}

impl Default for TimeUnit {
    fn default() -> Self {
        TimeUnit::Beats
    }
}
