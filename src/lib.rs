//! dawproject - DAW project model and DAWProject XML codec
//!
//! A typed, in-memory model of a DAW session (tracks, mixer channels,
//! routing, devices, clips and automation) plus a codec that writes it to and
//! reads it from canonical DAWProject-style XML.
//!
//! # Architecture
//!
//! - `model`: entities with validating constructors
//! - `structure`: the owned track forest and the routing graph derived from it
//! - `codec`: validation gate, encoder, decoder and format version gate
//! - `builder`: project construction from per-track mix settings
//!
//! ```no_run
//! use dawproject::{codec, Application, Project};
//!
//! let project = Project::new(Application::new("My DAW", "1.0")?)?;
//! let xml = codec::encode(&project)?;
//! assert_eq!(codec::decode(&xml)?, project);
//! # Ok::<(), dawproject::DawProjectError>(())
//! ```

pub mod builder;
pub mod codec;
pub mod error;
pub mod model;
pub mod structure;

pub use builder::{ProjectBuilder, TrackSettings};
pub use codec::{decode, encode, validate};
pub use error::{DawProjectError, Result};
pub use model::{
    Application, Arrangement, AutomationLane, AutomationPoint, AutomationTarget, AuxSend,
    Channel, ChannelConfig, ChannelParameter, ClipPlacement, ContentType, Device, DeviceConfig,
    DeviceRole, Extensions, Marker, MetaData, MixerRole, Parameter, ParameterSet, ParameterValue,
    Project, SendType, TempoPoint, TimeSignature, TimeSignaturePoint, TimeUnit, Track, TrackConfig,
    Transport,
};
pub use structure::{RoutingGraph, Structure};
