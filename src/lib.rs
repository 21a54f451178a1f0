//! Lockstep — client-side synchronization core.
//!
//! Many independently clocked devices play the same media in step. Each
//! device runs a [`engine::Player`] fed with the coordinator's broadcasts:
//!
//! - [`clock`] estimates server time from a periodic offset exchange ([`timesync`])
//! - [`scheduler`] turns `play{targetTime}` into one local start
//! - [`drift`] keeps the running unit on the shared timeline
//! - [`playable`] is the uniform transport surface over streams and frame sequences
//! - [`source`] and [`loader`] decide what to show and build the units for it
//!
//! The crate is transport-agnostic: the host decodes server frames (see the
//! `frames` crate) and forwards them to the player over a channel.

pub mod clock;
pub mod config;
pub mod drift;
pub mod engine;
pub mod loader;
pub mod playable;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod timesync;

pub use clock::{LocalClock, SharedClock, SystemClock};
pub use config::PlayerConfig;
pub use engine::{EngineEvent, Player};
pub use loader::{CatalogLoader, LoadedMedia, UnitLoader};
pub use playable::{FrameSequenceUnit, PlayableUnit, StreamUnit, UnitKind};
pub use session::SyncRole;
pub use source::SourceResolver;
