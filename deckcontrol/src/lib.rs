//! ShowDeck playback control.
//!
//! Coordinates an ordered playlist on an external, network-controllable
//! media player: a 1-second status poller reconciles the player's reported
//! transport state into a [`PlaybackState`], auto-advances between entries,
//! fades volume, and publishes now/next/time-remaining status through a
//! [`StatusSink`]. The player itself is reached only through the
//! [`PlayerPort`] seam; wire transport, metadata registry and status output
//! are all replaceable collaborators.

mod events;
mod poller;

pub mod errors;
pub mod fade;
pub mod filename;
pub mod metadata;
pub mod model;
pub mod orchestrator;
pub mod playlist;
pub mod port;
pub mod status_sink;

pub use errors::DeckError;
pub use events::{ChannelSubscriber, EventSubscriber};
pub use metadata::{MetadataProvider, YamlCatalogProvider, build_entry};
pub use model::{DeckEvent, MediaEntry, MediaMetadata, PlaybackPhase, PlaybackState};
pub use orchestrator::PlaybackOrchestrator;
pub use playlist::{Playlist, RemovalEffect};
pub use port::{
    HttpPlayerPort, HttpPortConnector, PlayerPort, PlayerStatus, PortConnector, native_to_percent,
    percent_to_native,
};
pub use status_sink::{FileStatusSink, StatusSink, write_now_and_next};
