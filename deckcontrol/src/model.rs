//! Core data model shared by the orchestrator, the poller and the
//! external-facing traits.

use chrono::{DateTime, Local};
use serde::Deserialize;

/// Per-item overrides supplied by the metadata catalog.
///
/// All fields are optional; an entry whose lookup fails or returns nothing
/// stays usable with default segment bounds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MediaMetadata {
    /// Canonical title, preferred over the filename-derived one.
    pub title: Option<String>,
    /// Release year, appended to the display title as "Title (Year)".
    pub year: Option<u32>,
    /// Playback start offset in seconds.
    pub start_secs: Option<u64>,
    /// Playback end offset in seconds (0 or absent plays to the natural end).
    pub end_secs: Option<u64>,
    /// Target volume percent for this item (0-200).
    pub volume: Option<u16>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A single media file queued for playback.
///
/// The file path is the entry's identity: no two entries in one playlist may
/// share a path (case-insensitive).
#[derive(Clone, Debug)]
pub struct MediaEntry {
    /// Full path of the media file, as handed to the player.
    pub path: String,
    /// Display title shown in the now/next status output.
    pub title: String,
    /// Known total duration in seconds, when available.
    pub duration_secs: Option<u64>,
    /// Start offset in seconds; playback seeks here after starting.
    pub start_secs: u64,
    /// End offset in seconds; 0 means "play to the natural end".
    pub end_secs: u64,
    /// When the entry was added to the playlist.
    pub added_at: Option<DateTime<Local>>,
    /// Catalog metadata, when the lookup succeeded.
    pub metadata: Option<MediaMetadata>,
    /// True once catalog metadata has been applied to this entry.
    pub metadata_loaded: bool,
    /// Error recorded during the catalog lookup, if any.
    pub metadata_error: Option<String>,
}

impl MediaEntry {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            duration_secs: None,
            start_secs: 0,
            end_secs: 0,
            added_at: None,
            metadata: None,
            metadata_loaded: false,
            metadata_error: None,
        }
    }

    /// Last path component, used to match the filename reported by the player.
    pub fn basename(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

/// Reconciled lifecycle state of player and orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackPhase {
    #[default]
    None,
    /// The player is unreachable; left only after a successful poll.
    Searching,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackPhase {
    /// Map the player's raw state string to a logical phase.
    pub fn from_player_state(raw: &str) -> Self {
        match raw.trim() {
            "playing" => PlaybackPhase::Playing,
            "paused" => PlaybackPhase::Paused,
            "stopped" => PlaybackPhase::Stopped,
            _ => PlaybackPhase::None,
        }
    }

    /// Returns a human-readable label for the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackPhase::None => "NONE",
            PlaybackPhase::Searching => "SEARCHING",
            PlaybackPhase::Playing => "PLAYING",
            PlaybackPhase::Paused => "PAUSED",
            PlaybackPhase::Stopped => "STOPPED",
        }
    }
}

/// Raw event vocabulary fanned out to subscribers alongside the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeckEvent {
    None,
    Playing,
    Paused,
    Stopped,
    Searching,
    EndReached,
    MediaAdded,
    MediaRemoved,
    PlaylistUpdated,
}

impl DeckEvent {
    pub fn from_phase(phase: PlaybackPhase) -> Self {
        match phase {
            PlaybackPhase::None => DeckEvent::None,
            PlaybackPhase::Searching => DeckEvent::Searching,
            PlaybackPhase::Playing => DeckEvent::Playing,
            PlaybackPhase::Paused => DeckEvent::Paused,
            PlaybackPhase::Stopped => DeckEvent::Stopped,
        }
    }
}

/// Current playback state as reconciled from the player's status reports.
///
/// Mutated in place by reconciliation and control operations; replaced
/// wholesale only when entering the Searching phase.
#[derive(Clone, Debug, Default)]
pub struct PlaybackState {
    /// Snapshot of the entry the player currently reports, or a synthesized
    /// placeholder when the reported file is not in the playlist.
    pub current_media: Option<MediaEntry>,
    /// Absolute playback position in seconds.
    pub position_secs: u64,
    /// Total duration reported by the player, in seconds.
    pub duration_secs: Option<u64>,
    pub phase: PlaybackPhase,
    pub muted: bool,
    /// Volume percent on the 0-200 scale.
    pub volume_percent: u16,
    pub error: Option<String>,
}

impl PlaybackState {
    /// Fresh state for the Searching phase; the previous state is discarded.
    pub fn searching() -> Self {
        Self {
            phase: PlaybackPhase::Searching,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_from_player_state() {
        assert_eq!(
            PlaybackPhase::from_player_state("playing"),
            PlaybackPhase::Playing
        );
        assert_eq!(
            PlaybackPhase::from_player_state("paused"),
            PlaybackPhase::Paused
        );
        assert_eq!(
            PlaybackPhase::from_player_state("stopped"),
            PlaybackPhase::Stopped
        );
        assert_eq!(
            PlaybackPhase::from_player_state("buffering"),
            PlaybackPhase::None
        );
        assert_eq!(PlaybackPhase::from_player_state(""), PlaybackPhase::None);
    }

    #[test]
    fn basename_handles_both_separators() {
        let unix = MediaEntry::new("/media/movies/Film (2019).mkv", "Film");
        assert_eq!(unix.basename(), "Film (2019).mkv");

        let windows = MediaEntry::new("C:\\media\\Film (2019).mkv", "Film");
        assert_eq!(windows.basename(), "Film (2019).mkv");

        let bare = MediaEntry::new("Film.mkv", "Film");
        assert_eq!(bare.basename(), "Film.mkv");
    }

    #[test]
    fn searching_state_is_reset() {
        let state = PlaybackState::searching();
        assert_eq!(state.phase, PlaybackPhase::Searching);
        assert!(state.current_media.is_none());
        assert_eq!(state.position_secs, 0);
        assert_eq!(state.volume_percent, 0);
    }
}
