//! Per-tick status reconciliation.
//!
//! The player offers no push notifications, so every state fact is inferred
//! from a 1-second poll of its status document. Ticks are strictly
//! sequential: the poll thread runs one tick body at a time and the
//! cancellation signal is honored between ticks. The loop itself never
//! terminates on error; a failed fetch discards and recreates the port
//! connection and parks the state in Searching until a poll succeeds.

use std::time::Duration;

use tracing::{error, info};

use crate::model::{DeckEvent, MediaEntry, PlaybackPhase};
use crate::orchestrator::OrchestratorShared;
use crate::port::PlayerStatus;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Position delta treated as a manual seek rather than normal progress.
const SEEK_JUMP_SECS: u64 = 2;

/// Safety margin before the known duration that triggers auto-advance when
/// no explicit end offset is defined.
const END_MARGIN_SECS: u64 = 10;

/// Ticks of continuous same-file playback between forced time refreshes
/// (1 poll/sec, so 300 ticks is five minutes).
const WATCHDOG_TICKS: u32 = 300;

/// Why reconciliation decided to leave the current entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AdvanceReason {
    /// The entry's explicit end offset was reached.
    ExplicitEnd,
    /// No explicit end; the pre-end safety margin of the known duration
    /// was reached.
    DurationMargin,
}

/// Segment window of an entry: (start offset, segment duration).
///
/// The end defaults to the known duration when the entry defines none;
/// without either the segment duration is 0.
pub(crate) fn segment_bounds(entry: &MediaEntry, reported_duration: Option<u64>) -> (u64, u64) {
    let start = entry.start_secs;
    let end = if entry.end_secs > 0 {
        entry.end_secs
    } else {
        entry.duration_secs.or(reported_duration).unwrap_or(0)
    };
    let segment = end.saturating_sub(start);
    (start, segment)
}

pub(crate) fn advance_reason(
    entry: &MediaEntry,
    position: u64,
    reported_duration: Option<u64>,
) -> Option<AdvanceReason> {
    if entry.end_secs > 0 {
        if position >= entry.end_secs {
            return Some(AdvanceReason::ExplicitEnd);
        }
        return None;
    }

    let duration = reported_duration.unwrap_or(0);
    if duration > END_MARGIN_SECS && position >= duration - END_MARGIN_SECS {
        return Some(AdvanceReason::DurationMargin);
    }
    None
}

/// Change trackers deciding when the time counters in the status sink are
/// rewritten.
#[derive(Clone, Debug, Default)]
pub(crate) struct SinkTracker {
    last_file: Option<String>,
    last_position: Option<u64>,
    watchdog_file: Option<String>,
    watchdog_ticks: u32,
}

impl SinkTracker {
    /// True when the polled file differs from the previous tick's.
    fn media_changed(&mut self, file: &str) -> bool {
        let changed = self.last_file.as_deref() != Some(file);
        self.last_file = Some(file.to_string());
        changed
    }

    /// True when the position jumped by more than the seek threshold since
    /// the previous tick.
    fn seek_jump(&mut self, position: u64) -> bool {
        let jumped = self
            .last_position
            .is_some_and(|prev| position.abs_diff(prev) > SEEK_JUMP_SECS);
        self.last_position = Some(position);
        jumped
    }

    /// True every `WATCHDOG_TICKS` ticks of continuous playback of the same
    /// file; anything else resets the interval.
    fn watchdog_due(&mut self, file: &str, playing: bool) -> bool {
        if file.is_empty() || !playing {
            self.watchdog_ticks = 0;
            self.watchdog_file = None;
            return false;
        }

        let same_file = self
            .watchdog_file
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case(file));
        if !same_file {
            self.watchdog_ticks = 0;
            self.watchdog_file = Some(file.to_string());
        }

        self.watchdog_ticks += 1;
        if self.watchdog_ticks >= WATCHDOG_TICKS {
            self.watchdog_ticks = 0;
            true
        } else {
            false
        }
    }
}

/// One body of the poll loop.
pub(crate) fn run_tick(shared: &OrchestratorShared) {
    let status = match shared.fetch_status() {
        Ok(status) => status,
        Err(err) => {
            error!(error = %err, "Status poll failed; resetting player connection");
            shared.recreate_port();
            shared.sink.write_stop_marker();
            shared.set_searching();
            return;
        }
    };

    reconcile(shared, &status);
    tick_timing(shared);
    shared.mark_connected();
}

/// Folds a status document into the playback state and notifies subscribers.
///
/// The filename reported by the player is matched against the playlist by
/// basename (case-insensitive); the match becomes the authoritative current
/// media. With no match a transient placeholder entry is synthesized so
/// consumers still observe a title.
fn reconcile(shared: &OrchestratorShared, status: &PlayerStatus) {
    let (phase, snapshot) = {
        let mut deck = shared.deck.lock().unwrap();
        deck.playback.volume_percent = status.volume_percent();
        deck.playback.phase = status.phase();
        deck.playback.position_secs = status.position_secs;
        deck.playback.duration_secs = Some(status.duration_secs);

        let filename = status
            .filename
            .clone()
            .unwrap_or_else(|| "No media".to_string());
        let matched = deck.playlist.find_by_basename(&filename).cloned();
        deck.playback.current_media =
            Some(matched.unwrap_or_else(|| MediaEntry::new(filename.clone(), filename)));

        (deck.playback.phase, deck.playback.clone())
    };

    shared
        .subscribers
        .notify(DeckEvent::from_phase(phase), &snapshot);
}

/// Time-counter refresh and auto-advance checks for the selected entry.
fn tick_timing(shared: &OrchestratorShared) {
    let (entry, position, duration, playing) = {
        let deck = shared.deck.lock().unwrap();
        let Some(entry) = deck.playlist.current().cloned() else {
            return;
        };
        (
            entry,
            deck.playback.position_secs,
            deck.playback.duration_secs,
            deck.playback.phase == PlaybackPhase::Playing,
        )
    };

    let (start, segment) = segment_bounds(&entry, duration);
    let relative = position.saturating_sub(start);

    let (media_changed, seek_jumped, watchdog_due) = {
        let mut deck = shared.deck.lock().unwrap();
        let tracker = &mut deck.tracker;
        (
            tracker.media_changed(&entry.path),
            tracker.seek_jump(position),
            tracker.watchdog_due(&entry.path, playing),
        )
    };

    if media_changed && playing {
        shared.sink.write_times(0, segment);
        info!(file = %entry.path, segment, "Media changed; reset time counters");
    }
    if seek_jumped {
        shared.sink.write_times(relative, segment);
        info!(relative, segment, "Seek detected; updated time counters");
    }
    if watchdog_due {
        shared.sink.write_times(relative, segment);
        info!(file = %entry.path, "Periodic time counter refresh");
    }

    if let Some(reason) = advance_reason(&entry, position, duration) {
        match reason {
            AdvanceReason::ExplicitEnd => info!(
                position,
                end = entry.end_secs,
                "End offset reached; advancing or looping"
            ),
            AdvanceReason::DurationMargin => info!(
                position,
                "Pre-end safety margin reached; advancing or looping"
            ),
        }
        shared.notify_event(DeckEvent::EndReached);
        shared.advance_or_loop();
    }
}
