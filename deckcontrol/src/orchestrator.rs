//! Playback orchestrator: owns the playlist, the single player connection
//! and the reconciled playback state.
//!
//! Every operation is best-effort: failures against the player are logged
//! and never propagate to the caller. The status poller and any in-flight
//! fades run concurrently with foreground operations; all access to the
//! playlist and playback state goes through one mutex, and the port handle
//! sits behind its own lock so state access is never held across player I/O.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::errors::DeckError;
use crate::events::{EventSubscriber, SubscriberRegistry};
use crate::fade::{FADE_STEP_MS, fade_plan};
use crate::model::{DeckEvent, MediaEntry, PlaybackPhase, PlaybackState};
use crate::playlist::{Playlist, RemovalEffect};
use crate::poller::{self, POLL_INTERVAL, SinkTracker, segment_bounds};
use crate::port::{PlayerPort, PlayerStatus, PortConnector, percent_to_native};
use crate::status_sink::{StatusSink, write_now_and_next};

/// Attempts and delay while waiting for the player to report "playing"
/// before seeking to a start offset.
const START_WAIT_ATTEMPTS: u32 = 20;
const START_WAIT_DELAY: Duration = Duration::from_millis(100);

#[derive(Default)]
pub(crate) struct DeckState {
    pub playlist: Playlist,
    pub playback: PlaybackState,
    pub tracker: SinkTracker,
    pub connected: bool,
}

pub(crate) struct OrchestratorShared {
    connector: Box<dyn PortConnector>,
    /// The single player connection; replaced wholesale after I/O failure.
    port: Arc<Mutex<Box<dyn PlayerPort>>>,
    pub(crate) deck: Mutex<DeckState>,
    pub(crate) subscribers: SubscriberRegistry,
    pub(crate) sink: Box<dyn StatusSink>,
    poll_stop: Mutex<Option<Sender<()>>>,
}

impl OrchestratorShared {
    fn with_port<R>(
        &self,
        f: impl FnOnce(&dyn PlayerPort) -> Result<R, DeckError>,
    ) -> Result<R, DeckError> {
        let port = self.port.lock().unwrap();
        f(port.as_ref())
    }

    pub(crate) fn fetch_status(&self) -> Result<PlayerStatus, DeckError> {
        self.with_port(|port| port.status())
    }

    /// Discards the current connection and builds a fresh one.
    pub(crate) fn recreate_port(&self) {
        match self.connector.connect() {
            Ok(port) => {
                *self.port.lock().unwrap() = port;
                debug!("Recreated player connection after failure");
            }
            Err(err) => error!(error = %err, "Failed to recreate player connection"),
        }
    }

    pub(crate) fn mark_connected(&self) {
        let mut deck = self.deck.lock().unwrap();
        if !deck.connected {
            deck.connected = true;
            info!("Player connection established");
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.deck.lock().unwrap().connected
    }

    /// Replaces the playback state wholesale and notifies subscribers.
    pub(crate) fn set_searching(&self) {
        let (was_connected, snapshot) = {
            let mut deck = self.deck.lock().unwrap();
            let was = deck.connected;
            deck.connected = false;
            deck.playback = PlaybackState::searching();
            (was, deck.playback.clone())
        };
        if was_connected {
            warn!("Player connection lost; entering searching state");
        }
        self.subscribers.notify(DeckEvent::Searching, &snapshot);
    }

    fn notify_phase(&self, phase: PlaybackPhase) {
        let snapshot = {
            let mut deck = self.deck.lock().unwrap();
            deck.playback.phase = phase;
            deck.playback.clone()
        };
        self.subscribers.notify(DeckEvent::from_phase(phase), &snapshot);
    }

    pub(crate) fn notify_event(&self, event: DeckEvent) {
        let snapshot = self.deck.lock().unwrap().playback.clone();
        self.subscribers.notify(event, &snapshot);
    }

    fn play(&self) {
        info!("Play requested");
        let selection = {
            let mut deck = self.deck.lock().unwrap();
            if deck.playlist.current_index().is_none() && !deck.playlist.is_empty() {
                deck.playlist.set_current(Some(0));
            }
            deck.playlist.current_index()
        };

        match selection {
            Some(index) => self.start_playback(index),
            None => self.resume_playback(),
        }
    }

    /// Plays the entry at `index` from scratch: play-file, immediate
    /// now/next update, optional start-offset seek, then a detached fade to
    /// the entry's target volume.
    pub(crate) fn start_playback(&self, index: usize) {
        let (entry, next) = {
            let mut deck = self.deck.lock().unwrap();
            let Some(entry) = deck.playlist.get(index).cloned() else {
                warn!(
                    index,
                    playlist_count = deck.playlist.len(),
                    "Playback aborted: invalid index"
                );
                return;
            };
            deck.playlist.set_current(Some(index));
            (entry, deck.playlist.peek_next().cloned())
        };

        info!(index, file = %entry.path, title = %entry.title, "Starting playback");
        if let Err(err) = self.with_port(|port| port.play_file(&entry.path)) {
            error!(file = %entry.path, error = %err, "Failed to start playback");
            return;
        }

        // Overlay update happens immediately, not on the next poll.
        write_now_and_next(&self.sink, Some(&entry), next.as_ref());
        self.notify_phase(PlaybackPhase::Playing);

        if entry.start_secs > 0 {
            debug!("Waiting for the player to report 'playing' before seeking");
            self.wait_for_playing();
            info!(start = entry.start_secs, "Seeking to start offset");
            if let Err(err) = self.with_port(|port| port.seek(entry.start_secs)) {
                error!(error = %err, "Failed to seek to start offset");
            }
        }

        let target = self.resolve_target_volume(&entry);
        let last = self.deck.lock().unwrap().playback.volume_percent;
        self.spawn_fade(last, target);
    }

    /// Resume path: the selection (if any) is left alone and volume is
    /// normalized back to 100% rather than the entry's catalog volume.
    fn resume_playback(&self) {
        info!("Resuming playback");
        if let Err(err) = self.with_port(|port| port.resume()) {
            error!(error = %err, "Failed to resume playback");
            return;
        }

        let (current, next, position, duration) = {
            let deck = self.deck.lock().unwrap();
            (
                deck.playlist.current().cloned(),
                deck.playlist.peek_next().cloned(),
                deck.playback.position_secs,
                deck.playback.duration_secs,
            )
        };

        write_now_and_next(&self.sink, current.as_ref(), next.as_ref());
        self.notify_phase(PlaybackPhase::Playing);

        // Reflect the resume position right away instead of waiting a tick.
        let (start, segment) = current
            .as_ref()
            .map(|entry| segment_bounds(entry, duration))
            .unwrap_or((0, 0));
        self.sink.write_times(position.saturating_sub(start), segment);

        let last = self.deck.lock().unwrap().playback.volume_percent;
        info!("Resume: fading volume to 100% by default");
        self.spawn_fade(last, 100);
    }

    /// Blocks (bounded) until the player reports "playing"; proceeds
    /// regardless once the attempts are exhausted.
    fn wait_for_playing(&self) {
        for _ in 0..START_WAIT_ATTEMPTS {
            if let Ok(status) = self.fetch_status() {
                if status.phase() == PlaybackPhase::Playing {
                    return;
                }
            }
            thread::sleep(START_WAIT_DELAY);
        }
        warn!("Timed out waiting for the player to start playing");
    }

    fn resolve_target_volume(&self, entry: &MediaEntry) -> u16 {
        let from_catalog = if entry.metadata_loaded {
            entry.metadata.as_ref().and_then(|meta| meta.volume)
        } else {
            None
        };

        match from_catalog {
            Some(volume) => {
                info!(volume, "Setting volume from catalog metadata");
                volume.min(200)
            }
            None => {
                warn!("No catalog volume found, defaulting to 100%");
                100
            }
        }
    }

    /// Launches a detached linear fade. A newer fade does not cancel an
    /// older one still in flight; the last scheduled write wins.
    fn spawn_fade(&self, from: u16, to: u16) {
        let port = Arc::clone(&self.port);
        thread::spawn(move || {
            for step in fade_plan(from, to) {
                let sent = {
                    let port = port.lock().unwrap();
                    port.set_volume(percent_to_native(step))
                };
                if let Err(err) = sent {
                    warn!(error = %err, "Volume fade aborted");
                    return;
                }
                thread::sleep(Duration::from_millis(FADE_STEP_MS));
            }
            info!(from, to, "Volume fade completed");
        });
    }

    /// Dual-mode toggle keyed off the freshly queried player phase: pauses
    /// while playing, resumes while paused.
    fn pause(&self) {
        let status = match self.fetch_status() {
            Ok(status) => status,
            Err(err) => {
                error!(error = %err, "Pause failed: unable to query player state");
                return;
            }
        };

        if status.phase() == PlaybackPhase::Paused {
            // Persist the position being resumed from before toggling.
            let (current, duration) = {
                let deck = self.deck.lock().unwrap();
                (deck.playlist.current().cloned(), deck.playback.duration_secs)
            };
            let (start, segment) = current
                .as_ref()
                .map(|entry| segment_bounds(entry, duration))
                .unwrap_or((0, 0));
            self.sink
                .write_times(status.position_secs.saturating_sub(start), segment);

            if let Err(err) = self.with_port(|port| port.pause_toggle()) {
                error!(error = %err, "Failed to toggle pause");
                return;
            }
            self.notify_phase(PlaybackPhase::Playing);
            info!("Pause called while already paused; resumed playback");
        } else {
            if let Err(err) = self.with_port(|port| port.pause_toggle()) {
                error!(error = %err, "Failed to toggle pause");
                return;
            }
            self.notify_phase(PlaybackPhase::Paused);
            self.sink.write_pause_marker();
            info!("Pause called while playing; wrote pause marker");
        }
    }

    pub(crate) fn stop(&self) {
        info!("Stop requested");
        if let Err(err) = self.with_port(|port| port.stop()) {
            error!(error = %err, "Failed to stop playback");
            return;
        }
        self.notify_phase(PlaybackPhase::Stopped);
        self.sink.clear();
        self.sink.write_stop_marker();
    }

    fn add_media(&self, entry: MediaEntry) {
        let now_next = {
            let mut deck = self.deck.lock().unwrap();
            if !deck.playlist.add(entry.clone()) {
                warn!(file = %entry.path, "Duplicate media not added");
                return;
            }
            info!(file = %entry.path, title = %entry.title, "Media added");
            debug!(order = %deck.playlist.order_summary(), "Playlist after add");
            deck.playlist
                .current()
                .cloned()
                .map(|now| (now, deck.playlist.peek_next().cloned()))
        };

        self.notify_event(DeckEvent::MediaAdded);
        if let Some((now, next)) = now_next {
            write_now_and_next(&self.sink, Some(&now), next.as_ref());
        }
    }

    fn remove_media(&self, path: &str) {
        enum Followup {
            Stop,
            Play(usize),
            Nothing,
        }

        let followup = {
            let mut deck = self.deck.lock().unwrap();
            match deck.playlist.remove_path(path) {
                None => {
                    warn!(file = %path, "Remove requested for media not in playlist");
                    return;
                }
                Some((removed, effect)) => {
                    info!(file = %removed.path, title = %removed.title, "Media removed");
                    debug!(order = %deck.playlist.order_summary(), "Playlist after removal");
                    match effect {
                        RemovalEffect::Emptied => {
                            info!("Playlist empty after removal; stopping playback");
                            Followup::Stop
                        }
                        RemovalEffect::CurrentFollows(index) => {
                            info!(index, "Removed the selected entry; playing its successor");
                            Followup::Play(index)
                        }
                        RemovalEffect::SelectionKept => Followup::Nothing,
                    }
                }
            }
        };

        self.notify_event(DeckEvent::MediaRemoved);
        match followup {
            Followup::Stop => self.stop(),
            Followup::Play(index) => self.start_playback(index),
            Followup::Nothing => {}
        }
    }

    /// Skips to the next entry; stops and resets the selection when none
    /// exists. Returns whether playback advanced.
    fn advance_to_next(&self) -> bool {
        let next = {
            let mut deck = self.deck.lock().unwrap();
            if deck.playlist.is_empty() {
                info!("Advance requested on empty playlist; stopping");
                deck.playlist.set_current(None);
                None
            } else {
                let candidate = deck.playlist.current_index().map_or(0, |i| i + 1);
                if candidate < deck.playlist.len() {
                    Some(candidate)
                } else {
                    info!("No next media; stopping and resetting selection");
                    deck.playlist.set_current(None);
                    None
                }
            }
        };

        match next {
            Some(index) => {
                info!(index, "Advancing to next media");
                self.start_playback(index);
                true
            }
            None => {
                self.stop();
                false
            }
        }
    }

    /// Auto-advance target: wrap with more than one entry, replay a single
    /// entry, no-op when empty.
    pub(crate) fn advance_or_loop(&self) {
        let next = {
            let deck = self.deck.lock().unwrap();
            match deck.playlist.len() {
                0 => None,
                1 => Some(0),
                len => Some(deck.playlist.current_index().map_or(0, |i| (i + 1) % len)),
            }
        };

        match next {
            Some(index) => self.start_playback(index),
            None => warn!("No items in playlist to advance or loop"),
        }
    }

    fn set_volume(&self, percent: u16) {
        let safe = percent.min(200);
        let native = percent_to_native(safe);
        debug!(percent = safe, native, "Setting volume");
        if let Err(err) = self.with_port(|port| port.set_volume(native)) {
            error!(percent = safe, error = %err, "Failed to set volume");
        }
    }

    fn seek(&self, seconds: u64) {
        info!(seconds, "Seek requested");
        if let Err(err) = self.with_port(|port| port.seek(seconds)) {
            error!(error = %err, "Failed to seek");
        }
        // The next poll tick sees the jump and refreshes the time counters.
    }
}

/// Coordinates playlist management and high-level player control.
pub struct PlaybackOrchestrator {
    shared: Arc<OrchestratorShared>,
}

impl PlaybackOrchestrator {
    /// Builds the orchestrator and opens the initial player connection.
    ///
    /// Fails only on unrecoverable configuration problems surfaced by the
    /// connector; transient player unavailability is handled by the poller.
    pub fn new(
        connector: Box<dyn PortConnector>,
        sink: Box<dyn StatusSink>,
    ) -> Result<Self, DeckError> {
        let port = connector.connect()?;
        let shared = Arc::new(OrchestratorShared {
            connector,
            port: Arc::new(Mutex::new(port)),
            deck: Mutex::new(DeckState::default()),
            subscribers: SubscriberRegistry::new(),
            sink,
            poll_stop: Mutex::new(None),
        });
        info!("Playback orchestrator initialized");
        Ok(Self { shared })
    }

    /// Plays the selected entry, selecting the first when nothing is
    /// selected; with nothing selectable the call resumes the player's
    /// loaded media instead.
    pub fn play(&self) {
        self.shared.play();
    }

    /// Plays the entry at `index`; a warning no-op on invalid indices.
    pub fn play_at(&self, index: usize) {
        self.shared.start_playback(index);
    }

    /// Toggles pause/resume based on the player's live phase.
    pub fn pause(&self) {
        self.shared.pause();
    }

    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Seeks to an absolute position in seconds.
    pub fn seek(&self, seconds: u64) {
        self.shared.seek(seconds);
    }

    /// Sets the player volume; `percent` is clamped to [0, 200].
    pub fn set_volume(&self, percent: u16) {
        self.shared.set_volume(percent);
    }

    /// Appends an entry to the playlist, rejecting duplicate paths.
    pub fn add_media(&self, entry: MediaEntry) {
        self.shared.add_media(entry);
    }

    /// Removes an entry; selection and playback follow the documented
    /// removal rules.
    pub fn remove_media(&self, entry: &MediaEntry) {
        self.shared.remove_media(&entry.path);
    }

    /// Removes the entry with this path.
    pub fn remove_media_by_path(&self, path: &str) {
        self.shared.remove_media(path);
    }

    pub fn clear_playlist(&self) {
        {
            let mut deck = self.shared.deck.lock().unwrap();
            deck.playlist.clear();
        }
        info!("Playlist cleared");
        self.shared.notify_event(DeckEvent::PlaylistUpdated);
    }

    /// Case-insensitive playlist membership check.
    pub fn contains_media(&self, path: &str) -> bool {
        if path.trim().is_empty() {
            warn!("contains_media called with empty path");
            return false;
        }
        let contains = self.shared.deck.lock().unwrap().playlist.contains_path(path);
        debug!(file = %path, contains, "Playlist membership check");
        contains
    }

    /// Moves the entry at `index` one slot up; returns its new index.
    pub fn move_up(&self, index: usize) -> usize {
        info!(index, "Move up requested");
        let new_index = self.shared.deck.lock().unwrap().playlist.move_up(index);
        if new_index != index {
            self.shared.notify_event(DeckEvent::PlaylistUpdated);
        }
        new_index
    }

    /// Moves the entry at `index` one slot down; returns its new index.
    pub fn move_down(&self, index: usize) -> usize {
        info!(index, "Move down requested");
        let new_index = self.shared.deck.lock().unwrap().playlist.move_down(index);
        if new_index != index {
            self.shared.notify_event(DeckEvent::PlaylistUpdated);
        }
        new_index
    }

    /// Explicit skip to the next entry; returns whether playback advanced.
    pub fn advance_to_next(&self) -> bool {
        self.shared.advance_to_next()
    }

    pub fn playlist(&self) -> Vec<MediaEntry> {
        self.shared.deck.lock().unwrap().playlist.snapshot()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.shared.deck.lock().unwrap().playlist.current_index()
    }

    pub fn current_state(&self) -> PlaybackState {
        self.shared.deck.lock().unwrap().playback.clone()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.shared.subscribers.subscribe(subscriber);
    }

    pub fn unsubscribe(&self, subscriber: &Arc<dyn EventSubscriber>) {
        self.shared.subscribers.unsubscribe(subscriber);
    }

    /// Starts the 1-second status poll loop. Rejected with a warning while
    /// a poller is already running.
    pub fn start_polling(&self) {
        info!("Status polling start requested");
        let mut guard = self.shared.poll_stop.lock().unwrap();
        if guard.is_some() {
            warn!("Polling already active; ignoring start request");
            return;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::unbounded::<()>();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("deck-status-poller".into())
            .spawn(move || {
                if !shared.is_connected() {
                    shared.set_searching();
                }
                loop {
                    match stop_rx.recv_timeout(POLL_INTERVAL) {
                        Err(RecvTimeoutError::Timeout) => poller::run_tick(&shared),
                        // Cancellation or a dropped sender both end the loop,
                        // always between ticks.
                        _ => break,
                    }
                }
                info!("Status polling stopped");
            });

        match spawned {
            Ok(_) => *guard = Some(stop_tx),
            Err(err) => error!(error = %err, "Failed to spawn status poller thread"),
        }
    }

    /// Stops the poll loop after the in-flight tick completes.
    pub fn stop_polling(&self) {
        if let Some(stop) = self.shared.poll_stop.lock().unwrap().take() {
            info!("Status polling cancellation requested");
            drop(stop);
        }
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<OrchestratorShared> {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaMetadata;
    use crate::poller::run_tick;
    use crate::port::mock::{MockConnector, MockPortState, playing_status};
    use crate::status_sink::memory::MemorySink;

    fn entry(path: &str, title: &str) -> MediaEntry {
        MediaEntry::new(path, title)
    }

    fn entry_with_end(path: &str, title: &str, end: u64) -> MediaEntry {
        let mut entry = entry(path, title);
        entry.end_secs = end;
        entry
    }

    fn orchestrator() -> (PlaybackOrchestrator, MockPortState, Arc<MemorySink>) {
        let state = MockPortState::new();
        let sink = Arc::new(MemorySink::default());
        let orchestrator = PlaybackOrchestrator::new(
            Box::new(MockConnector::new(state.clone())),
            Box::new(sink.clone()),
        )
        .unwrap();
        (orchestrator, state, sink)
    }

    #[test]
    fn play_selects_first_entry_and_writes_now_next() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.add_media(entry("/m/b.mkv", "B"));

        orchestrator.play();

        assert_eq!(orchestrator.current_index(), Some(0));
        assert_eq!(port.commands_matching("play_file"), vec!["play_file:/m/a.mkv"]);
        let (now, next, ..) = sink.snapshot();
        assert_eq!(now, "A");
        assert_eq!(next, "B");
    }

    #[test]
    fn play_without_selectable_entry_resumes() {
        let (orchestrator, port, sink) = orchestrator();

        orchestrator.play();

        assert_eq!(port.commands_matching("resume"), vec!["resume"]);
        assert!(port.commands_matching("play_file").is_empty());
        let (now, next, ..) = sink.snapshot();
        assert_eq!(now, "No media playing");
        assert_eq!(next, "No next media");
    }

    #[test]
    fn single_entry_playlist_is_its_own_next() {
        let (orchestrator, _port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));

        orchestrator.play();
        let (now, next, ..) = sink.snapshot();
        assert_eq!(now, "A");
        assert_eq!(next, "A");
    }

    #[test]
    fn play_at_invalid_index_is_a_noop() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));

        orchestrator.play_at(5);

        assert_eq!(orchestrator.current_index(), Some(0));
        assert!(port.commands_matching("play_file").is_empty());
    }

    #[test]
    fn play_with_start_offset_waits_then_seeks() {
        let (orchestrator, port, _sink) = orchestrator();
        let mut a = entry("/m/a.mkv", "A");
        a.start_secs = 90;
        orchestrator.add_media(a);
        port.set_fallback(playing_status("a.mkv", 0, 100));

        orchestrator.play();

        assert_eq!(port.commands_matching("seek"), vec!["seek:90"]);
    }

    #[test]
    fn fade_targets_catalog_volume() {
        let (orchestrator, port, _sink) = orchestrator();
        let mut a = entry("/m/a.mkv", "A");
        a.metadata_loaded = true;
        a.metadata = Some(MediaMetadata {
            volume: Some(80),
            ..Default::default()
        });
        orchestrator.add_media(a);

        orchestrator.play();

        // The detached fade ends exactly on the catalog volume
        let expected_final = format!("volume:{}", percent_to_native(80));
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            let volumes = port.commands_matching("volume:");
            if volumes.last().map(String::as_str) == Some(expected_final.as_str()) {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "fade never reached target; saw {:?}",
                volumes.last()
            );
            thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    fn set_volume_scales_to_native_unit() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.set_volume(150);
        assert_eq!(port.commands_matching("volume:"), vec!["volume:384"]);

        // Over-range input clamps to 200% = native 512
        orchestrator.set_volume(201);
        assert_eq!(port.commands_matching("volume:")[1], "volume:512");
    }

    #[test]
    fn reported_volume_reconciles_back_to_percent() {
        let (orchestrator, port, _sink) = orchestrator();
        let mut status = playing_status("a.mkv", 5, 100);
        status.native_volume = 384;
        port.push_status(status);

        run_tick(orchestrator.shared());

        assert_eq!(orchestrator.current_state().volume_percent, 150);
    }

    #[test]
    fn stop_is_idempotent() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.play();

        orchestrator.stop();
        let after_first = sink.snapshot();
        let stops_after_first = port.commands_matching("stop").len();

        orchestrator.stop();
        assert_eq!(sink.snapshot(), after_first);
        assert_eq!(port.commands_matching("stop").len(), stops_after_first + 1);
        assert_eq!(orchestrator.current_state().phase, PlaybackPhase::Stopped);

        let (now, next, time_now, time_next) = after_first;
        assert_eq!(now, "");
        assert_eq!(next, "");
        assert_eq!(time_now, "stop");
        assert_eq!(time_next, "stop");
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let (orchestrator, _port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.add_media(entry("/M/A.MKV", "A again"));
        assert_eq!(orchestrator.playlist().len(), 1);
    }

    #[test]
    fn add_to_empty_playlist_cues_without_playing() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));

        assert_eq!(orchestrator.current_index(), Some(0));
        assert!(port.commands_matching("play_file").is_empty());
        // Now/next reflects the cued entry immediately
        let (now, next, ..) = sink.snapshot();
        assert_eq!(now, "A");
        assert_eq!(next, "A");
    }

    #[test]
    fn removing_current_entry_plays_successor() {
        let (orchestrator, port, _sink) = orchestrator();
        let a = entry("/m/a.mkv", "A");
        let b = entry("/m/b.mkv", "B");
        let c = entry("/m/c.mkv", "C");
        orchestrator.add_media(a);
        orchestrator.add_media(b.clone());
        orchestrator.add_media(c);
        orchestrator.play_at(1);

        orchestrator.remove_media(&b);

        assert_eq!(orchestrator.current_index(), Some(1));
        let plays = port.commands_matching("play_file");
        assert_eq!(plays.last().unwrap(), "play_file:/m/c.mkv");
    }

    #[test]
    fn removing_last_entry_stops_playback() {
        let (orchestrator, port, sink) = orchestrator();
        let a = entry("/m/a.mkv", "A");
        orchestrator.add_media(a.clone());
        orchestrator.play();

        orchestrator.remove_media(&a);

        assert!(orchestrator.playlist().is_empty());
        assert_eq!(orchestrator.current_index(), None);
        assert_eq!(port.commands_matching("stop").len(), 1);
        let (.., time_now, _) = sink.snapshot();
        assert_eq!(time_now, "stop");
    }

    #[test]
    fn removing_unknown_entry_is_a_noop() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.remove_media(&entry("/m/zz.mkv", "ZZ"));

        assert_eq!(orchestrator.playlist().len(), 1);
        assert!(port.commands().is_empty());
    }

    #[test]
    fn advance_to_next_at_end_stops_and_resets() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.add_media(entry("/m/b.mkv", "B"));
        orchestrator.play_at(1);

        assert!(!orchestrator.advance_to_next());
        assert_eq!(orchestrator.current_index(), None);
        assert_eq!(port.commands_matching("stop").len(), 1);
    }

    #[test]
    fn advance_to_next_plays_following_entry() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.add_media(entry("/m/b.mkv", "B"));
        orchestrator.play();

        assert!(orchestrator.advance_to_next());
        assert_eq!(orchestrator.current_index(), Some(1));
        assert_eq!(
            port.commands_matching("play_file").last().unwrap(),
            "play_file:/m/b.mkv"
        );
    }

    #[test]
    fn auto_advance_wraps_and_updates_now_next() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry_with_end("/m/a.mkv", "A", 30));
        orchestrator.add_media(entry_with_end("/m/b.mkv", "B", 40));
        orchestrator.play();
        let (now, next, ..) = sink.snapshot();
        assert_eq!((now.as_str(), next.as_str()), ("A", "B"));

        // Reported position reaches A's end offset
        port.push_status(playing_status("a.mkv", 30, 7200));
        run_tick(orchestrator.shared());

        assert_eq!(orchestrator.current_index(), Some(1));
        assert_eq!(
            port.commands_matching("play_file").last().unwrap(),
            "play_file:/m/b.mkv"
        );
        let (now, next, ..) = sink.snapshot();
        assert_eq!((now.as_str(), next.as_str()), ("B", "A"));
    }

    #[test]
    fn auto_advance_loops_single_entry() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry_with_end("/m/a.mkv", "A", 30));
        orchestrator.play();

        port.push_status(playing_status("a.mkv", 31, 7200));
        run_tick(orchestrator.shared());

        assert_eq!(orchestrator.current_index(), Some(0));
        assert_eq!(port.commands_matching("play_file").len(), 2);
    }

    #[test]
    fn auto_advance_on_duration_margin() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.add_media(entry("/m/b.mkv", "B"));
        orchestrator.play();

        // No explicit end; 100s duration advances at 90s
        port.push_status(playing_status("a.mkv", 90, 100));
        run_tick(orchestrator.shared());

        assert_eq!(orchestrator.current_index(), Some(1));
    }

    #[test]
    fn seek_jump_updates_time_sink_once() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.play();

        port.push_status(playing_status("a.mkv", 10, 1000));
        run_tick(orchestrator.shared());
        let writes_before = sink.times_writes().len();

        port.push_status(playing_status("a.mkv", 40, 1000));
        run_tick(orchestrator.shared());

        let writes = sink.times_writes();
        assert_eq!(writes.len(), writes_before + 1);
        assert_eq!(*writes.last().unwrap(), (40, 1000));
    }

    #[test]
    fn steady_progress_does_not_rewrite_times() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.play();

        port.push_status(playing_status("a.mkv", 10, 1000));
        run_tick(orchestrator.shared());
        let writes_before = sink.times_writes().len();

        port.push_status(playing_status("a.mkv", 11, 1000));
        run_tick(orchestrator.shared());
        assert_eq!(sink.times_writes().len(), writes_before);
    }

    #[test]
    fn poll_failure_enters_searching_and_recreates_port() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        assert_eq!(port.connection_count(), 1);

        port.push_failure("connection refused");
        run_tick(orchestrator.shared());

        assert_eq!(orchestrator.current_state().phase, PlaybackPhase::Searching);
        assert_eq!(port.connection_count(), 2);
        let (.., time_now, time_next) = sink.snapshot();
        assert_eq!(time_now, "stop");
        assert_eq!(time_next, "stop");

        // The next successful poll leaves Searching
        port.push_status(playing_status("a.mkv", 3, 100));
        run_tick(orchestrator.shared());
        assert_eq!(orchestrator.current_state().phase, PlaybackPhase::Playing);
    }

    #[test]
    fn reconcile_synthesizes_placeholder_for_unknown_file() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));

        port.push_status(playing_status("external.mkv", 5, 100));
        run_tick(orchestrator.shared());

        let state = orchestrator.current_state();
        let media = state.current_media.unwrap();
        assert_eq!(media.path, "external.mkv");
        assert_eq!(media.title, "external.mkv");
    }

    #[test]
    fn reconcile_matches_playlist_entry_by_basename() {
        let (orchestrator, port, _sink) = orchestrator();
        orchestrator.add_media(entry("/media/long/path/Movie (2019).mkv", "Movie (2019)"));

        port.push_status(playing_status("movie (2019).MKV", 5, 100));
        run_tick(orchestrator.shared());

        let state = orchestrator.current_state();
        assert_eq!(state.current_media.unwrap().title, "Movie (2019)");
    }

    #[test]
    fn pause_while_playing_writes_marker() {
        let (orchestrator, port, sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.play();

        port.push_status(playing_status("a.mkv", 10, 100));
        orchestrator.pause();

        assert_eq!(port.commands_matching("pause_toggle").len(), 1);
        assert_eq!(orchestrator.current_state().phase, PlaybackPhase::Paused);
        let (.., time_now, time_next) = sink.snapshot();
        assert_eq!(time_now, "pause");
        assert_eq!(time_next, "pause");
    }

    #[test]
    fn pause_while_paused_resumes_and_persists_position() {
        let (orchestrator, port, sink) = orchestrator();
        let mut a = entry("/m/a.mkv", "A");
        a.start_secs = 10;
        a.end_secs = 110;
        orchestrator.add_media(a);
        orchestrator.play_at(0);

        let mut paused = playing_status("a.mkv", 45, 200);
        paused.state_raw = "paused".to_string();
        port.push_status(paused);
        orchestrator.pause();

        assert_eq!(orchestrator.current_state().phase, PlaybackPhase::Playing);
        let (.., time_now, time_next) = sink.snapshot();
        // Relative position 45-10=35 of a 100s segment, 65 remaining
        assert_eq!(time_now, "35");
        assert_eq!(time_next, "65");
    }

    #[test]
    fn move_operations_notify_and_return_new_index() {
        let (orchestrator, _port, _sink) = orchestrator();
        orchestrator.add_media(entry("/m/a.mkv", "A"));
        orchestrator.add_media(entry("/m/b.mkv", "B"));

        assert_eq!(orchestrator.move_down(0), 1);
        assert_eq!(orchestrator.move_up(1), 0);
        // Boundary and invalid moves return the input unchanged
        assert_eq!(orchestrator.move_up(0), 0);
        assert_eq!(orchestrator.move_down(1), 1);
        assert_eq!(orchestrator.move_down(9), 9);
    }

    #[test]
    fn polling_start_is_guarded_and_stop_reenables() {
        let (orchestrator, port, _sink) = orchestrator();
        port.set_fallback(playing_status("a.mkv", 0, 100));

        orchestrator.start_polling();
        // Second start is rejected by the idempotent guard
        orchestrator.start_polling();
        orchestrator.stop_polling();

        // After cancellation a new poller may start again
        orchestrator.start_polling();
        orchestrator.stop_polling();
    }
}
