//! Ordered playlist with a current-selection cursor.
//!
//! Every mutation re-establishes the index invariant (`current` is `None` or
//! a valid index) atomically with the sequence change, and preserves which
//! logical entry is selected across inserts, removals and reorders.

use tracing::{debug, warn};

use crate::model::MediaEntry;

/// How a removal affected the selection, for the orchestrator to act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalEffect {
    /// The playlist is now empty; the selection was reset.
    Emptied,
    /// The selected entry itself was removed; the selection was clamped to
    /// this index and playback of its new occupant should be triggered.
    CurrentFollows(usize),
    /// The same logical entry remains selected (possibly at a shifted index).
    SelectionKept,
}

#[derive(Clone, Debug, Default)]
pub struct Playlist {
    entries: Vec<MediaEntry>,
    current: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<MediaEntry> {
        self.entries.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&MediaEntry> {
        self.entries.get(self.current?)
    }

    pub fn get(&self, index: usize) -> Option<&MediaEntry> {
        self.entries.get(index)
    }

    /// Sets the selection; out-of-bounds indices reset it.
    pub fn set_current(&mut self, index: Option<usize>) {
        self.current = match index {
            Some(idx) if idx < self.entries.len() => Some(idx),
            _ => None,
        };
    }

    /// Index of the entry with this path (case-insensitive), if present.
    pub fn find_by_path(&self, path: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.path.eq_ignore_ascii_case(path))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.find_by_path(path).is_some()
    }

    /// Entry whose basename matches the filename reported by the player.
    pub fn find_by_basename(&self, filename: &str) -> Option<&MediaEntry> {
        self.entries
            .iter()
            .find(|e| e.basename().eq_ignore_ascii_case(filename))
    }

    /// Appends an entry, rejecting duplicates by path (case-insensitive).
    ///
    /// The first entry added to an empty playlist becomes the selection
    /// (cued, not played). Returns false when the entry was a duplicate.
    pub fn add(&mut self, entry: MediaEntry) -> bool {
        if self.contains_path(&entry.path) {
            return false;
        }
        let was_empty = self.entries.is_empty();
        self.entries.push(entry);
        if was_empty {
            self.current = Some(0);
        }
        true
    }

    /// Removes the entry with this path and reports how the selection was
    /// affected. Returns `None` when the path is not in the playlist.
    pub fn remove_path(&mut self, path: &str) -> Option<(MediaEntry, RemovalEffect)> {
        let removed_index = self.find_by_path(path)?;
        let entry = self.entries.remove(removed_index);

        let effect = if self.entries.is_empty() {
            self.current = None;
            RemovalEffect::Emptied
        } else {
            match self.current {
                Some(current) if current == removed_index => {
                    let clamped = current.min(self.entries.len() - 1);
                    self.current = Some(clamped);
                    RemovalEffect::CurrentFollows(clamped)
                }
                Some(current) if removed_index < current => {
                    // The selected entry shifted down one slot; follow it.
                    self.current = Some(current - 1);
                    RemovalEffect::SelectionKept
                }
                _ => RemovalEffect::SelectionKept,
            }
        };

        Some((entry, effect))
    }

    /// Swaps the entry at `index` with the one above it.
    ///
    /// Returns the moved entry's new index, or the input unchanged when the
    /// move is invalid or already at the boundary. The selection keeps
    /// pointing at the same logical entry.
    pub fn move_up(&mut self, index: usize) -> usize {
        if self.entries.is_empty() {
            warn!("move_up aborted: playlist is empty");
            return index;
        }
        if index == 0 || index >= self.entries.len() {
            warn!(
                index,
                playlist_count = self.entries.len(),
                "move_up aborted: invalid index"
            );
            return index;
        }

        self.entries.swap(index - 1, index);
        match self.current {
            Some(current) if current == index => self.current = Some(index - 1),
            Some(current) if current == index - 1 => self.current = Some(index),
            _ => {}
        }
        debug!(from = index, to = index - 1, "Moved entry up");
        index - 1
    }

    /// Swaps the entry at `index` with the one below it.
    ///
    /// Same contract as [`Playlist::move_up`].
    pub fn move_down(&mut self, index: usize) -> usize {
        if self.entries.is_empty() {
            warn!("move_down aborted: playlist is empty");
            return index;
        }
        if index + 1 >= self.entries.len() {
            warn!(
                index,
                playlist_count = self.entries.len(),
                "move_down aborted: invalid index"
            );
            return index;
        }

        self.entries.swap(index, index + 1);
        match self.current {
            Some(current) if current == index => self.current = Some(index + 1),
            Some(current) if current == index + 1 => self.current = Some(index),
            _ => {}
        }
        debug!(from = index, to = index + 1, "Moved entry down");
        index + 1
    }

    /// Index of the entry that plays after the current one.
    ///
    /// A single-entry playlist is its own successor; longer playlists wrap
    /// around. `None` without a selection.
    pub fn next_index(&self) -> Option<usize> {
        let current = self.current?;
        match self.entries.len() {
            0 => None,
            1 => Some(current),
            len => Some((current + 1) % len),
        }
    }

    pub fn peek_next(&self) -> Option<&MediaEntry> {
        self.entries.get(self.next_index()?)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    /// One-line "index:title" summary for debug logging.
    pub fn order_summary(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}:{}", i, e.title))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
