//! Now/next status output for overlays and external tools.
//!
//! The sink is deliberately infallible from the orchestrator's point of
//! view: every write failure is logged and swallowed so playback control
//! never depends on the overlay files being writable.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::model::MediaEntry;

/// Sentinel written to the time files while playback is paused.
pub const PAUSE_MARKER: &str = "pause";
/// Sentinel written to the time files when playback stops or the player
/// connection is lost.
pub const STOP_MARKER: &str = "stop";

/// External status output consumed by overlay tooling.
pub trait StatusSink: Send + Sync {
    /// Writes the "Now Playing" title.
    fn write_now(&self, text: &str);

    /// Writes the "Next Up" title.
    fn write_next(&self, text: &str);

    /// Writes the elapsed segment time and the remaining segment time.
    fn write_times(&self, current_secs: u64, total_secs: u64);

    fn write_pause_marker(&self);

    fn write_stop_marker(&self);

    /// Clears the now/next title outputs.
    fn clear(&self);
}

impl<T: StatusSink + ?Sized> StatusSink for std::sync::Arc<T> {
    fn write_now(&self, text: &str) {
        (**self).write_now(text)
    }

    fn write_next(&self, text: &str) {
        (**self).write_next(text)
    }

    fn write_times(&self, current_secs: u64, total_secs: u64) {
        (**self).write_times(current_secs, total_secs)
    }

    fn write_pause_marker(&self) {
        (**self).write_pause_marker()
    }

    fn write_stop_marker(&self) {
        (**self).write_stop_marker()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

impl<T: StatusSink + ?Sized> StatusSink for Box<T> {
    fn write_now(&self, text: &str) {
        (**self).write_now(text)
    }

    fn write_next(&self, text: &str) {
        (**self).write_next(text)
    }

    fn write_times(&self, current_secs: u64, total_secs: u64) {
        (**self).write_times(current_secs, total_secs)
    }

    fn write_pause_marker(&self) {
        (**self).write_pause_marker()
    }

    fn write_stop_marker(&self) {
        (**self).write_stop_marker()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// Writes both titles in one call, with the fallbacks overlay consumers
/// expect for empty slots.
pub fn write_now_and_next(sink: &dyn StatusSink, now: Option<&MediaEntry>, next: Option<&MediaEntry>) {
    let now_text = display_text(now, "No media playing");
    let next_text = display_text(next, "No next media");
    debug!(now = %now_text, next = %next_text, "Writing now/next status");
    sink.write_now(&now_text);
    sink.write_next(&next_text);
}

fn display_text(entry: Option<&MediaEntry>, fallback: &str) -> String {
    match entry {
        Some(entry) if !entry.title.trim().is_empty() => entry.title.clone(),
        _ => fallback.to_string(),
    }
}

/// File-backed sink writing four text files: now/next titles and the
/// current/remaining time counters.
pub struct FileStatusSink {
    now_file: PathBuf,
    next_file: PathBuf,
    time_now_file: PathBuf,
    time_next_file: PathBuf,
}

impl FileStatusSink {
    pub fn new(
        now_file: impl Into<PathBuf>,
        next_file: impl Into<PathBuf>,
        time_now_file: impl Into<PathBuf>,
        time_next_file: impl Into<PathBuf>,
    ) -> Self {
        let sink = Self {
            now_file: now_file.into(),
            next_file: next_file.into(),
            time_now_file: time_now_file.into(),
            time_next_file: time_next_file.into(),
        };

        for file in [
            &sink.now_file,
            &sink.next_file,
            &sink.time_now_file,
            &sink.time_next_file,
        ] {
            ensure_parent_dir(file);
        }
        info!(
            now = %sink.now_file.display(),
            next = %sink.next_file.display(),
            "Verified status file directories"
        );

        sink
    }

    pub fn from_config(config: &deckconfig::Config) -> Self {
        Self::new(
            config.get_now_playing_file(),
            config.get_next_up_file(),
            config.get_time_now_playing_file(),
            config.get_time_next_up_file(),
        )
    }
}

fn ensure_parent_dir(file: &Path) {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = fs::create_dir_all(parent) {
                error!(directory = %parent.display(), error = %err, "Error creating status file directory");
            }
        }
    }
}

fn write_file(path: &Path, text: &str) {
    if let Err(err) = fs::write(path, text) {
        error!(file = %path.display(), error = %err, "Error writing status file");
    }
}

impl StatusSink for FileStatusSink {
    fn write_now(&self, text: &str) {
        write_file(&self.now_file, text);
        info!(text = %text, "Updated NowPlaying");
    }

    fn write_next(&self, text: &str) {
        write_file(&self.next_file, text);
        info!(text = %text, "Updated NextUp");
    }

    fn write_times(&self, current_secs: u64, total_secs: u64) {
        let remaining = total_secs.saturating_sub(current_secs);
        write_file(&self.time_now_file, &current_secs.to_string());
        write_file(&self.time_next_file, &remaining.to_string());
    }

    fn write_pause_marker(&self) {
        write_file(&self.time_now_file, PAUSE_MARKER);
        write_file(&self.time_next_file, PAUSE_MARKER);
        info!("Wrote pause marker to time files");
    }

    fn write_stop_marker(&self) {
        write_file(&self.time_now_file, STOP_MARKER);
        write_file(&self.time_next_file, STOP_MARKER);
        info!("Wrote stop marker to time files");
    }

    fn clear(&self) {
        write_file(&self.now_file, "");
        write_file(&self.next_file, "");
        info!("Cleared NowPlaying and NextUp files");
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory sink recording writes for tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub now: Mutex<String>,
        pub next: Mutex<String>,
        pub time_now: Mutex<String>,
        pub time_next: Mutex<String>,
        /// Every `write_times` call, in order.
        pub times_log: Mutex<Vec<(u64, u64)>>,
    }

    impl MemorySink {
        pub fn snapshot(&self) -> (String, String, String, String) {
            (
                self.now.lock().unwrap().clone(),
                self.next.lock().unwrap().clone(),
                self.time_now.lock().unwrap().clone(),
                self.time_next.lock().unwrap().clone(),
            )
        }

        pub fn times_writes(&self) -> Vec<(u64, u64)> {
            self.times_log.lock().unwrap().clone()
        }
    }

    impl StatusSink for MemorySink {
        fn write_now(&self, text: &str) {
            *self.now.lock().unwrap() = text.to_string();
        }

        fn write_next(&self, text: &str) {
            *self.next.lock().unwrap() = text.to_string();
        }

        fn write_times(&self, current_secs: u64, total_secs: u64) {
            let remaining = total_secs.saturating_sub(current_secs);
            *self.time_now.lock().unwrap() = current_secs.to_string();
            *self.time_next.lock().unwrap() = remaining.to_string();
            self.times_log.lock().unwrap().push((current_secs, total_secs));
        }

        fn write_pause_marker(&self) {
            *self.time_now.lock().unwrap() = PAUSE_MARKER.to_string();
            *self.time_next.lock().unwrap() = PAUSE_MARKER.to_string();
        }

        fn write_stop_marker(&self) {
            *self.time_now.lock().unwrap() = STOP_MARKER.to_string();
            *self.time_next.lock().unwrap() = STOP_MARKER.to_string();
        }

        fn clear(&self) {
            self.now.lock().unwrap().clear();
            self.next.lock().unwrap().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sink_in(dir: &TempDir) -> (FileStatusSink, PathBuf, PathBuf, PathBuf, PathBuf) {
        let now = dir.path().join("overlay/NowPlaying.txt");
        let next = dir.path().join("overlay/NextUp.txt");
        let time_now = dir.path().join("overlay/TimeNowPlaying.txt");
        let time_next = dir.path().join("overlay/TimeNextUp.txt");
        let sink = FileStatusSink::new(&now, &next, &time_now, &time_next);
        (sink, now, next, time_now, time_next)
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let (_sink, now, ..) = sink_in(&dir);
        assert!(now.parent().unwrap().is_dir());
    }

    #[test]
    fn writes_titles_and_fallbacks() {
        let dir = TempDir::new().unwrap();
        let (sink, now, next, ..) = sink_in(&dir);

        let entry = MediaEntry::new("/m/a.mkv", "Feature (2019)");
        write_now_and_next(&sink, Some(&entry), None);
        assert_eq!(read(&now), "Feature (2019)");
        assert_eq!(read(&next), "No next media");

        write_now_and_next(&sink, None, None);
        assert_eq!(read(&now), "No media playing");
    }

    #[test]
    fn times_write_current_and_remaining() {
        let dir = TempDir::new().unwrap();
        let (sink, _, _, time_now, time_next) = sink_in(&dir);

        sink.write_times(30, 100);
        assert_eq!(read(&time_now), "30");
        assert_eq!(read(&time_next), "70");

        // Remaining never goes negative
        sink.write_times(120, 100);
        assert_eq!(read(&time_next), "0");
    }

    #[test]
    fn markers_and_clear() {
        let dir = TempDir::new().unwrap();
        let (sink, now, next, time_now, time_next) = sink_in(&dir);

        sink.write_pause_marker();
        assert_eq!(read(&time_now), "pause");
        assert_eq!(read(&time_next), "pause");

        sink.write_stop_marker();
        assert_eq!(read(&time_now), "stop");

        sink.write_now("something");
        sink.write_next("else");
        sink.clear();
        assert_eq!(read(&now), "");
        assert_eq!(read(&next), "");
    }
}
