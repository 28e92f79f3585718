//! Player control port: the seam between the orchestrator and the external
//! media player.
//!
//! The orchestrator owns exactly one boxed [`PlayerPort`] at a time and
//! replaces it wholesale (through the [`PortConnector`]) after any I/O
//! failure; no other component issues commands through it directly.
//! [`HttpPlayerPort`] talks to a VLC-style HTTP interface: every command is
//! a GET on `/requests/status.xml`, and the same document carries the full
//! transport status.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, info};
use ureq::Agent;
use xmltree::{Element, XMLNode};

use crate::errors::DeckError;
use crate::model::PlaybackPhase;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 3;

/// Converts a 0-200 volume percent to the player's native unit (0-512).
pub fn percent_to_native(percent: u16) -> u32 {
    (percent.min(200) as f64 * 512.0 / 200.0).round() as u32
}

/// Converts a native volume back to the 0-200 percent scale.
pub fn native_to_percent(native: u32) -> u16 {
    ((native as f64 * 200.0 / 512.0).round() as u64).min(200) as u16
}

/// Parsed snapshot of the player's status document.
#[derive(Clone, Debug)]
pub struct PlayerStatus {
    /// Raw transport state string (`playing`, `paused`, `stopped`, ...).
    pub state_raw: String,
    /// Absolute playback position in seconds.
    pub position_secs: u64,
    /// Total duration of the loaded media in seconds (0 when unknown).
    pub duration_secs: u64,
    /// Volume in the player's native unit.
    pub native_volume: u32,
    /// Basename of the currently loaded file, when reported.
    pub filename: Option<String>,
}

impl PlayerStatus {
    pub fn phase(&self) -> PlaybackPhase {
        PlaybackPhase::from_player_state(&self.state_raw)
    }

    pub fn volume_percent(&self) -> u16 {
        native_to_percent(self.native_volume)
    }
}

/// Command surface of the external player.
pub trait PlayerPort: Send {
    /// Sends a raw named command through the status endpoint.
    fn send_command(&self, command: &str) -> Result<(), DeckError>;

    /// Fetches and parses the current status document.
    fn status(&self) -> Result<PlayerStatus, DeckError>;

    /// Plays a specific media file immediately, replacing current playback.
    fn play_file(&self, path: &str) -> Result<(), DeckError>;

    /// Resumes playback of the loaded media.
    fn resume(&self) -> Result<(), DeckError>;

    /// Toggles between playing and paused.
    fn pause_toggle(&self) -> Result<(), DeckError>;

    fn stop(&self) -> Result<(), DeckError>;

    /// Seeks to an absolute position in seconds.
    fn seek(&self, seconds: u64) -> Result<(), DeckError>;

    /// Sets the volume in the player's native unit.
    fn set_volume(&self, native: u32) -> Result<(), DeckError>;
}

/// Builds fresh [`PlayerPort`] connections for the orchestrator.
///
/// Recreation happens in exactly one place: the poller's failure branch.
pub trait PortConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn PlayerPort>, DeckError>;
}

/// Port implementation for a VLC-style HTTP control interface.
#[derive(Clone)]
pub struct HttpPlayerPort {
    base_url: String,
    auth_header: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for HttpPlayerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPlayerPort")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpPlayerPort {
    pub fn new(host: &str, port: u16, password: Option<&str>) -> Self {
        let base_url = format!("http://{}:{}", host, port);
        info!(endpoint = %base_url, "Initializing player HTTP port");

        // The player expects basic auth with a blank username.
        let auth_header = password
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("Basic {}", BASE64.encode(format!(":{}", p))));
        if auth_header.is_some() {
            info!("Using basic authentication for the player endpoint");
        }

        Self {
            base_url,
            auth_header,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    fn agent(&self) -> Agent {
        build_agent(self.timeout)
    }

    fn get(&self, path_and_query: &str) -> Result<String, DeckError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let mut request = self.agent().get(&url);
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth.as_str());
        }

        let mut response = request
            .call()
            .map_err(|e| DeckError::player_http(format!("GET {} failed: {}", url, e)))?;

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| DeckError::PlayerBody(e.to_string()))
    }
}

impl PlayerPort for HttpPlayerPort {
    fn send_command(&self, command: &str) -> Result<(), DeckError> {
        self.get(&format!("/requests/status.xml?command={}", command))?;
        Ok(())
    }

    fn status(&self) -> Result<PlayerStatus, DeckError> {
        let body = self.get("/requests/status.xml")?;
        parse_status(&body)
    }

    fn play_file(&self, path: &str) -> Result<(), DeckError> {
        debug!(file = %path, "Sending play-file command");
        let encoded = urlencoding::encode(path);
        self.send_command(&format!("in_play&input={}", encoded))
    }

    fn resume(&self) -> Result<(), DeckError> {
        debug!("Sending play command");
        self.send_command("pl_play")
    }

    fn pause_toggle(&self) -> Result<(), DeckError> {
        debug!("Sending pause command");
        self.send_command("pl_pause")
    }

    fn stop(&self) -> Result<(), DeckError> {
        debug!("Sending stop command");
        self.send_command("pl_stop")
    }

    fn seek(&self, seconds: u64) -> Result<(), DeckError> {
        debug!(seconds, "Sending seek command");
        self.send_command(&format!("seek&val={}", seconds))
    }

    fn set_volume(&self, native: u32) -> Result<(), DeckError> {
        self.send_command(&format!("volume&val={}", native))
    }
}

/// Connector producing [`HttpPlayerPort`] instances from fixed settings.
#[derive(Clone, Debug)]
pub struct HttpPortConnector {
    host: String,
    port: u16,
    password: Option<String>,
}

impl HttpPortConnector {
    pub fn new(host: impl Into<String>, port: u16, password: Option<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password,
        }
    }

    /// Reads the player connection settings from the configuration.
    ///
    /// Fails when the required settings are missing or invalid, so feature
    /// initialization aborts once at startup instead of limping along.
    pub fn from_config(config: &deckconfig::Config) -> Result<Self, DeckError> {
        if !config.is_player_config_valid() {
            return Err(DeckError::Config(
                "player host/port missing or invalid".to_string(),
            ));
        }
        Ok(Self::new(
            config.get_player_host(),
            config.get_player_port(),
            config.get_player_password(),
        ))
    }
}

impl PortConnector for HttpPortConnector {
    fn connect(&self) -> Result<Box<dyn PlayerPort>, DeckError> {
        Ok(Box::new(HttpPlayerPort::new(
            &self.host,
            self.port,
            self.password.as_deref(),
        )))
    }
}

fn build_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Parses the player's status document.
///
/// Missing numeric fields default to 0 and a missing state defaults to
/// `stopped`, mirroring how the document degrades when nothing is loaded.
pub fn parse_status(body: &str) -> Result<PlayerStatus, DeckError> {
    let root = Element::parse(body.as_bytes())
        .map_err(|e| DeckError::status_parse(e.to_string()))?;

    let state_raw = child_text(&root, "state").unwrap_or_else(|| "stopped".to_string());
    let position_secs = child_u64(&root, "time");
    let duration_secs = child_u64(&root, "length");
    let native_volume = child_u64(&root, "volume") as u32;
    let filename = meta_filename(&root);

    Ok(PlayerStatus {
        state_raw,
        position_secs,
        duration_secs,
        native_volume,
        filename,
    })
}

fn find_child<'a>(parent: &'a Element, name: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name == name => Some(elem),
        _ => None,
    })
}

fn element_text(elem: &Element) -> Option<String> {
    elem.get_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn child_text(parent: &Element, name: &str) -> Option<String> {
    find_child(parent, name).and_then(element_text)
}

/// Numeric child value; streams may report negative sentinels, clamp to 0.
fn child_u64(parent: &Element, name: &str) -> u64 {
    child_text(parent, name)
        .and_then(|t| t.parse::<i64>().ok())
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

/// Filename of the loaded media, buried under the "meta" info category.
fn meta_filename(root: &Element) -> Option<String> {
    let information = find_child(root, "information")?;
    for node in &information.children {
        let XMLNode::Element(category) = node else {
            continue;
        };
        if category.name != "category"
            || category.attributes.get("name").map(String::as_str) != Some("meta")
        {
            continue;
        }
        for node in &category.children {
            let XMLNode::Element(inner) = node else {
                continue;
            };
            if inner.name == "info"
                && inner.attributes.get("name").map(String::as_str) == Some("filename")
            {
                return element_text(inner);
            }
        }
    }
    None
}


#[cfg(test)]
mod tests {
    use super::*;

    const FULL_STATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root>
  <fullscreen>false</fullscreen>
  <volume>384</volume>
  <length>5400</length>
  <time>37</time>
  <state>playing</state>
  <information>
    <category name="meta">
      <info name="filename">The Feature (2019).mkv</info>
      <info name="title">The Feature</info>
    </category>
    <category name="Stream 0">
      <info name="Codec">H264</info>
    </category>
  </information>
</root>"#;

    #[test]
    fn parse_full_status_document() {
        let status = parse_status(FULL_STATUS).unwrap();
        assert_eq!(status.state_raw, "playing");
        assert_eq!(status.phase(), PlaybackPhase::Playing);
        assert_eq!(status.position_secs, 37);
        assert_eq!(status.duration_secs, 5400);
        assert_eq!(status.native_volume, 384);
        assert_eq!(status.volume_percent(), 150);
        assert_eq!(status.filename.as_deref(), Some("The Feature (2019).mkv"));
    }

    #[test]
    fn parse_degrades_on_missing_fields() {
        let status = parse_status("<root></root>").unwrap();
        assert_eq!(status.state_raw, "stopped");
        assert_eq!(status.phase(), PlaybackPhase::Stopped);
        assert_eq!(status.position_secs, 0);
        assert_eq!(status.duration_secs, 0);
        assert_eq!(status.native_volume, 0);
        assert_eq!(status.filename, None);
    }

    #[test]
    fn parse_clamps_negative_stream_lengths() {
        let status =
            parse_status("<root><state>playing</state><length>-1</length><time>5</time></root>")
                .unwrap();
        assert_eq!(status.duration_secs, 0);
        assert_eq!(status.position_secs, 5);
    }

    #[test]
    fn parse_rejects_non_xml() {
        assert!(parse_status("not xml at all").is_err());
    }

    #[test]
    fn volume_conversion_round_trip() {
        // 150% maps to native 384 and back
        assert_eq!(percent_to_native(150), 384);
        assert_eq!(native_to_percent(384), 150);

        assert_eq!(percent_to_native(0), 0);
        assert_eq!(percent_to_native(100), 256);
        assert_eq!(percent_to_native(200), 512);
        assert_eq!(native_to_percent(512), 200);

        // Out-of-range inputs clamp
        assert_eq!(percent_to_native(250), 512);
        assert_eq!(native_to_percent(1024), 200);
    }
}
