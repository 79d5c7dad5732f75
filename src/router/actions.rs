//! Remote trigger payloads and the action table
//!
//! Notifications name a source (`file`, `user`, `system`) and whether the key
//! became active. A resolver turns that pair into one of four actions.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Where a notification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Playback of a MIDI file
    File,
    /// A key played by a person
    User,
    /// Connection and device notices
    System,
}

/// What the gateway does for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Stop,
    Pressed,
    Released,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Play => "PLAY",
            Action::Stop => "STOP",
            Action::Pressed => "PRESSED",
            Action::Released => "RELEASED",
        };
        f.write_str(label)
    }
}

/// Maps a source and activity flag to an action
pub type ActionResolver = fn(EventSource, bool) -> Option<Action>;

/// Default table: file playback lights keys, user input ripples
pub fn default_actions(source: EventSource, active: bool) -> Option<Action> {
    match (source, active) {
        (EventSource::File, true) => Some(Action::Play),
        (EventSource::File, false) => Some(Action::Stop),
        (EventSource::User, true) => Some(Action::Pressed),
        (EventSource::User, false) => Some(Action::Released),
        (EventSource::System, _) => None,
    }
}

const NOTE_COLORS: [&str; 24] = [
    "red", "#red", "orange", "#orange", "yellow", "green", "#green", "cyan", "#cyan", "blue",
    "#blue", "purple", "red2", "#red2", "orange2", "#orange2", "yellow2", "green2", "#green2",
    "cyan2", "#cyan2", "blue2", "#blue2", "purple2",
];

/// Colour name shown for a key in the logs
pub fn note_color_name(note: u8) -> &'static str {
    NOTE_COLORS[usize::from(note) % NOTE_COLORS.len()]
}

/// Notification body as posted to the HTTP endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEvent {
    pub source: EventSource,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub device_name: Option<String>,
}

/// A validated file/user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTrigger {
    pub source: EventSource,
    pub active: bool,
    pub note: u8,
}

/// Parse a key that may arrive as a number or a numeric string
fn parse_key(value: &Value) -> Option<u8> {
    let key = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u8::try_from(key).ok().filter(|&k| k <= 127)
}

impl RemoteEvent {
    /// Validate the notification
    ///
    /// System notices yield `Ok(None)`; file and user notifications need
    /// `active` and a key in 0-127.
    pub fn into_trigger(self) -> Result<Option<RemoteTrigger>, String> {
        if self.source == EventSource::System {
            return Ok(None);
        }

        let active = self.active.ok_or("missing 'active'")?;
        let key = self.key.as_ref().ok_or("missing 'key'")?;
        let note = parse_key(key).ok_or_else(|| format!("invalid key {} (must be 0-127)", key))?;

        Ok(Some(RemoteTrigger { source: self.source, active, note }))
    }
}
