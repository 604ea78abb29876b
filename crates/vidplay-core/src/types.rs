//! Core types for Vidplay

use chrono::NaiveDateTime;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Identifier assigned to a video by the registry
pub type VideoId = u64;

/// Rendition key for the untouched upload
pub const ORIGINAL_QUALITY: &str = "original";

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry record for one uploaded video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub id: VideoId,
    pub title: String,
    /// Name of the file as uploaded
    pub file_name: String,
    /// Storage path of the original upload
    #[serde(default)]
    pub file_path: Option<String>,
    /// Size of the original upload in bytes
    pub file_size: u64,
    /// MIME type of the original upload
    pub content_type: String,
    pub upload_time: NaiveDateTime,
    #[serde(default, rename = "filePath720p")]
    pub file_path_720p: Option<String>,
    #[serde(default, rename = "filePath1080p")]
    pub file_path_1080p: Option<String>,
}

impl VideoMetadata {
    /// Encoded variants present for this video, lowest first
    pub fn encoded_variants(&self) -> Vec<&'static str> {
        let mut variants = Vec::new();
        if self.file_path_720p.is_some() {
            variants.push("720p");
        }
        if self.file_path_1080p.is_some() {
            variants.push("1080p");
        }
        variants
    }
}

/// Insertion-ordered mapping of rendition key to stream location.
///
/// The registry sends this as a JSON object; key order is preserved so that
/// "first available rendition" is well defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableQualities {
    entries: Vec<(String, String)>,
}

impl AvailableQualities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rendition. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, location: impl Into<String>) {
        let key = key.into();
        let location = location.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = location,
            None => self.entries.push((key, location)),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, location: impl Into<String>) -> Self {
        self.insert(key, location);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendition keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pick the rendition to start with: `preferred` when present, otherwise
    /// the first entry.
    pub fn default_key(&self, preferred: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == preferred)
            .or_else(|| self.entries.first())
            .map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, String)> for AvailableQualities {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut qualities = Self::new();
        for (k, v) in iter {
            qualities.insert(k, v);
        }
        qualities
    }
}

impl Serialize for AvailableQualities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AvailableQualities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QualitiesVisitor;

        impl<'de> Visitor<'de> for QualitiesVisitor {
            type Value = AvailableQualities;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rendition keys to stream locations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut qualities = AvailableQualities::new();
                while let Some((key, location)) = access.next_entry::<String, String>()? {
                    qualities.insert(key, location);
                }
                Ok(qualities)
            }
        }

        deserializer.deserialize_map(QualitiesVisitor)
    }
}

/// Video record plus the renditions it can be streamed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video: VideoMetadata,
    pub available_qualities: AvailableQualities,
}

/// Elapsed time and play/pause flag captured from the media element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    /// Elapsed playback time in seconds
    pub position: f64,
    pub paused: bool,
}

/// Controller state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No video open
    Idle,
    /// Resolver call in flight
    LoadingDetails,
    /// A rendition is selected and its stream is installed
    Ready,
    /// Handoff to another rendition in progress
    SwitchingRendition,
    /// Rendition resolution failed
    Failed,
}

impl PlaybackPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        matches!(
            (self, target),
            // Open (or re-open) always restarts resolution
            (_, LoadingDetails) |
            (LoadingDetails, Ready) | (LoadingDetails, Failed) |
            (Ready, SwitchingRendition) |
            (SwitchingRendition, Ready) |
            // Close
            (LoadingDetails, Idle) | (Ready, Idle) | (SwitchingRendition, Idle) | (Failed, Idle)
        )
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::LoadingDetails => write!(f, "loading"),
            PlaybackPhase::Ready => write!(f, "ready"),
            PlaybackPhase::SwitchingRendition => write!(f, "switching"),
            PlaybackPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a UI needs to render a playable video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyView {
    pub session_id: SessionId,
    pub video: VideoMetadata,
    /// Active rendition key
    pub quality: String,
    /// Absolute URL of the active rendition
    pub stream_url: Url,
    /// Selectable rendition keys, in registry order
    pub qualities: Vec<String>,
    /// Transport state captured by the most recent handoff
    pub last_handoff: Option<TransportSnapshot>,
}

/// Observable controller state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    LoadingDetails {
        video_id: VideoId,
    },
    Ready(ReadyView),
    SwitchingRendition {
        view: ReadyView,
        target: String,
    },
    Failed {
        video_id: VideoId,
        message: String,
    },
}

impl ControllerState {
    pub fn phase(&self) -> PlaybackPhase {
        match self {
            ControllerState::Idle => PlaybackPhase::Idle,
            ControllerState::LoadingDetails { .. } => PlaybackPhase::LoadingDetails,
            ControllerState::Ready(_) => PlaybackPhase::Ready,
            ControllerState::SwitchingRendition { .. } => PlaybackPhase::SwitchingRendition,
            ControllerState::Failed { .. } => PlaybackPhase::Failed,
        }
    }

    /// The ready view, if a rendition is installed
    pub fn ready(&self) -> Option<&ReadyView> {
        match self {
            ControllerState::Ready(view) => Some(view),
            _ => None,
        }
    }

    /// Active stream URL, also while a switch is in flight
    pub fn stream_url(&self) -> Option<&Url> {
        match self {
            ControllerState::Ready(view) | ControllerState::SwitchingRendition { view, .. } => {
                Some(&view.stream_url)
            }
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ControllerState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}
