//! Playback events
//!
//! Emitted by the controller at key points so hosts can log, report or
//! react to things that do not show up in the state itself:
//! - Session opened / resolved / failed / closed
//! - Rendition switches and blocked resumes
//! - Ignored or coalesced switch requests

use crate::types::{SessionId, VideoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Playback event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Resolution started for a video
    Opened {
        video_id: VideoId,
    },

    /// Renditions resolved and the default one installed
    DetailsResolved {
        video_id: VideoId,
        quality: String,
        qualities: Vec<String>,
    },

    /// Resolution failed
    ResolveFailed {
        video_id: VideoId,
        code: String,
        message: String,
    },

    /// Handoff to another rendition completed
    QualitySwitched {
        from: String,
        to: String,
        /// Position playback continued from
        position: f64,
        paused: bool,
    },

    /// The runtime refused to resume playback; playback stays paused
    ResumeBlocked {
        reason: String,
    },

    /// A switch named a rendition the video does not have
    InvalidRendition {
        requested: String,
    },

    /// A switch request was superseded before it ran
    SwitchCoalesced {
        skipped: String,
    },

    /// Session discarded
    Closed {
        video_id: VideoId,
    },
}

/// Playback event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackEventRecord {
    /// Session the event belongs to
    pub session_id: Option<SessionId>,
    pub timestamp: DateTime<Utc>,
    /// Sequence number, per controller
    pub sequence: u64,
    #[serde(flatten)]
    pub event: PlaybackEvent,
}

/// Sequenced broadcaster for playback events
pub(crate) struct EventBus {
    tx: broadcast::Sender<PlaybackEventRecord>,
    sequence: u64,
}

impl EventBus {
    pub(crate) fn new(tx: broadcast::Sender<PlaybackEventRecord>) -> Self {
        Self { tx, sequence: 0 }
    }

    pub(crate) fn emit(&mut self, session_id: Option<SessionId>, event: PlaybackEvent) {
        self.sequence += 1;
        let record = PlaybackEventRecord {
            session_id,
            timestamp: Utc::now(),
            sequence: self.sequence,
            event,
        };
        trace!(sequence = record.sequence, event = ?record.event, "Playback event");

        // No subscribers is fine
        let _ = self.tx.send(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let record = PlaybackEventRecord {
            session_id: None,
            timestamp: Utc::now(),
            sequence: 3,
            event: PlaybackEvent::QualitySwitched {
                from: "original".into(),
                to: "720p".into(),
                position: 12.4,
                paused: false,
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "quality_switched");
        assert_eq!(json["to"], "720p");
        assert_eq!(json["sequence"], 3);
    }

    #[tokio::test]
    async fn test_bus_sequences_events() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut bus = EventBus::new(tx);

        bus.emit(None, PlaybackEvent::Opened { video_id: 1 });
        bus.emit(None, PlaybackEvent::Closed { video_id: 1 });

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.event, PlaybackEvent::Closed { video_id: 1 });
    }
}
