//! Event types for the Opus event system
//!
//! Events are broadcast via EventBus and serialized for SSE transmission
//! to connected browser pages.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Opus event types
///
/// Every event carries a UTC timestamp so SSE consumers can order events
/// and compute elapsed time against their own clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OpusEvent {
    /// Playback snapshot changed (position/duration/paused), reported by
    /// the browser page hosting the Web Playback SDK.
    ///
    /// Triggers:
    /// - SSE: progress bars on other connected pages
    PlayerStateChanged {
        /// Spotify track id currently loaded, if any
        track_id: Option<String>,
        /// Snapshot position (milliseconds)
        position_ms: u64,
        /// Track duration (milliseconds)
        duration_ms: u64,
        /// Whether playback is paused
        paused: bool,
        /// When the snapshot was taken
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was linked to a movement by the save workflow.
    ///
    /// Triggers:
    /// - SSE: admin queue page removes the track from its pending list
    TrackClassified {
        /// Spotify track id that was classified
        track_id: String,
        /// Work the track now belongs to
        work_id: String,
        /// Movement the track was linked to
        movement_id: String,
        /// When the link was written
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The match queue changed (enqueue or status update).
    MatchQueueChanged {
        /// Number of tracks currently pending
        pending: i64,
        /// When the change happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The liked-songs snapshot was refreshed from the Spotify Web API.
    LikedSongsRefreshed {
        /// Number of liked tracks in the refreshed snapshot
        count: usize,
        /// When the refresh completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for OpusEvent
///
/// Thin wrapper over `tokio::sync::broadcast`. Subscribers receive events
/// emitted after they subscribe; slow subscribers lose oldest events when
/// the channel fills.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OpusEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<OpusEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    pub fn emit(
        &self,
        event: OpusEvent,
    ) -> Result<usize, broadcast::error::SendError<OpusEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for UI-refresh events where a missed event only costs a page
    /// reload.
    pub fn emit_lossy(&self, event: OpusEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_delivered_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(OpusEvent::LikedSongsRefreshed {
            count: 3,
            timestamp: chrono::Utc::now(),
        });

        match rx.recv().await.unwrap() {
            OpusEvent::LikedSongsRefreshed { count, .. } => assert_eq!(count, 3),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_lossy() {
        let bus = EventBus::new(4);
        // No subscribers: emit() errors, emit_lossy() does not panic
        assert!(bus
            .emit(OpusEvent::MatchQueueChanged {
                pending: 0,
                timestamp: chrono::Utc::now(),
            })
            .is_err());
        bus.emit_lossy(OpusEvent::MatchQueueChanged {
            pending: 0,
            timestamp: chrono::Utc::now(),
        });
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OpusEvent::PlayerStateChanged {
            track_id: Some("4uLU6hMCjMI75M1A2tKUQC".to_string()),
            position_ms: 42_000,
            duration_ms: 180_000,
            paused: false,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PlayerStateChanged");
        assert_eq!(json["position_ms"], 42_000);
    }
}
