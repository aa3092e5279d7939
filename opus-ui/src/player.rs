//! Playback state store
//!
//! The browser page hosting the Spotify Web Playback SDK reports the
//! SDK's asynchronous state-change events here. The store keeps one
//! snapshot per user (position, duration, paused, stamped with the
//! injected clock); consumers compute "effective position" as snapshot
//! position plus wall-clock elapsed since the stamp while playing,
//! clamped to the track duration. Snapshot changes go out on the
//! [`EventBus`] for the SSE stream.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use opus_common::{EventBus, OpusEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// One playback snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub track_id: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub paused: bool,
    /// When the snapshot was taken
    pub updated_at: DateTime<Utc>,
}

impl PlayerSnapshot {
    /// Position extrapolated to `now`
    ///
    /// Paused snapshots do not advance; playing snapshots advance by the
    /// elapsed wall-clock time, clamped to the track duration.
    pub fn effective_position(&self, now: DateTime<Utc>) -> u64 {
        let projected = if self.paused {
            self.position_ms
        } else {
            let elapsed_ms = (now - self.updated_at).num_milliseconds().max(0) as u64;
            self.position_ms.saturating_add(elapsed_ms)
        };

        if self.duration_ms > 0 {
            projected.min(self.duration_ms)
        } else {
            projected
        }
    }
}

/// Per-user playback snapshots
pub struct PlayerStateStore {
    clock: Clock,
    event_bus: EventBus,
    snapshots: RwLock<HashMap<String, PlayerSnapshot>>,
}

impl PlayerStateStore {
    pub fn new(clock: Clock, event_bus: EventBus) -> Self {
        Self {
            clock,
            event_bus,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Record a state-change event from the playback SDK
    ///
    /// Stamps the snapshot with the store clock and broadcasts it.
    pub fn update(
        &self,
        user_id: &str,
        track_id: Option<String>,
        position_ms: u64,
        duration_ms: u64,
        paused: bool,
    ) -> PlayerSnapshot {
        let snapshot = PlayerSnapshot {
            track_id,
            position_ms,
            duration_ms,
            paused,
            updated_at: self.clock.now(),
        };

        {
            let mut snapshots = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
            snapshots.insert(user_id.to_string(), snapshot.clone());
        }

        self.event_bus.emit_lossy(OpusEvent::PlayerStateChanged {
            track_id: snapshot.track_id.clone(),
            position_ms: snapshot.position_ms,
            duration_ms: snapshot.duration_ms,
            paused: snapshot.paused,
            timestamp: snapshot.updated_at,
        });

        snapshot
    }

    /// Latest snapshot for a user
    pub fn snapshot(&self, user_id: &str) -> Option<PlayerSnapshot> {
        let snapshots = self.snapshots.read().unwrap_or_else(|e| e.into_inner());
        snapshots.get(user_id).cloned()
    }

    /// Latest snapshot with its effective position at the current clock
    pub fn snapshot_with_position(&self, user_id: &str) -> Option<(PlayerSnapshot, u64)> {
        let snapshot = self.snapshot(user_id)?;
        let position = snapshot.effective_position(self.clock.now());
        Some((snapshot, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::ManualClock;
    use chrono::Duration;

    fn store_with_clock() -> (ManualClock, PlayerStateStore) {
        let manual = ManualClock::starting_at(Utc::now());
        let store = PlayerStateStore::new(manual.clock(), EventBus::new(16));
        (manual, store)
    }

    #[test]
    fn test_playing_snapshot_advances_with_clock() {
        let (manual, store) = store_with_clock();

        store.update("user1", Some("t1".to_string()), 10_000, 180_000, false);

        manual.advance(Duration::seconds(5));
        let (_, position) = store.snapshot_with_position("user1").unwrap();
        assert_eq!(position, 15_000);
    }

    #[test]
    fn test_paused_snapshot_does_not_advance() {
        let (manual, store) = store_with_clock();

        store.update("user1", Some("t1".to_string()), 10_000, 180_000, true);

        manual.advance(Duration::seconds(30));
        let (_, position) = store.snapshot_with_position("user1").unwrap();
        assert_eq!(position, 10_000);
    }

    #[test]
    fn test_effective_position_clamped_to_duration() {
        let (manual, store) = store_with_clock();

        store.update("user1", Some("t1".to_string()), 170_000, 180_000, false);

        manual.advance(Duration::seconds(60));
        let (_, position) = store.snapshot_with_position("user1").unwrap();
        assert_eq!(position, 180_000);
    }

    #[test]
    fn test_update_broadcasts_event() {
        let (_, store) = store_with_clock();
        let mut rx = store.event_bus.subscribe();

        store.update("user1", Some("t1".to_string()), 0, 100_000, false);

        match rx.try_recv().unwrap() {
            OpusEvent::PlayerStateChanged { track_id, paused, .. } => {
                assert_eq!(track_id.as_deref(), Some("t1"));
                assert!(!paused);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
