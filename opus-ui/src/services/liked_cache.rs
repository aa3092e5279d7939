//! Server-side liked-songs cache
//!
//! Caches each user's full liked-songs list keyed by track id with a
//! one-hour freshness window, so page loads do not re-walk the Spotify
//! saved-tracks pages. An explicit cache object with an injected clock,
//! invalidated manually by the refresh endpoint.

use crate::clock::Clock;
use crate::services::spotify::SavedTrackItem;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Freshness window for a cached list
pub const CACHE_TTL_SECS: i64 = 3600;

/// One liked track, flattened for the browser
#[derive(Debug, Clone, Serialize)]
pub struct LikedTrack {
    pub id: String,
    pub name: String,
    pub duration_ms: Option<i64>,
    pub disc_number: Option<i64>,
    pub track_number: Option<i64>,
    /// When the user liked the track (Spotify timestamp)
    pub added_at: String,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub album_image_url: Option<String>,
    pub artists: Vec<LikedTrackArtist>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikedTrackArtist {
    pub id: Option<String>,
    pub name: String,
}

impl From<SavedTrackItem> for LikedTrack {
    fn from(item: SavedTrackItem) -> Self {
        let album = item.track.album;
        Self {
            // Local files were filtered out at fetch time
            id: item.track.id.unwrap_or_default(),
            name: item.track.name,
            duration_ms: item.track.duration_ms,
            disc_number: item.track.disc_number,
            track_number: item.track.track_number,
            added_at: item.added_at,
            album_id: album.as_ref().and_then(|a| a.id.clone()),
            album_name: album.as_ref().map(|a| a.name.clone()),
            album_image_url: album.as_ref().and_then(|a| a.image_url()),
            artists: item
                .track
                .artists
                .into_iter()
                .map(|artist| LikedTrackArtist { id: artist.id, name: artist.name })
                .collect(),
        }
    }
}

struct CachedList {
    fetched_at: DateTime<Utc>,
    tracks: Vec<LikedTrack>,
}

/// Per-user cache of liked-songs lists
pub struct LikedSongsCache {
    ttl: Duration,
    clock: Clock,
    lists: RwLock<HashMap<String, CachedList>>,
}

impl LikedSongsCache {
    pub fn new(clock: Clock) -> Self {
        Self {
            ttl: Duration::seconds(CACHE_TTL_SECS),
            clock,
            lists: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_ttl(clock: Clock, ttl: Duration) -> Self {
        Self { ttl, clock, lists: RwLock::new(HashMap::new()) }
    }

    /// The user's cached list if it is still inside the freshness window
    pub fn get_fresh(&self, user_id: &str) -> Option<Vec<LikedTrack>> {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        let cached = lists.get(user_id)?;
        if self.clock.now() - cached.fetched_at >= self.ttl {
            return None;
        }
        Some(cached.tracks.clone())
    }

    /// When the user's list was last fetched, fresh or not
    pub fn fetched_at(&self, user_id: &str) -> Option<DateTime<Utc>> {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        lists.get(user_id).map(|cached| cached.fetched_at)
    }

    /// One cached track by id, only while the list is fresh
    pub fn get_track(&self, user_id: &str, track_id: &str) -> Option<LikedTrack> {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        let cached = lists.get(user_id)?;
        if self.clock.now() - cached.fetched_at >= self.ttl {
            return None;
        }
        cached.tracks.iter().find(|track| track.id == track_id).cloned()
    }

    /// Replace the user's cached list, stamping it with the clock
    pub fn store(&self, user_id: &str, tracks: Vec<LikedTrack>) {
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        lists.insert(
            user_id.to_string(),
            CachedList { fetched_at: self.clock.now(), tracks },
        );
    }

    /// Drop the user's cached list (forced refresh)
    pub fn invalidate(&self, user_id: &str) {
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        lists.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::ManualClock;

    fn track(id: &str) -> LikedTrack {
        LikedTrack {
            id: id.to_string(),
            name: format!("Track {}", id),
            duration_ms: Some(100_000),
            disc_number: Some(1),
            track_number: Some(1),
            added_at: "2026-01-01T00:00:00Z".to_string(),
            album_id: None,
            album_name: None,
            album_image_url: None,
            artists: Vec::new(),
        }
    }

    #[test]
    fn test_fresh_list_is_returned_until_ttl() {
        let manual = ManualClock::starting_at(Utc::now());
        let cache = LikedSongsCache::with_ttl(manual.clock(), Duration::hours(1));

        cache.store("user1", vec![track("t1"), track("t2")]);
        assert_eq!(cache.get_fresh("user1").unwrap().len(), 2);

        manual.advance(Duration::minutes(59));
        assert!(cache.get_fresh("user1").is_some());
        assert!(cache.get_track("user1", "t2").is_some());

        manual.advance(Duration::minutes(2));
        assert!(cache.get_fresh("user1").is_none());
        assert!(cache.get_track("user1", "t2").is_none());
        // fetched_at still reports the stale fetch time
        assert!(cache.fetched_at("user1").is_some());
    }

    #[test]
    fn test_lists_are_per_user() {
        let manual = ManualClock::starting_at(Utc::now());
        let cache = LikedSongsCache::with_ttl(manual.clock(), Duration::hours(1));

        cache.store("user1", vec![track("t1")]);
        assert!(cache.get_fresh("user2").is_none());
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let manual = ManualClock::starting_at(Utc::now());
        let cache = LikedSongsCache::with_ttl(manual.clock(), Duration::hours(1));

        cache.store("user1", vec![track("t1")]);
        cache.invalidate("user1");
        assert!(cache.get_fresh("user1").is_none());
        assert!(cache.fetched_at("user1").is_none());
    }
}
