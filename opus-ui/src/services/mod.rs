//! Service-layer components: external API clients, the reconciliation
//! workflow, and the liked-songs cache

pub mod inference;
pub mod liked_cache;
pub mod reconcile;
pub mod spotify;
