//! Database operations for the Opus catalog

pub mod composers;
pub mod match_queue;
pub mod movements;
pub mod recordings;
pub mod settings;
pub mod track_movements;
pub mod tracks;
pub mod users;
pub mod works;
