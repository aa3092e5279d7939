//! HTTP API handlers

pub mod analyze;
pub mod auth;
pub mod composers;
pub mod health;
pub mod liked;
pub mod player;
pub mod queue;
pub mod settings;
pub mod tracks;
pub mod ui;
pub mod works;

pub use health::health_routes;
