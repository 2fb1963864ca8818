//! Turfrs - app layer for the Turf running game
//!
//! This crate provides:
//! - Configuration (`TurfConfig`)
//! - The remote store trait and its SQLite implementation
//! - HTTP client for reverse geocoding, search and walking routes
//! - Repositories for runs, territory, friends, users and leaderboards
//! - The run controller that owns live run state
//! - UniFFI bindings for iOS/Android (feature `ffi`)

// Re-export all public types from turfcore
pub use turfcore::*;

pub mod clock;
pub use clock::{Clock, SystemClock};

pub mod config;
pub use config::TurfConfig;

pub mod error;
pub use error::{AppError, AppResult};

// Storage abstraction and SQLite backend
pub mod store;
pub use store::{FriendRequest, FriendRequestStatus, RemoteStore};

pub mod persistence;
pub use persistence::SqliteStore;

// HTTP client for geocoding and routing
pub mod http;
pub use http::{GeoClient, Place, Route, RunPlaces};

pub mod repository;

pub mod controller;
pub use controller::{ClaimHandle, RunController};

pub mod locator;
pub use locator::AppServices;

// FFI bindings for mobile platforms
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("turfrs"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}
