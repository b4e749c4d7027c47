//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback crates:
//! - Logging and tracing setup
//! - Host capability configuration
//!
//! ## Overview
//!
//! Hosts build a [`config::CoreConfig`] with their bridge implementations,
//! call [`logging::init_logging`] once, and hand the config to
//! `core_playback::PlaybackEngine::start`.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
