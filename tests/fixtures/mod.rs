//! Test Fixtures Module
//!
//! Shared fixtures for the voice session integration tests:
//! - Audio fixtures (programmatically generated microphone frames)
//! - Scripted audio devices standing in for cpal

// Not every test uses every fixture
#![allow(dead_code)]

pub mod audio_fixtures;
pub mod devices;

pub use audio_fixtures::*;
pub use devices::*;
