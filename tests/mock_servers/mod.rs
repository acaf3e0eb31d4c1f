//! Mock servers for integration testing
//!
//! Simulates the player's JSON IPC socket so sessions can be exercised
//! without a real mpv binary.

pub mod mpv;

pub use mpv::MockMpv;
