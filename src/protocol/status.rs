//! Device status report
//!
//! A flat JSON record sent on the status endpoint, on demand (`STATUS`
//! command) and on connect. Field names are part of the wire contract.

use serde::{Deserialize, Serialize};

use crate::config::StreamConfig;

/// Device → host status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Link connected
    pub ble: bool,
    /// Frame streaming enabled
    pub frames: bool,
    /// Audio streaming enabled
    pub audio: bool,
    /// Frame interval in seconds
    pub interval: f64,
    /// JPEG quality
    pub quality: u8,
    /// Resolution ordinal
    pub size: u8,
    /// Battery estimate in percent
    pub battery: u8,
    /// Free memory in bytes
    pub free_heap: u64,
}

impl StatusReport {
    /// Build a report from the current configuration and health probes
    pub fn from_config(
        config: &StreamConfig,
        connected: bool,
        battery: u8,
        free_heap: u64,
    ) -> Self {
        Self {
            ble: connected,
            frames: config.frames_enabled(),
            audio: config.audio_enabled(),
            interval: config.frame_interval(),
            quality: config.quality(),
            size: config.resolution().ordinal(),
            battery,
            free_heap,
        }
    }
}
