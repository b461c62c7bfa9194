//! Shared streaming configuration
//!
//! `StreamConfig` is the only mutable state shared between the command
//! handler and the capture activities. It lives behind one `RwLock`; the
//! command handler is the single writer, the activities read.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::constants::{MAX_FRAME_INTERVAL, MAX_QUALITY, MIN_FRAME_INTERVAL, MIN_QUALITY};

/// Camera resolution selector
///
/// Ordinals are the wire values of the `SIZE:` command and map to fixed
/// sensor frame sizes on the capture collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    R96x96,
    Qqvga,
    Qcif,
    Hqvga,
    R240x240,
    Qvga,
    Cif,
    Hvga,
    Vga,
    Svga,
    Xga,
    Hd,
    Sxga,
    Uxga,
}

impl Resolution {
    /// Look up a resolution by its wire ordinal (0..=13)
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::R96x96),
            1 => Some(Self::Qqvga),
            2 => Some(Self::Qcif),
            3 => Some(Self::Hqvga),
            4 => Some(Self::R240x240),
            5 => Some(Self::Qvga),
            6 => Some(Self::Cif),
            7 => Some(Self::Hvga),
            8 => Some(Self::Vga),
            9 => Some(Self::Svga),
            10 => Some(Self::Xga),
            11 => Some(Self::Hd),
            12 => Some(Self::Sxga),
            13 => Some(Self::Uxga),
            _ => None,
        }
    }

    /// Wire ordinal of this resolution
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::R96x96 => 0,
            Self::Qqvga => 1,
            Self::Qcif => 2,
            Self::Hqvga => 3,
            Self::R240x240 => 4,
            Self::Qvga => 5,
            Self::Cif => 6,
            Self::Hvga => 7,
            Self::Vga => 8,
            Self::Svga => 9,
            Self::Xga => 10,
            Self::Hd => 11,
            Self::Sxga => 12,
            Self::Uxga => 13,
        }
    }

    /// Pixel dimensions (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::R96x96 => (96, 96),
            Self::Qqvga => (160, 120),
            Self::Qcif => (176, 144),
            Self::Hqvga => (240, 176),
            Self::R240x240 => (240, 240),
            Self::Qvga => (320, 240),
            Self::Cif => (400, 296),
            Self::Hvga => (480, 320),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Xga => (1024, 768),
            Self::Hd => (1280, 720),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
        }
    }
}

/// Streaming configuration shared between the command handler and the
/// capture activities
///
/// Fields are always within their clamped ranges after any setter call.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// JPEG quality, 4..=63, lower is higher quality
    quality: u8,
    /// Camera resolution selector
    resolution: Resolution,
    /// Seconds between streamed frames, 0.1..=60.0
    frame_interval: f64,
    /// Continuous frame streaming enabled
    frames_enabled: bool,
    /// Continuous audio streaming enabled
    audio_enabled: bool,
}

impl Default for StreamConfig {
    /// Safe defaults, also applied on link disconnect: streaming disabled,
    /// conservative quality and resolution.
    fn default() -> Self {
        Self {
            quality: 25,
            resolution: Resolution::Qvga,
            frame_interval: 0.5,
            frames_enabled: false,
            audio_enabled: false,
        }
    }
}

impl StreamConfig {
    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn frame_interval(&self) -> f64 {
        self.frame_interval
    }

    pub fn frames_enabled(&self) -> bool {
        self.frames_enabled
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Set JPEG quality, clamped to 4..=63
    pub fn set_quality(&mut self, quality: i64) {
        self.quality = quality.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64) as u8;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    /// Set frame interval in seconds, clamped to 0.1..=60.0
    pub fn set_frame_interval(&mut self, interval: f64) {
        self.frame_interval = interval.clamp(MIN_FRAME_INTERVAL, MAX_FRAME_INTERVAL);
    }

    pub fn set_frames_enabled(&mut self, enabled: bool) {
        self.frames_enabled = enabled;
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
    }
}

/// Thread-safe handle to the shared configuration
pub type SharedConfig = Arc<RwLock<StreamConfig>>;

/// Create a shared configuration with default settings
pub fn shared_config() -> SharedConfig {
    Arc::new(RwLock::new(StreamConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_clamping() {
        let mut config = StreamConfig::default();

        config.set_frame_interval(0.001);
        assert_eq!(config.frame_interval(), 0.1);

        config.set_frame_interval(999.0);
        assert_eq!(config.frame_interval(), 60.0);

        config.set_frame_interval(1.5);
        assert_eq!(config.frame_interval(), 1.5);
    }

    #[test]
    fn test_quality_clamping() {
        let mut config = StreamConfig::default();

        config.set_quality(200);
        assert_eq!(config.quality(), 63);

        config.set_quality(0);
        assert_eq!(config.quality(), 4);

        config.set_quality(12);
        assert_eq!(config.quality(), 12);
    }

    #[test]
    fn test_resolution_ordinals_round_trip() {
        for ordinal in 0..=13 {
            let resolution = Resolution::from_ordinal(ordinal).unwrap();
            assert_eq!(resolution.ordinal() as i64, ordinal);
        }
        assert!(Resolution::from_ordinal(14).is_none());
        assert!(Resolution::from_ordinal(-1).is_none());
    }

    #[test]
    fn test_resolution_dimension_bounds() {
        assert_eq!(Resolution::R96x96.dimensions(), (96, 96));
        assert_eq!(Resolution::Uxga.dimensions(), (1600, 1200));
    }

    #[test]
    fn test_defaults_are_conservative() {
        let config = StreamConfig::default();
        assert!(!config.frames_enabled());
        assert!(!config.audio_enabled());
        assert_eq!(config.quality(), 25);
        assert_eq!(config.resolution(), Resolution::Qvga);
    }
}
