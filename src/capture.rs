//! Capture collaborator contracts
//!
//! Camera and microphone bring-up is out of scope; the device activities
//! drive the hardware through these traits. Acquisition calls may block up
//! to a bounded timeout on the implementation side.

use bytes::Bytes;

use crate::config::Resolution;

pub use crate::error::CaptureError;

/// JPEG image source (camera sensor + encoder)
pub trait ImageSource: Send {
    /// Acquire one encoded JPEG buffer at the currently applied settings
    fn acquire_frame(&mut self) -> Result<Bytes, CaptureError>;

    /// Apply a JPEG quality setting (idempotent)
    fn apply_quality(&mut self, quality: u8) -> Result<(), CaptureError>;

    /// Apply a sensor frame size (idempotent)
    fn apply_resolution(&mut self, resolution: Resolution) -> Result<(), CaptureError>;
}

/// Linear PCM source (microphone)
pub trait AudioSource: Send {
    /// Read one frame of 16-bit mono PCM samples
    ///
    /// May return fewer than `n_samples` samples; an empty read is reported
    /// as [`CaptureError::NotAvailable`].
    fn read_pcm_frame(&mut self, n_samples: usize) -> Result<Vec<i16>, CaptureError>;
}

/// System health probes for the status report
pub trait DeviceMonitor: Send + Sync {
    /// Battery estimate in percent
    fn battery_percent(&self) -> u8 {
        50
    }

    /// Free memory in bytes
    fn free_memory(&self) -> u64 {
        0
    }
}

/// Monitor returning the defaults, for hosts without health probes
#[derive(Debug, Default)]
pub struct NullMonitor;

impl DeviceMonitor for NullMonitor {}
