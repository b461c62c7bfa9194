//! Device stream controller
//!
//! Owns the shared [`StreamConfig`], applies validated operator commands,
//! and handles the link lifecycle. The capture activities
//! ([`super::FrameStreamer`], [`super::AudioStreamer`]) read the config and
//! the capture-request flag; this controller is the only writer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::capture::DeviceMonitor;
use crate::config::{shared_config, SharedConfig, StreamConfig};
use crate::error::Result;
use crate::protocol::{Command, StatusReport};
use crate::transport::{Endpoint, Transport};

/// Command handling and shared state for the device side
pub struct StreamController {
    transport: Arc<dyn Transport>,
    config: SharedConfig,
    monitor: Arc<dyn DeviceMonitor>,
    /// Pending single-shot capture request (CAPTURE command)
    capture_requested: AtomicBool,
    /// Cleared by `stop()` to wind down the capture activities
    running: AtomicBool,
    commands_applied: AtomicU64,
    commands_ignored: AtomicU64,
}

impl StreamController {
    pub fn new(transport: Arc<dyn Transport>, monitor: Arc<dyn DeviceMonitor>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            config: shared_config(),
            monitor,
            capture_requested: AtomicBool::new(false),
            running: AtomicBool::new(true),
            commands_applied: AtomicU64::new(0),
            commands_ignored: AtomicU64::new(0),
        })
    }

    /// Handle to the shared configuration
    pub fn config(&self) -> SharedConfig {
        self.config.clone()
    }

    /// The transport this controller transmits on
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Apply one raw command token from the control endpoint
    ///
    /// Unrecognized tokens are counted and dropped, never an error.
    pub fn handle_command(&self, raw: &str) {
        match Command::parse(raw) {
            Some(command) => {
                tracing::info!(command = raw, "applying command");
                self.commands_applied.fetch_add(1, Ordering::Relaxed);
                self.apply(command);
            }
            None => {
                tracing::debug!(command = raw, "ignoring unrecognized command");
                self.commands_ignored.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn apply(&self, command: Command) {
        match command {
            Command::Capture => {
                self.capture_requested.store(true, Ordering::SeqCst);
            }
            Command::StartFrames => self.config.write().set_frames_enabled(true),
            Command::StopFrames => self.config.write().set_frames_enabled(false),
            Command::StartAudio => self.config.write().set_audio_enabled(true),
            Command::StopAudio => self.config.write().set_audio_enabled(false),
            Command::SetInterval(interval) => {
                let mut config = self.config.write();
                config.set_frame_interval(interval);
                tracing::info!(interval = config.frame_interval(), "frame interval set");
            }
            Command::SetQuality(quality) => {
                let mut config = self.config.write();
                config.set_quality(quality);
                tracing::info!(quality = config.quality(), "image quality set");
            }
            Command::SetResolution(resolution) => {
                let (width, height) = resolution.dimensions();
                self.config.write().set_resolution(resolution);
                tracing::info!(width, height, "resolution set");
            }
            Command::Status => {
                if let Err(e) = self.send_status() {
                    tracing::warn!("failed to send status report: {e}");
                }
            }
        }
    }

    /// Current status snapshot
    pub fn status_report(&self) -> StatusReport {
        let config = self.config.read();
        StatusReport::from_config(
            &config,
            self.transport.is_connected(),
            self.monitor.battery_percent(),
            self.monitor.free_memory(),
        )
    }

    /// Serialize and transmit a status report on the status endpoint
    pub fn send_status(&self) -> Result<()> {
        let report = self.status_report();
        let payload = serde_json::to_vec(&report)?;
        self.transport.notify(Endpoint::Status, &payload)?;
        Ok(())
    }

    /// Called by the transport glue when a peer connects
    pub fn on_connect(&self) {
        tracing::info!("link connected");
        if let Err(e) = self.send_status() {
            tracing::warn!("failed to send initial status: {e}");
        }
    }

    /// Called by the transport glue when the peer disconnects
    ///
    /// Hard cancellation: pending captures are dropped and the configuration
    /// returns to safe defaults (streaming disabled, conservative settings).
    pub fn on_disconnect(&self) {
        tracing::info!("link disconnected, resetting configuration to defaults");
        self.capture_requested.store(false, Ordering::SeqCst);
        *self.config.write() = StreamConfig::default();
    }

    /// Consume a pending single-shot capture request
    pub(crate) fn take_capture_request(&self) -> bool {
        self.capture_requested.swap(false, Ordering::SeqCst)
    }

    /// Request a single-shot capture directly (bypassing the command path)
    pub fn request_capture(&self) {
        self.capture_requested.store(true, Ordering::SeqCst);
    }

    /// Whether the capture activities should keep running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wind down the capture activities at their next tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get command statistics
    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            commands_ignored: self.commands_ignored.load(Ordering::Relaxed),
        }
    }
}

/// Command handling statistics
#[derive(Debug, Clone)]
pub struct ControllerStats {
    pub commands_applied: u64,
    pub commands_ignored: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::NullMonitor;
    use crate::config::Resolution;
    use crate::device::testing::MockTransport;

    fn controller() -> (Arc<StreamController>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::connected());
        let controller = StreamController::new(transport.clone(), Arc::new(NullMonitor));
        (controller, transport)
    }

    #[test]
    fn test_start_stop_commands_flip_flags() {
        let (controller, _) = controller();
        let config = controller.config();

        controller.handle_command("START_FRAMES");
        controller.handle_command("START_AUDIO");
        assert!(config.read().frames_enabled());
        assert!(config.read().audio_enabled());

        controller.handle_command("STOP_FRAMES");
        controller.handle_command("STOP_AUDIO");
        assert!(!config.read().frames_enabled());
        assert!(!config.read().audio_enabled());
    }

    #[test]
    fn test_valued_commands_are_clamped_on_application() {
        let (controller, _) = controller();
        let config = controller.config();

        controller.handle_command("INTERVAL:0.001");
        assert_eq!(config.read().frame_interval(), 0.1);
        controller.handle_command("INTERVAL:999");
        assert_eq!(config.read().frame_interval(), 60.0);
        controller.handle_command("QUALITY:200");
        assert_eq!(config.read().quality(), 63);
        controller.handle_command("QUALITY:0");
        assert_eq!(config.read().quality(), 4);
        controller.handle_command("SIZE:8");
        assert_eq!(config.read().resolution(), Resolution::Vga);
    }

    #[test]
    fn test_unknown_commands_are_counted_not_applied() {
        let (controller, _) = controller();
        controller.handle_command("SELF_DESTRUCT");
        controller.handle_command("QUALITY:abc");

        let stats = controller.stats();
        assert_eq!(stats.commands_applied, 0);
        assert_eq!(stats.commands_ignored, 2);
        assert_eq!(*controller.config().read(), StreamConfig::default());
    }

    #[test]
    fn test_capture_request_is_consumed_once() {
        let (controller, _) = controller();
        controller.handle_command("CAPTURE");
        assert!(controller.take_capture_request());
        assert!(!controller.take_capture_request());
    }

    #[test]
    fn test_status_command_sends_json_report() {
        let (controller, transport) = controller();
        controller.handle_command("START_FRAMES");
        controller.handle_command("STATUS");

        let sent = transport.sent();
        let (endpoint, payload) = sent.last().expect("status notification");
        assert_eq!(*endpoint, Endpoint::Status);
        let report: StatusReport = serde_json::from_slice(payload).unwrap();
        assert!(report.ble);
        assert!(report.frames);
        assert!(!report.audio);
        assert_eq!(report.battery, 50);
    }

    #[test]
    fn test_disconnect_resets_config_to_defaults() {
        let (controller, _) = controller();
        controller.handle_command("START_FRAMES");
        controller.handle_command("START_AUDIO");
        controller.handle_command("QUALITY:63");
        controller.handle_command("INTERVAL:60");
        controller.handle_command("SIZE:13");
        controller.handle_command("CAPTURE");

        controller.on_disconnect();

        assert_eq!(*controller.config().read(), StreamConfig::default());
        assert!(!controller.take_capture_request());
    }

    #[test]
    fn test_connect_pushes_status() {
        let (controller, transport) = controller();
        controller.on_connect();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Endpoint::Status);
    }
}
