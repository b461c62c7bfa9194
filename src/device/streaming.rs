//! Frame capture and transmission activity
//!
//! One task services both chunked image channels: the continuous frame
//! stream and single-shot captures. Running them on the same task gives
//! natural serialization on the wire, so a single capture never interleaves
//! its records with a streamed frame.

use std::sync::Arc;

use tokio::time::{self, Instant};

use crate::capture::{CaptureError, ImageSource};
use crate::config::{Resolution, SharedConfig};
use crate::constants::{CAPTURE_RETRY_DELAY, CHUNK_PACING, DATA_CHUNK_HEADER_LEN, FRAME_TICK, MAX_CHUNK_PAYLOAD};
use crate::device::StreamController;
use crate::error::{LinkError, Result};
use crate::protocol::ChunkEncoder;
use crate::transport::{Endpoint, Transport};

/// Boosted sensor settings for single-shot captures
const SINGLE_CAPTURE_QUALITY: u8 = 10;
const SINGLE_CAPTURE_RESOLUTION: Resolution = Resolution::Svga;

/// Acquisition attempts before a single capture gives up
const SINGLE_CAPTURE_ATTEMPTS: u32 = 3;

/// Drives the camera and fragments captured frames onto the link
pub struct FrameStreamer {
    controller: Arc<StreamController>,
    config: SharedConfig,
    transport: Arc<dyn Transport>,
    camera: Box<dyn ImageSource>,
    /// Settings last pushed to the sensor; `None` forces a re-sync
    applied: Option<(u8, Resolution)>,
    last_frame_at: Option<Instant>,
    frames_sent: u64,
    captures_completed: u64,
    capture_failures: u64,
    chunks_sent: u64,
    chunks_dropped: u64,
}

impl FrameStreamer {
    pub fn new(controller: Arc<StreamController>, camera: Box<dyn ImageSource>) -> Self {
        let config = controller.config();
        let transport = controller.transport().clone();
        Self {
            controller,
            config,
            transport,
            camera,
            applied: None,
            last_frame_at: None,
            frames_sent: 0,
            captures_completed: 0,
            capture_failures: 0,
            chunks_sent: 0,
            chunks_dropped: 0,
        }
    }

    /// Run the frame activity until the controller stops
    pub async fn run(mut self) {
        tracing::info!("frame activity started");
        while self.controller.is_running() {
            time::sleep(FRAME_TICK).await;
            self.tick().await;
        }
        tracing::info!(
            frames = self.frames_sent,
            captures = self.captures_completed,
            "frame activity stopped"
        );
    }

    /// Service one scheduling tick
    ///
    /// A pending single capture takes priority over the stream; the stream
    /// then resumes at its configured interval.
    pub async fn tick(&mut self) {
        if self.controller.take_capture_request() {
            if let Err(e) = self.capture_single().await {
                tracing::warn!("single capture failed: {e}");
            }
            return;
        }

        let (enabled, interval, quality, resolution) = {
            let config = self.config.read();
            (
                config.frames_enabled(),
                config.frame_interval(),
                config.quality(),
                config.resolution(),
            )
        };
        if !enabled || !self.frame_due(interval) {
            return;
        }
        if let Err(e) = self.stream_frame(quality, resolution).await {
            tracing::warn!("frame transfer failed: {e}");
        }
    }

    fn frame_due(&self, interval: f64) -> bool {
        match self.last_frame_at {
            Some(at) => at.elapsed() >= time::Duration::from_secs_f64(interval),
            None => true,
        }
    }

    /// Push configured sensor settings if they differ from the applied ones
    fn sync_sensor(
        &mut self,
        quality: u8,
        resolution: Resolution,
    ) -> std::result::Result<(), CaptureError> {
        if self.applied == Some((quality, resolution)) {
            return Ok(());
        }
        self.camera.apply_quality(quality)?;
        self.camera.apply_resolution(resolution)?;
        let (width, height) = resolution.dimensions();
        tracing::info!(quality, width, height, "sensor settings applied");
        self.applied = Some((quality, resolution));
        Ok(())
    }

    async fn stream_frame(&mut self, quality: u8, resolution: Resolution) -> Result<()> {
        self.sync_sensor(quality, resolution)?;
        let frame = match self.camera.acquire_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.capture_failures += 1;
                tracing::debug!("frame capture failed: {e}");
                // Short back-off, then let the next tick retry
                time::sleep(CAPTURE_RETRY_DELAY).await;
                return Ok(());
            }
        };
        self.last_frame_at = Some(Instant::now());
        self.transmit(Endpoint::Frame, &frame).await?;
        self.frames_sent += 1;
        if self.frames_sent % 10 == 0 {
            tracing::info!(
                frames = self.frames_sent,
                chunks = self.chunks_sent,
                dropped = self.chunks_dropped,
                "frame stream progress"
            );
        }
        Ok(())
    }

    /// One-shot capture at boosted settings
    ///
    /// The applied-settings cache is invalidated up front, so the stream
    /// re-applies the configured settings on its next frame whether or not
    /// this capture succeeds.
    async fn capture_single(&mut self) -> Result<()> {
        tracing::info!("single capture requested");
        self.applied = None;
        self.camera.apply_quality(SINGLE_CAPTURE_QUALITY)?;
        self.camera.apply_resolution(SINGLE_CAPTURE_RESOLUTION)?;

        let frame = match self.acquire_with_retry().await {
            Ok(frame) => frame,
            Err(e) => {
                self.capture_failures += 1;
                return Err(e.into());
            }
        };
        tracing::info!(bytes = frame.len(), "single capture acquired");
        self.transmit(Endpoint::Image, &frame).await?;
        self.captures_completed += 1;
        Ok(())
    }

    async fn acquire_with_retry(&mut self) -> std::result::Result<bytes::Bytes, CaptureError> {
        let mut attempt = 1;
        loop {
            match self.camera.acquire_frame() {
                Ok(frame) => return Ok(frame),
                Err(e) if attempt < SINGLE_CAPTURE_ATTEMPTS => {
                    tracing::debug!(attempt, "capture attempt failed: {e}");
                    attempt += 1;
                    time::sleep(CAPTURE_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fragment and transmit one buffer on a chunked endpoint
    ///
    /// A rejected start record aborts the transfer: the receiver has no
    /// session to attach later chunks to. Mid-transfer losses only degrade
    /// the completion ratio, so the remaining records still go out. A lost
    /// link is different: the whole transfer is abandoned on the spot.
    async fn transmit(&mut self, endpoint: Endpoint, data: &[u8]) -> Result<()> {
        let chunk_payload = MAX_CHUNK_PAYLOAD
            .min(self.transport.max_payload().saturating_sub(DATA_CHUNK_HEADER_LEN));
        let encoder = ChunkEncoder::new(data, chunk_payload)?;
        let chunk_count = encoder.chunk_count();

        let mut data_dropped = 0u64;
        for (position, record) in encoder.enumerate() {
            let is_data = position >= 1 && position <= chunk_count as usize;
            match self.transport.notify(endpoint, &record) {
                Ok(()) => {
                    if is_data {
                        self.chunks_sent += 1;
                    }
                }
                Err(e) if position == 0 => {
                    tracing::warn!(?endpoint, "start record rejected, aborting transfer: {e}");
                    return Err(e.into());
                }
                Err(LinkError::NotConnected) => {
                    self.chunks_dropped += data_dropped;
                    tracing::warn!(?endpoint, position, "link lost, abandoning transfer");
                    return Err(LinkError::NotConnected.into());
                }
                Err(e) => {
                    if is_data {
                        data_dropped += 1;
                    }
                    tracing::debug!(?endpoint, position, "record dropped: {e}");
                }
            }
            time::sleep(CHUNK_PACING).await;
        }
        self.chunks_dropped += data_dropped;
        tracing::debug!(
            ?endpoint,
            bytes = data.len(),
            chunks = chunk_count,
            dropped = data_dropped,
            "transfer finished"
        );
        Ok(())
    }

    /// Get statistics
    pub fn stats(&self) -> FrameStreamerStats {
        FrameStreamerStats {
            frames_sent: self.frames_sent,
            captures_completed: self.captures_completed,
            capture_failures: self.capture_failures,
            chunks_sent: self.chunks_sent,
            chunks_dropped: self.chunks_dropped,
        }
    }
}

/// Frame activity statistics
#[derive(Debug, Clone)]
pub struct FrameStreamerStats {
    pub frames_sent: u64,
    pub captures_completed: u64,
    pub capture_failures: u64,
    pub chunks_sent: u64,
    pub chunks_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::NullMonitor;
    use crate::device::testing::{MockImageSource, MockTransport};
    use crate::protocol::chunk::{MARKER_END, MARKER_START};
    use crate::protocol::Record;

    fn streamer(source: MockImageSource) -> (FrameStreamer, Arc<StreamController>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::connected());
        let controller = StreamController::new(transport.clone(), Arc::new(NullMonitor));
        let streamer = FrameStreamer::new(controller.clone(), Box::new(source));
        (streamer, controller, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_sent_while_streaming_disabled() {
        let (mut streamer, _controller, transport) = streamer(MockImageSource::with_frame(100));
        for _ in 0..10 {
            streamer.tick().await;
            time::advance(FRAME_TICK).await;
        }
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamed_frame_is_chunked_on_frame_endpoint() {
        let source = MockImageSource::with_frame(1200);
        let (mut streamer, controller, transport) = streamer(source);
        controller.handle_command("START_FRAMES");

        streamer.tick().await;

        let records = transport.payloads(Endpoint::Frame);
        // 1200 bytes at 510 per chunk: start + 3 data + end
        assert_eq!(records.len(), 5);
        assert_eq!(records[0][0], MARKER_START);
        assert_eq!(records[4][0], MARKER_END);
        match Record::parse(&records[1]).unwrap() {
            Record::Data { index, payload } => {
                assert_eq!(index, 0);
                assert_eq!(payload.len(), 510);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(streamer.stats().frames_sent, 1);
        assert_eq!(streamer.stats().chunks_sent, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_interval_is_respected() {
        let source = MockImageSource::with_frame(100);
        let (mut streamer, controller, _transport) = streamer(source);
        controller.handle_command("START_FRAMES");
        controller.handle_command("INTERVAL:0.5");

        // First tick streams immediately; the next 400ms of ticks do not
        streamer.tick().await;
        assert_eq!(streamer.stats().frames_sent, 1);
        for _ in 0..40 {
            time::advance(FRAME_TICK).await;
            streamer.tick().await;
        }
        assert_eq!(streamer.stats().frames_sent, 1);

        // Crossing the interval releases the next frame
        time::advance(time::Duration::from_millis(200)).await;
        streamer.tick().await;
        assert_eq!(streamer.stats().frames_sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_settings_follow_config() {
        let source = MockImageSource::with_frame(100);
        let applied = source.applied();
        let (mut streamer, controller, _transport) = streamer(source);
        controller.handle_command("START_FRAMES");
        controller.handle_command("INTERVAL:0.1");

        streamer.tick().await;
        assert_eq!(*applied.lock(), vec![(25, Resolution::Qvga)]);

        // No re-application while settings are unchanged
        time::advance(time::Duration::from_millis(200)).await;
        streamer.tick().await;
        assert_eq!(applied.lock().len(), 1);

        controller.handle_command("QUALITY:12");
        time::advance(time::Duration::from_millis(200)).await;
        streamer.tick().await;
        assert_eq!(applied.lock().last(), Some(&(12, Resolution::Qvga)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_capture_boosts_then_restores() {
        let source = MockImageSource::with_frame(100);
        let applied = source.applied();
        let (mut streamer, controller, transport) = streamer(source);
        controller.handle_command("START_FRAMES");
        controller.handle_command("INTERVAL:0.1");

        streamer.tick().await; // streamed frame at configured settings
        controller.handle_command("CAPTURE");
        streamer.tick().await; // single capture at boosted settings
        time::advance(time::Duration::from_millis(200)).await;
        streamer.tick().await; // stream resumes at configured settings

        assert_eq!(
            *applied.lock(),
            vec![
                (25, Resolution::Qvga),
                (SINGLE_CAPTURE_QUALITY, SINGLE_CAPTURE_RESOLUTION),
                (25, Resolution::Qvga),
            ]
        );
        assert!(!transport.payloads(Endpoint::Image).is_empty());
        assert_eq!(streamer.stats().captures_completed, 1);
        assert_eq!(streamer.stats().frames_sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_capture_works_with_streaming_off() {
        let (mut streamer, controller, transport) = streamer(MockImageSource::with_frame(600));
        controller.handle_command("CAPTURE");
        streamer.tick().await;

        assert!(transport.payloads(Endpoint::Frame).is_empty());
        let records = transport.payloads(Endpoint::Image);
        assert_eq!(records.len(), 4); // start + 2 data + end
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_failure_recovers_on_next_tick() {
        let mut source = MockImageSource::with_frame(100);
        source.fail_next_acquires(1);
        let (mut streamer, controller, _transport) = streamer(source);
        controller.handle_command("START_FRAMES");

        streamer.tick().await;
        assert_eq!(streamer.stats().frames_sent, 0);
        assert_eq!(streamer.stats().capture_failures, 1);

        time::advance(FRAME_TICK).await;
        streamer.tick().await;
        assert_eq!(streamer.stats().frames_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_capture_retries_acquisition() {
        let mut source = MockImageSource::with_frame(100);
        source.fail_next_acquires(2);
        let (mut streamer, controller, transport) = streamer(source);
        controller.handle_command("CAPTURE");
        streamer.tick().await;

        assert_eq!(streamer.stats().captures_completed, 1);
        assert!(!transport.payloads(Endpoint::Image).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_record_failure_aborts_transfer() {
        let (mut streamer, controller, transport) = streamer(MockImageSource::with_frame(1200));
        transport.fail_call(0); // the transfer's start record
        controller.handle_command("START_FRAMES");
        streamer.tick().await;

        assert!(transport.payloads(Endpoint::Frame).is_empty());
        assert_eq!(streamer.stats().chunks_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_abandons_remaining_records() {
        let (mut streamer, controller, transport) = streamer(MockImageSource::with_frame(1200));
        transport.drop_link_at(2); // link dies at the second data record
        controller.handle_command("START_FRAMES");
        streamer.tick().await;

        // Start plus one data record made it out; nothing after the loss,
        // in particular no end marker
        let records = transport.payloads(Endpoint::Frame);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], MARKER_START);
        assert_ne!(records[1][0], MARKER_END);
        let stats = streamer.stats();
        assert_eq!(stats.chunks_sent, 1);
        assert_eq!(stats.frames_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_data_record_does_not_abort() {
        let (mut streamer, controller, transport) = streamer(MockImageSource::with_frame(1200));
        transport.fail_call(2); // second data record of the transfer
        controller.handle_command("START_FRAMES");
        streamer.tick().await;

        let records = transport.payloads(Endpoint::Frame);
        // start + 2 surviving data records + end
        assert_eq!(records.len(), 4);
        assert_eq!(records.last().map(|r| r[0]), Some(MARKER_END));
        let stats = streamer.stats();
        assert_eq!(stats.chunks_sent, 2);
        assert_eq!(stats.chunks_dropped, 1);
    }
}
