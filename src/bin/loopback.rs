//! Loopback Demonstration
//!
//! Wires the device-side activities straight into a host session in one
//! process: synthetic camera and microphone in, assembled frames and audio
//! packets out. Useful for watching the pipeline without a radio.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ble_camera_streamer::{
    capture::{AudioSource, CaptureError, ImageSource, NullMonitor},
    config::Resolution,
    constants::{AUDIO_SAMPLE_RATE, LINK_PAYLOAD_SIZE},
    device::{AudioStreamer, FrameStreamer, StreamController},
    error::LinkError,
    host::HostSession,
    transport::{Endpoint, Transport},
};

/// Transport forwarding notifications to the host thread over a channel
struct LoopbackTransport {
    tx: Sender<(Endpoint, Vec<u8>)>,
    connected: AtomicBool,
}

impl LoopbackTransport {
    fn new(tx: Sender<(Endpoint, Vec<u8>)>) -> Self {
        Self {
            tx,
            connected: AtomicBool::new(true),
        }
    }
}

impl Transport for LoopbackTransport {
    fn max_payload(&self) -> usize {
        LINK_PAYLOAD_SIZE
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn notify(&self, endpoint: Endpoint, payload: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.tx
            .try_send((endpoint, payload.to_vec()))
            .map_err(|e| match e {
                TrySendError::Full(_) => LinkError::NotifyFailed("link queue full".into()),
                TrySendError::Disconnected(_) => LinkError::NotConnected,
            })
    }
}

/// Camera double producing pseudo-JPEG buffers sized by the applied settings
struct SyntheticCamera {
    quality: u8,
    resolution: Resolution,
    captures: u32,
}

impl SyntheticCamera {
    fn new() -> Self {
        Self {
            quality: 25,
            resolution: Resolution::Qvga,
            captures: 0,
        }
    }
}

impl ImageSource for SyntheticCamera {
    fn acquire_frame(&mut self) -> Result<Bytes, CaptureError> {
        self.captures += 1;
        let (width, height) = self.resolution.dimensions();
        // Rough JPEG size model: more pixels and lower quality numbers
        // mean bigger buffers
        let len = (width * height / (8 * u32::from(self.quality))).max(64) as usize;
        let seed = self.captures;
        let data: Vec<u8> = (0..len).map(|i| ((i as u32).wrapping_add(seed) % 251) as u8).collect();
        Ok(Bytes::from(data))
    }

    fn apply_quality(&mut self, quality: u8) -> Result<(), CaptureError> {
        self.quality = quality;
        Ok(())
    }

    fn apply_resolution(&mut self, resolution: Resolution) -> Result<(), CaptureError> {
        self.resolution = resolution;
        Ok(())
    }
}

/// Microphone double producing a 440Hz tone
struct SyntheticMicrophone {
    phase: u64,
}

impl AudioSource for SyntheticMicrophone {
    fn read_pcm_frame(&mut self, n_samples: usize) -> Result<Vec<i16>, CaptureError> {
        let pcm = (0..n_samples)
            .map(|i| {
                let t = (self.phase + i as u64) as f32 / AUDIO_SAMPLE_RATE as f32;
                (6000.0 * (TAU * 440.0 * t).sin()) as i16
            })
            .collect();
        self.phase += n_samples as u64;
        Ok(pcm)
    }
}

/// Drain the link into a host session, logging what the application sees
fn run_host(link_rx: Receiver<(Endpoint, Vec<u8>)>) {
    let (mut session, frame_rx, audio_rx) = HostSession::new();
    let mut audio_packets = 0u64;

    for (endpoint, payload) in link_rx.iter() {
        if let Err(e) = session.handle_notification(endpoint, &payload) {
            tracing::warn!("host rejected a notification: {e}");
        }
        for frame in frame_rx.try_iter() {
            tracing::info!(
                channel = ?frame.channel,
                number = frame.frame_number,
                bytes = frame.data.len(),
                ratio = frame.completion_ratio(),
                "host assembled frame"
            );
        }
        audio_packets += audio_rx.try_iter().count() as u64;
    }

    if let Some(status) = session.last_status() {
        tracing::info!(battery = status.battery, "last device status");
    }
    let stats = session.stats();
    tracing::info!(
        frames = stats.frames_completed,
        chunks = stats.chunks_received,
        audio = audio_packets,
        "host session finished"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting loopback demonstration");

    let (link_tx, link_rx) = bounded(1024);
    let host = std::thread::spawn(move || run_host(link_rx));

    let transport = Arc::new(LoopbackTransport::new(link_tx));
    let controller = StreamController::new(transport, Arc::new(NullMonitor));
    controller.on_connect();

    let frame_task = tokio::spawn(
        FrameStreamer::new(controller.clone(), Box::new(SyntheticCamera::new())).run(),
    );
    let audio_task = tokio::spawn(
        AudioStreamer::new(controller.clone(), Box::new(SyntheticMicrophone { phase: 0 })).run(),
    );

    // Scripted session: stream for a while, grab a high-quality still,
    // add audio, then ask for a status report and wind down
    controller.handle_command("START_FRAMES");
    controller.handle_command("INTERVAL:0.2");
    tokio::time::sleep(Duration::from_secs(2)).await;

    controller.handle_command("CAPTURE");
    controller.handle_command("START_AUDIO");
    tokio::time::sleep(Duration::from_secs(2)).await;

    controller.handle_command("STATUS");
    tokio::time::sleep(Duration::from_millis(200)).await;

    controller.stop();
    frame_task.await?;
    audio_task.await?;

    // Dropping the last transport handle closes the link channel and lets
    // the host thread report its totals
    drop(controller);
    if host.join().is_err() {
        tracing::error!("host thread panicked");
    }

    tracing::info!("Loopback demonstration finished");
    Ok(())
}
