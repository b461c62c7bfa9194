//! Audio capture and transmission activity
//!
//! Reads fixed-size PCM frames from the microphone, runs them through the
//! μ-law encoder and ships surviving packets unfragmented. Packet reads are
//! paced to one per 100ms regardless of whether the frame clears the gate.

use std::sync::Arc;

use tokio::time::{self, Instant};

use crate::audio::{AudioEncoder, EncodeOutcome};
use crate::capture::AudioSource;
use crate::config::SharedConfig;
use crate::constants::{AUDIO_FRAME_SAMPLES, AUDIO_PACKET_INTERVAL, AUDIO_TICK};
use crate::device::StreamController;
use crate::transport::{Endpoint, Transport};

/// Drives the microphone and emits μ-law packets on the audio endpoint
pub struct AudioStreamer {
    controller: Arc<StreamController>,
    config: SharedConfig,
    transport: Arc<dyn Transport>,
    microphone: Box<dyn AudioSource>,
    encoder: AudioEncoder,
    last_read_at: Option<Instant>,
    packets_sent: u64,
    packets_dropped: u64,
    read_failures: u64,
}

impl AudioStreamer {
    pub fn new(controller: Arc<StreamController>, microphone: Box<dyn AudioSource>) -> Self {
        let config = controller.config();
        let transport = controller.transport().clone();
        Self {
            controller,
            config,
            transport,
            microphone,
            encoder: AudioEncoder::new(),
            last_read_at: None,
            packets_sent: 0,
            packets_dropped: 0,
            read_failures: 0,
        }
    }

    /// Run the audio activity until the controller stops
    pub async fn run(mut self) {
        tracing::info!("audio activity started");
        while self.controller.is_running() {
            time::sleep(AUDIO_TICK).await;
            self.tick();
        }
        let encoder_stats = self.encoder.stats();
        tracing::info!(
            packets = self.packets_sent,
            suppressed = encoder_stats.frames_suppressed,
            "audio activity stopped"
        );
    }

    /// Service one scheduling tick
    pub fn tick(&mut self) {
        if !self.config.read().audio_enabled() {
            return;
        }
        let now = Instant::now();
        if let Some(at) = self.last_read_at {
            if now - at < AUDIO_PACKET_INTERVAL {
                return;
            }
        }
        self.last_read_at = Some(now);

        let pcm = match self.microphone.read_pcm_frame(AUDIO_FRAME_SAMPLES) {
            Ok(pcm) => pcm,
            Err(e) => {
                self.read_failures += 1;
                tracing::debug!("microphone read failed: {e}");
                return;
            }
        };
        match self.encoder.encode_frame(&pcm) {
            EncodeOutcome::Encoded(packet) => {
                match self.transport.notify(Endpoint::Audio, &packet) {
                    Ok(()) => self.packets_sent += 1,
                    Err(e) => {
                        self.packets_dropped += 1;
                        tracing::debug!("audio packet dropped: {e}");
                    }
                }
            }
            EncodeOutcome::Suppressed => {}
        }
    }

    /// Get statistics
    pub fn stats(&self) -> AudioStreamerStats {
        let encoder_stats = self.encoder.stats();
        AudioStreamerStats {
            packets_sent: self.packets_sent,
            packets_dropped: self.packets_dropped,
            packets_suppressed: encoder_stats.frames_suppressed,
            read_failures: self.read_failures,
        }
    }
}

/// Audio activity statistics
#[derive(Debug, Clone)]
pub struct AudioStreamerStats {
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub packets_suppressed: u64,
    pub read_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::NullMonitor;
    use crate::device::testing::{MockAudioSource, MockTransport};

    fn streamer(source: MockAudioSource) -> (AudioStreamer, Arc<StreamController>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::connected());
        let controller = StreamController::new(transport.clone(), Arc::new(NullMonitor));
        let streamer = AudioStreamer::new(controller.clone(), Box::new(source));
        (streamer, controller, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_sent_while_audio_disabled() {
        let source = MockAudioSource::tone(2000);
        let reads = source.reads();
        let (mut streamer, _controller, transport) = streamer(source);
        for _ in 0..8 {
            streamer.tick();
            time::advance(AUDIO_TICK).await;
        }
        assert!(transport.sent().is_empty());
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loud_frame_becomes_one_packet() {
        let (mut streamer, controller, transport) = streamer(MockAudioSource::tone(2000));
        controller.handle_command("START_AUDIO");
        streamer.tick();

        let packets = transport.payloads(Endpoint::Audio);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), AUDIO_FRAME_SAMPLES);
        assert_eq!(streamer.stats().packets_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_are_paced_to_packet_interval() {
        let source = MockAudioSource::tone(2000);
        let reads = source.reads();
        let (mut streamer, controller, _transport) = streamer(source);
        controller.handle_command("START_AUDIO");

        // Ten 25ms ticks span 250ms: reads at 0, 100 and 200ms only
        for _ in 0..10 {
            streamer.tick();
            time::advance(AUDIO_TICK).await;
        }
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_reads_but_sends_nothing() {
        let (mut streamer, controller, transport) = streamer(MockAudioSource::tone(0));
        controller.handle_command("START_AUDIO");
        streamer.tick();

        assert!(transport.payloads(Endpoint::Audio).is_empty());
        assert_eq!(streamer.stats().packets_suppressed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_is_counted_and_skipped() {
        let mut source = MockAudioSource::tone(2000);
        source.fail_next_reads(1);
        let (mut streamer, controller, transport) = streamer(source);
        controller.handle_command("START_AUDIO");

        streamer.tick();
        assert_eq!(streamer.stats().read_failures, 1);
        assert!(transport.payloads(Endpoint::Audio).is_empty());

        time::advance(AUDIO_PACKET_INTERVAL).await;
        streamer.tick();
        assert_eq!(streamer.stats().packets_sent, 1);
    }
}
