//! Transmission stage: push the processed utterance back to the peripheral.

use crate::link::writer::LinkWriterHandle;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::types::SynthesizedItem;
use crate::protocol::transmitter::truncate_display_text;
use crate::protocol::{CommandCode, Message};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TransmitStation {
    writer: LinkWriterHandle,
    send_ready: bool,
    stats: Arc<PipelineStats>,
}

impl TransmitStation {
    pub fn new(writer: LinkWriterHandle, send_ready: bool, stats: Arc<PipelineStats>) -> Self {
        Self {
            writer,
            send_ready,
            stats,
        }
    }

    fn send(&self, what: &str, message: Message) {
        if let Err(e) = self.writer.send_message(message) {
            warn!(what, error = %e, "transmit failed");
            self.stats.transmit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Station for TransmitStation {
    type Input = SynthesizedItem;
    type Output = ();

    /// The three sends are independent: losing the display update must not
    /// withhold the audio, and vice versa.
    fn process(&mut self, item: SynthesizedItem) -> Result<Option<()>, StationError> {
        info!(
            translated = %item.translated_text,
            duration_ms = item.waveform.duration_ms(),
            "transmitting utterance"
        );
        self.send(
            "audio",
            Message::Audio {
                sample_rate: item.waveform.sample_rate,
                samples: item.waveform.samples,
            },
        );
        self.send(
            "display",
            Message::Display {
                original: truncate_display_text(&item.original_text).to_string(),
                translated: truncate_display_text(&item.translated_text).to_string(),
            },
        );
        if self.send_ready {
            self.send("ready", Message::Command(CommandCode::Ready));
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "transmit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::synthesizer::Waveform;
    use crate::link::writer::{writer_channel, LinkRequest};
    use crossbeam_channel::Receiver;
    use std::time::Duration;

    fn item() -> SynthesizedItem {
        SynthesizedItem {
            original_text: "你好".to_string(),
            translated_text: "hello".to_string(),
            waveform: Waveform {
                samples: vec![5; 160],
                sample_rate: 16000,
            },
        }
    }

    /// Serve the writer channel, recording messages and replying per `ok`.
    fn serve(rx: Receiver<LinkRequest>, ok: Vec<bool>) -> std::thread::JoinHandle<Vec<Message>> {
        std::thread::spawn(move || {
            let mut seen = Vec::new();
            for accept in ok {
                match rx.recv_timeout(Duration::from_secs(1)) {
                    Ok(LinkRequest::Send { message, reply }) => {
                        seen.push(message);
                        let result = if accept {
                            Ok(())
                        } else {
                            Err(crate::error::BridgeError::LinkWrite {
                                message: "down".to_string(),
                            })
                        };
                        let _ = reply.send(result);
                    }
                    _ => break,
                }
            }
            seen
        })
    }

    #[test]
    fn test_sends_audio_display_and_ready() {
        let (writer, rx) = writer_channel(8, Duration::from_secs(1));
        let stats = Arc::new(PipelineStats::default());
        let mut station = TransmitStation::new(writer, true, Arc::clone(&stats));
        let server = serve(rx, vec![true, true, true]);

        assert_eq!(station.process(item()).unwrap(), None);

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen[0], Message::Audio { .. }));
        assert!(matches!(seen[1], Message::Display { .. }));
        assert_eq!(seen[2], Message::Command(CommandCode::Ready));
        assert_eq!(stats.snapshot().transmit_failures, 0);
    }

    #[test]
    fn test_ready_suppressed_when_disabled() {
        let (writer, rx) = writer_channel(8, Duration::from_secs(1));
        let stats = Arc::new(PipelineStats::default());
        let mut station = TransmitStation::new(writer, false, stats);
        let server = serve(rx, vec![true, true]);

        station.process(item()).unwrap();
        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen.iter().any(|m| *m == Message::Command(CommandCode::Ready)));
    }

    #[test]
    fn test_failed_audio_still_sends_display() {
        let (writer, rx) = writer_channel(8, Duration::from_secs(1));
        let stats = Arc::new(PipelineStats::default());
        let mut station = TransmitStation::new(writer, true, Arc::clone(&stats));
        let server = serve(rx, vec![false, true, true]);

        assert!(station.process(item()).is_ok());
        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(stats.snapshot().transmit_failures, 1);
    }
}
