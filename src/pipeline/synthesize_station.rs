//! Synthesis stage.

use crate::engines::synthesizer::Synthesizer;
use crate::link::writer::LinkWriterHandle;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::types::{SynthesizedItem, TranslatedItem};
use crate::protocol::{CommandCode, Message};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

pub struct SynthesizeStation {
    synthesizer: Arc<dyn Synthesizer>,
    voice_path: Option<PathBuf>,
    writer: LinkWriterHandle,
    stats: Arc<PipelineStats>,
}

impl SynthesizeStation {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        voice_path: Option<PathBuf>,
        writer: LinkWriterHandle,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            synthesizer,
            voice_path,
            writer,
            stats,
        }
    }
}

impl Station for SynthesizeStation {
    type Input = TranslatedItem;
    type Output = SynthesizedItem;

    fn process(&mut self, item: TranslatedItem) -> Result<Option<SynthesizedItem>, StationError> {
        let waveform = self
            .synthesizer
            .synthesize(&item.translated_text, self.voice_path.as_deref())
            .map_err(|e| {
                self.stats
                    .synthesize_failures
                    .fetch_add(1, Ordering::Relaxed);
                // Tell the peripheral this utterance is lost so it can stop
                // waiting. Best effort only.
                if let Err(notify_err) =
                    self.writer.send_message(Message::Command(CommandCode::Error))
                {
                    debug!(error = %notify_err, "failed to send error command");
                }
                StationError::Recoverable(e.to_string())
            })?;

        debug!(
            duration_ms = waveform.duration_ms(),
            "utterance synthesized"
        );
        Ok(Some(SynthesizedItem {
            original_text: item.original_text,
            translated_text: item.translated_text,
            waveform,
        }))
    }

    fn name(&self) -> &'static str {
        "synthesize"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::segmenter::AudioSegment;
    use crate::engines::synthesizer::{MockSynthesizer, Waveform};
    use crate::link::writer::{writer_channel, LinkRequest};
    use std::time::{Duration, Instant};

    fn item() -> TranslatedItem {
        TranslatedItem {
            segment: AudioSegment {
                samples: vec![0; 100],
                sample_rate: 16000,
                captured_at: Instant::now(),
            },
            original_text: "你好".to_string(),
            translated_text: "hello".to_string(),
        }
    }

    #[test]
    fn test_waveform_attached() {
        let (writer, _rx) = writer_channel(4, Duration::from_millis(100));
        let stats = Arc::new(PipelineStats::default());
        let synth = MockSynthesizer::new().with_waveform(Waveform {
            samples: vec![1; 320],
            sample_rate: 16000,
        });
        let mut station = SynthesizeStation::new(Arc::new(synth), None, writer, stats);

        let out = station.process(item()).unwrap().unwrap();
        assert_eq!(out.waveform.samples.len(), 320);
        assert_eq!(out.translated_text, "hello");
    }

    #[test]
    fn test_failure_counted_and_error_command_sent() {
        let (writer, rx) = writer_channel(4, Duration::from_millis(100));
        let stats = Arc::new(PipelineStats::default());
        let mut station = SynthesizeStation::new(
            Arc::new(MockSynthesizer::new().with_failure()),
            None,
            writer,
            Arc::clone(&stats),
        );

        // Serve the error-command write so the station is not stuck waiting.
        let server = std::thread::spawn(move || match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(LinkRequest::Send { message, reply }) => {
                let _ = reply.send(Ok(()));
                Some(message)
            }
            _ => None,
        });

        let result = station.process(item());
        assert!(matches!(result, Err(StationError::Recoverable(_))));
        assert_eq!(stats.snapshot().synthesize_failures, 1);
        assert_eq!(
            server.join().unwrap(),
            Some(Message::Command(CommandCode::Error))
        );
    }
}
