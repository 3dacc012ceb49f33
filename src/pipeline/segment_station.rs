//! Segmentation stage: raw audio frames in, utterance segments out.

use crate::audio::segmenter::{AudioSegment, Segmenter};
use crate::audio::wav::write_segment_wav;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::stats::{offer, PipelineStats};
use crate::pipeline::types::AudioFrame;
use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Feeds frames through the segmenter and emits completed segments.
///
/// One input frame can complete several segments, so this station sends on
/// its own clone of the output channel and always returns `Ok(None)` to the
/// runner.
pub struct SegmentStation {
    segmenter: Segmenter,
    segment_tx: Sender<AudioSegment>,
    stats: Arc<PipelineStats>,
    dump_dir: Option<PathBuf>,
    expected_rate: u32,
    rate_warned: bool,
}

impl SegmentStation {
    pub fn new(
        segmenter: Segmenter,
        expected_rate: u32,
        segment_tx: Sender<AudioSegment>,
        stats: Arc<PipelineStats>,
        dump_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            segmenter,
            segment_tx,
            stats,
            dump_dir,
            expected_rate,
            rate_warned: false,
        }
    }

    fn emit(&mut self, segment: AudioSegment) {
        info!(
            samples = segment.samples.len(),
            duration_ms = segment.duration_ms(),
            "segment captured"
        );
        if let Some(dir) = &self.dump_dir {
            if let Err(e) = write_segment_wav(dir, &segment) {
                warn!(error = %e, "segment dump failed");
            }
        }
        self.stats.segments.fetch_add(1, Ordering::Relaxed);
        offer(&self.segment_tx, segment, "segments", &self.stats);
    }
}

impl Station for SegmentStation {
    type Input = AudioFrame;
    type Output = AudioSegment;

    fn process(&mut self, frame: AudioFrame) -> Result<Option<AudioSegment>, StationError> {
        if frame.sample_rate != self.expected_rate && !self.rate_warned {
            warn!(
                got = frame.sample_rate,
                expected = self.expected_rate,
                "unexpected sample rate, segment timing will be off"
            );
            self.rate_warned = true;
        }
        for segment in self.segmenter.push(&frame.samples) {
            self.emit(segment);
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "segment"
    }

    fn shutdown(&mut self) {
        // Emit whatever utterance was in progress when the pipeline stopped.
        if let Some(segment) = self.segmenter.flush() {
            self.emit(segment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::segmenter::SegmenterConfig;
    use crossbeam_channel::bounded;

    fn station(tx: Sender<AudioSegment>, stats: Arc<PipelineStats>) -> SegmentStation {
        let config = SegmenterConfig::default();
        SegmentStation::new(Segmenter::new(config.clone()), config.sample_rate, tx, stats, None)
    }

    fn voiced_frame(blocks: usize) -> AudioFrame {
        AudioFrame {
            samples: (0..blocks * 256)
                .map(|i| if i % 2 == 0 { 3000 } else { -3000 })
                .collect(),
            sample_rate: 16000,
        }
    }

    fn silent_frame(blocks: usize) -> AudioFrame {
        AudioFrame {
            samples: vec![0; blocks * 256],
            sample_rate: 16000,
        }
    }

    #[test]
    fn test_segments_emitted_on_own_channel() {
        let (tx, rx) = bounded(8);
        let stats = Arc::new(PipelineStats::default());
        let mut station = station(tx, Arc::clone(&stats));

        assert_eq!(station.process(voiced_frame(31)).unwrap(), None);
        assert_eq!(station.process(silent_frame(20)).unwrap(), None);

        let segment = rx.try_recv().unwrap();
        assert_eq!(segment.samples.len(), 31 * 256);
        assert_eq!(stats.snapshot().segments, 1);
    }

    #[test]
    fn test_shutdown_flushes_in_progress_utterance() {
        let (tx, rx) = bounded(8);
        let stats = Arc::new(PipelineStats::default());
        let mut station = station(tx, stats);

        station.process(voiced_frame(40)).unwrap();
        assert!(rx.try_recv().is_err());
        station.shutdown();
        assert_eq!(rx.try_recv().unwrap().samples.len(), 40 * 256);
    }

    #[test]
    fn test_dump_dir_receives_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = bounded(8);
        let stats = Arc::new(PipelineStats::default());
        let config = SegmenterConfig::default();
        let mut station = SegmentStation::new(
            Segmenter::new(config.clone()),
            config.sample_rate,
            tx,
            stats,
            Some(dir.path().to_path_buf()),
        );

        station.process(voiced_frame(31)).unwrap();
        station.process(silent_frame(20)).unwrap();
        let dumps = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(dumps, 1);
    }
}
