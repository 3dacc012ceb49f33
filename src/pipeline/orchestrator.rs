//! Pipeline assembly and lifecycle.
//!
//! `Pipeline::start` wires the four stations together with bounded channels
//! and hands back a `PipelineHandle` for feeding audio and shutting down.

use crate::audio::segmenter::{Segmenter, SegmenterConfig};
use crate::config::Config;
use crate::engines::synthesizer::Synthesizer;
use crate::engines::translator::Translator;
use crate::error::Result;
use crate::link::writer::LinkWriterHandle;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::segment_station::SegmentStation;
use crate::pipeline::station::StationRunner;
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::synthesize_station::SynthesizeStation;
use crate::pipeline::transmit_station::TransmitStation;
use crate::pipeline::translate_station::TranslateStation;
use crate::pipeline::types::AudioFrame;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub audio_buffer: usize,
    pub segment_buffer: usize,
    pub translate_buffer: usize,
    pub synthesize_buffer: usize,
    pub source_language: String,
    pub target_language: String,
    pub voice_path: Option<PathBuf>,
    pub dump_dir: Option<PathBuf>,
    pub send_ready: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            segmenter: config.segmenter.clone(),
            audio_buffer: config.pipeline.audio_buffer,
            segment_buffer: config.pipeline.segment_buffer,
            translate_buffer: config.pipeline.translate_buffer,
            synthesize_buffer: config.pipeline.synthesize_buffer,
            source_language: config.translation.source_language.clone(),
            target_language: config.translation.target_language.clone(),
            voice_path: config.translation.voice_path.clone(),
            dump_dir: config.pipeline.dump_dir.clone(),
            send_ready: config.pipeline.send_ready,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Spawn all stations and return the running pipeline.
    pub fn start(
        self,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
        writer: LinkWriterHandle,
        should_stop: Arc<AtomicBool>,
    ) -> Result<PipelineHandle> {
        let config = self.config;
        let stats = Arc::new(PipelineStats::default());

        let (audio_tx, audio_rx) = bounded::<AudioFrame>(config.audio_buffer);
        let (segment_tx, segment_rx) = bounded(config.segment_buffer);
        let (translated_tx, translated_rx) = bounded(config.translate_buffer);
        let (synthesized_tx, synthesized_rx) = bounded(config.synthesize_buffer);
        let (drain_tx, drain_rx) = bounded::<()>(1);

        let segment_station = SegmentStation::new(
            Segmenter::new(config.segmenter.clone()),
            config.segmenter.sample_rate,
            segment_tx.clone(),
            Arc::clone(&stats),
            config.dump_dir.clone(),
        );
        let translate_station = TranslateStation::new(
            translator,
            config.source_language.clone(),
            config.target_language.clone(),
            Arc::clone(&stats),
        );
        let synthesize_station = SynthesizeStation::new(
            synthesizer,
            config.voice_path.clone(),
            writer.clone(),
            Arc::clone(&stats),
        );
        let transmit_station =
            TransmitStation::new(writer, config.send_ready, Arc::clone(&stats));

        let runners = vec![
            StationRunner::spawn(
                segment_station,
                audio_rx,
                segment_tx,
                Arc::clone(&self.reporter),
                Arc::clone(&stats),
                Arc::clone(&should_stop),
            )?,
            StationRunner::spawn(
                translate_station,
                segment_rx,
                translated_tx,
                Arc::clone(&self.reporter),
                Arc::clone(&stats),
                Arc::clone(&should_stop),
            )?,
            StationRunner::spawn(
                synthesize_station,
                translated_rx,
                synthesized_tx,
                Arc::clone(&self.reporter),
                Arc::clone(&stats),
                Arc::clone(&should_stop),
            )?,
            StationRunner::spawn(
                transmit_station,
                synthesized_rx,
                drain_tx,
                Arc::clone(&self.reporter),
                Arc::clone(&stats),
                Arc::clone(&should_stop),
            )?,
        ];
        info!("pipeline started");

        Ok(PipelineHandle {
            audio_tx: Some(audio_tx),
            runners,
            stats,
            should_stop,
            _drain_rx: drain_rx,
        })
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    audio_tx: Option<Sender<AudioFrame>>,
    runners: Vec<StationRunner>,
    stats: Arc<PipelineStats>,
    should_stop: Arc<AtomicBool>,
    _drain_rx: Receiver<()>,
}

impl PipelineHandle {
    /// Sender used to feed raw audio into the pipeline.
    pub fn audio_sender(&self) -> Option<Sender<AudioFrame>> {
        self.audio_tx.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Stop all stations, waiting up to `deadline` for each thread.
    ///
    /// Queued items already inside the pipeline are still processed before
    /// the stations exit.
    pub fn stop(mut self, deadline: Duration) {
        self.should_stop.store(true, Ordering::Relaxed);
        drop(self.audio_tx.take());
        for runner in &mut self.runners {
            runner.join_deadline(deadline);
        }
        info!("pipeline stopped");
    }
}
