//! Session wiring: one link, one pipeline, one dispatcher between them.

use crate::config::Config;
use crate::defaults;
use crate::engines::synthesizer::Synthesizer;
use crate::engines::translator::Translator;
use crate::error::Result;
use crate::link::manager::{ConnectionHandle, ConnectionManager, LinkState};
use crate::link::transport::Link;
use crate::link::writer::writer_channel;
use crate::pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
use crate::pipeline::stats::{offer, StatsSnapshot};
use crate::pipeline::types::AudioFrame;
use crate::protocol::{Message, Reassembler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Point-in-time view of a running session.
#[derive(Debug, Clone, Copy)]
pub struct SessionStatus {
    pub link_state: LinkState,
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub stats: StatsSnapshot,
}

/// Builds and starts sessions over a given link.
pub struct SessionController {
    config: Config,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl SessionController {
    pub fn new(
        config: Config,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            config,
            translator,
            synthesizer,
        }
    }

    /// Connect the link and start the pipeline behind it.
    pub fn start(&self, link: Box<dyn Link>) -> Result<SessionHandle> {
        let should_stop = Arc::new(AtomicBool::new(false));
        let (writer, request_rx) = writer_channel(
            defaults::STAGE_BUFFER,
            Duration::from_millis(self.config.link.write_timeout_ms),
        );

        let pipeline = Pipeline::new(PipelineConfig::from_config(&self.config)).start(
            Arc::clone(&self.translator),
            Arc::clone(&self.synthesizer),
            writer.clone(),
            Arc::clone(&should_stop),
        )?;

        let audio_tx = pipeline
            .audio_sender()
            .ok_or_else(|| crate::error::BridgeError::Other("pipeline has no input".to_string()))?;
        let stats = pipeline.stats();

        // The dispatcher runs inside the link's notification delivery: it
        // reassembles chunks and forwards audio frames without blocking.
        let mut reassembler = Reassembler::default();
        let dispatcher = Box::new(move |chunk: &[u8]| {
            for message in reassembler.push(chunk) {
                match message {
                    Message::Audio {
                        sample_rate,
                        samples,
                    } => {
                        offer(
                            &audio_tx,
                            AudioFrame {
                                samples,
                                sample_rate,
                            },
                            "audio",
                            &stats,
                        );
                    }
                    Message::Command(code) => {
                        debug!(?code, "command from peripheral");
                    }
                    Message::Display { original, translated } => {
                        // The peripheral does not normally send these.
                        warn!(%original, %translated, "unexpected display message");
                    }
                }
            }
        });

        let connection = ConnectionManager::start(
            link,
            self.config.link.clone(),
            dispatcher,
            writer,
            request_rx,
            Arc::clone(&should_stop),
        );
        let connection = match connection {
            Ok(connection) => connection,
            Err(e) => {
                // Unwind the already-running pipeline before reporting.
                should_stop.store(true, Ordering::Relaxed);
                pipeline.stop(Duration::from_secs(2));
                return Err(e);
            }
        };

        info!("session started");
        Ok(SessionHandle {
            should_stop,
            connection,
            pipeline,
        })
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    should_stop: Arc<AtomicBool>,
    connection: ConnectionHandle,
    pipeline: PipelineHandle,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            link_state: self.connection.state(),
            connected: self.connection.is_connected(),
            reconnect_attempts: self.connection.reconnect_attempts(),
            stats: self.pipeline.stats().snapshot(),
        }
    }

    /// True once reconnection has been exhausted.
    pub fn is_failed(&self) -> bool {
        self.connection.state() == LinkState::Failed
    }

    /// Stop the pipeline first so in-flight utterances can still be written
    /// out, then take the link down.
    pub fn stop(self) {
        self.should_stop.store(true, Ordering::Relaxed);
        self.pipeline.stop(Duration::from_secs(5));
        self.connection.stop(Duration::from_secs(5));
        info!("session stopped");
    }
}
