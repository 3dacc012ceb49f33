//! Recognition/translation stage.

use crate::audio::segmenter::AudioSegment;
use crate::engines::translator::Translator;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::types::TranslatedItem;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

pub struct TranslateStation {
    translator: Arc<dyn Translator>,
    source: String,
    target: String,
    stats: Arc<PipelineStats>,
}

impl TranslateStation {
    pub fn new(
        translator: Arc<dyn Translator>,
        source: String,
        target: String,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            translator,
            source,
            target,
            stats,
        }
    }
}

impl Station for TranslateStation {
    type Input = AudioSegment;
    type Output = TranslatedItem;

    fn process(&mut self, segment: AudioSegment) -> Result<Option<TranslatedItem>, StationError> {
        let translation = self
            .translator
            .translate(
                &segment.samples,
                segment.sample_rate,
                &self.source,
                &self.target,
            )
            .map_err(|e| {
                self.stats.translate_failures.fetch_add(1, Ordering::Relaxed);
                StationError::Recoverable(e.to_string())
            })?;

        if translation.translated.trim().is_empty() {
            // Nothing recognized; common for breaths and noise.
            debug!("empty translation, skipping segment");
            return Ok(None);
        }
        info!(
            original = %translation.original,
            translated = %translation.translated,
            "segment translated"
        );
        Ok(Some(TranslatedItem {
            segment,
            original_text: translation.original,
            translated_text: translation.translated,
        }))
    }

    fn name(&self) -> &'static str {
        "translate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::translator::MockTranslator;
    use std::time::Instant;

    fn segment() -> AudioSegment {
        AudioSegment {
            samples: vec![100; 8000],
            sample_rate: 16000,
            captured_at: Instant::now(),
        }
    }

    fn station(translator: MockTranslator) -> (TranslateStation, Arc<PipelineStats>) {
        let stats = Arc::new(PipelineStats::default());
        let station = TranslateStation::new(
            Arc::new(translator),
            "zh".to_string(),
            "en".to_string(),
            Arc::clone(&stats),
        );
        (station, stats)
    }

    #[test]
    fn test_translation_attached_to_segment() {
        let (mut station, _stats) = station(MockTranslator::new().with_result("你好", "hello"));
        let item = station.process(segment()).unwrap().unwrap();
        assert_eq!(item.original_text, "你好");
        assert_eq!(item.translated_text, "hello");
        assert_eq!(item.segment.samples.len(), 8000);
    }

    #[test]
    fn test_failure_is_recoverable_and_counted() {
        let (mut station, stats) = station(MockTranslator::new().with_failure());
        let result = station.process(segment());
        assert!(matches!(result, Err(StationError::Recoverable(_))));
        assert_eq!(stats.snapshot().translate_failures, 1);
    }

    #[test]
    fn test_empty_translation_filtered() {
        let (mut station, stats) = station(MockTranslator::new().with_result("", "  "));
        assert_eq!(station.process(segment()).unwrap(), None);
        assert_eq!(stats.snapshot().translate_failures, 0);
    }
}
