//! Debug WAV dumps of captured segments.

use crate::audio::segmenter::AudioSegment;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static DUMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write a segment to `dir` as 16-bit mono PCM, returning the file path.
///
/// Filenames are sequence-numbered within the process so dumps from one run
/// sort in capture order.
pub fn write_segment_wav(dir: &Path, segment: &AudioSegment) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let seq = DUMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = dir.join(format!("segment_{seq:05}.wav"));

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: segment.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)
        .map_err(|e| crate::error::BridgeError::Other(format!("WAV create failed: {e}")))?;
    for &sample in &segment.samples {
        writer
            .write_sample(sample)
            .map_err(|e| crate::error::BridgeError::Other(format!("WAV write failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| crate::error::BridgeError::Other(format!("WAV finalize failed: {e}")))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_dump_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let segment = AudioSegment {
            samples: vec![0, 1000, -1000, 32767, -32768],
            sample_rate: 16000,
            captured_at: Instant::now(),
        };
        let path = write_segment_wav(dir.path(), &segment).unwrap();
        assert!(path.exists());

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, segment.samples);
    }
}
