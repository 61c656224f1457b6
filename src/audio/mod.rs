//! Mono PCM audio: clips, chunking of turns, assembly with pauses, export.
//!
//! Every backend hands back [`AudioClip`]s (16-bit mono PCM). Assembly
//! concatenates them in order with a pause after each unit that depends on
//! how the unit's text ends, then [`export`] writes WAV directly or MP3
//! through `ffmpeg`.

mod chunker;
mod clip;
mod export;

pub use chunker::{DEFAULT_MAX_CHUNK_BYTES, chunk_utterances};
pub use clip::AudioClip;
pub use export::{AudioFormat, export};

use std::path::PathBuf;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::transcript::pause_duration;

/// Sample rate produced by every built-in backend.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Errors from audio decoding, assembly and export.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg not found on PATH\n  Suggestion: install ffmpeg or set audio_format = \"wav\"")]
    FfmpegMissing,

    #[error("ffmpeg failed ({status}): {stderr}")]
    Ffmpeg { status: String, stderr: String },

    #[error("no audio to assemble")]
    Empty,

    #[error("invalid PCM data: {0}")]
    InvalidPcm(String),
}

impl AudioError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A synthesized unit (one utterance or one chunk of utterances).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUnit {
    pub clip: AudioClip,
    /// Text of the last utterance spoken in this unit; decides the pause after it.
    pub trailing_text: String,
}

/// Concatenates units in order with a punctuation-dependent pause between
/// consecutive units. Nothing is added after the last unit.
///
/// Units with a different sample rate are resampled to the first unit's rate.
///
/// # Errors
///
/// Returns [`AudioError::Empty`] when there are no units.
pub fn assemble<R: Rng + ?Sized>(units: &[AudioUnit], rng: &mut R) -> Result<AudioClip, AudioError> {
    let Some(first) = units.first() else {
        return Err(AudioError::Empty);
    };
    let sample_rate = first.clip.sample_rate();
    let mut output = AudioClip::empty(sample_rate);

    for (index, unit) in units.iter().enumerate() {
        if index > 0 {
            let pause = pause_duration(&units[index - 1].trailing_text, rng);
            output.append(&AudioClip::silence(sample_rate, pause));
        }
        if unit.clip.sample_rate() == sample_rate {
            output.append(&unit.clip);
        } else {
            output.append(&unit.clip.resample(sample_rate));
        }
    }

    debug!(
        units = units.len(),
        seconds = output.duration_secs(),
        "Assembled audio"
    );
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transcript::pause::{DEFAULT_PAUSE_MS, QUESTION_PAUSE_MS};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn unit(samples: usize, text: &str) -> AudioUnit {
        AudioUnit {
            clip: AudioClip::new(1000, vec![1000; samples]),
            trailing_text: text.to_string(),
        }
    }

    #[test]
    fn test_assemble_inserts_pause_from_previous_unit() {
        let mut rng = StdRng::seed_from_u64(3);
        let units = vec![unit(100, "Why?"), unit(50, "Because.")];

        let clip = assemble(&units, &mut rng).unwrap();

        // 1000 Hz: one sample per millisecond.
        let gap = clip.len() - 150;
        let gap = u64::try_from(gap).unwrap();
        assert!(QUESTION_PAUSE_MS.contains(&gap), "gap {gap}ms");
        assert!(clip.samples()[..100].iter().all(|&s| s == 1000));
        assert!(clip.samples()[100..100 + usize::try_from(gap).unwrap()]
            .iter()
            .all(|&s| s == 0));
    }

    #[test]
    fn test_assemble_no_trailing_pause() {
        let mut rng = StdRng::seed_from_u64(3);
        let clip = assemble(&[unit(10, "Done.")], &mut rng).unwrap();
        assert_eq!(clip.len(), 10);
    }

    #[test]
    fn test_assemble_three_units_two_gaps() {
        let mut rng = StdRng::seed_from_u64(9);
        let units = vec![unit(10, "a."), unit(10, "b."), unit(10, "c.")];

        let clip = assemble(&units, &mut rng).unwrap();

        let silence = u64::try_from(clip.len() - 30).unwrap();
        let min = DEFAULT_PAUSE_MS.start() * 2;
        let max = DEFAULT_PAUSE_MS.end() * 2;
        assert!((min..=max).contains(&silence));
    }

    #[test]
    fn test_assemble_resamples_to_first_rate() {
        let mut rng = StdRng::seed_from_u64(1);
        let units = vec![
            unit(1000, "a."),
            AudioUnit {
                clip: AudioClip::new(2000, vec![5; 2000]),
                trailing_text: "b.".to_string(),
            },
        ];

        let clip = assemble(&units, &mut rng).unwrap();

        assert_eq!(clip.sample_rate(), 1000);
        assert!(clip.duration() >= Duration::from_millis(2300));
        assert!(clip.duration() <= Duration::from_millis(2500));
    }

    #[test]
    fn test_assemble_empty_is_error() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(assemble(&[], &mut rng), Err(AudioError::Empty)));
    }
}
