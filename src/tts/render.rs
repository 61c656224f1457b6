use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::Rng;
use tracing::{info, instrument};

use super::{ProgressFn, SpeechBackend, TtsError};
use crate::audio::{AudioFormat, assemble, export};
use crate::transcript::Utterance;

/// A finished audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub path: PathBuf,
    pub duration_secs: f64,
    /// 1-based chunk indices dropped after moderation retries.
    pub skipped_chunks: Vec<usize>,
    /// Wall-clock seconds spent synthesizing and encoding.
    pub render_secs: f64,
}

/// Synthesizes `utterances` with `backend`, joins the units with pauses and
/// writes the result to `path`.
///
/// # Errors
///
/// Any backend, assembly or export failure.
#[instrument(skip_all, fields(backend = backend.name(), turns = utterances.len(), path = %path.display()))]
pub async fn render<R: Rng + ?Sized>(
    backend: &dyn SpeechBackend,
    utterances: &[Utterance],
    rng: &mut R,
    path: &Path,
    format: AudioFormat,
    progress: ProgressFn<'_>,
) -> Result<Rendered, TtsError> {
    let started = Instant::now();
    backend.prepare().await?;
    let synthesis = backend.synthesize(utterances, progress).await?;
    let clip = assemble(&synthesis.units, rng)?;
    let path = export(&clip, path, format).await?;
    let render_secs = started.elapsed().as_secs_f64();

    info!(
        duration_secs = clip.duration_secs(),
        render_secs,
        skipped = synthesis.skipped_chunks.len(),
        "Rendered audio"
    );
    Ok(Rendered {
        path,
        duration_secs: clip.duration_secs(),
        skipped_chunks: synthesis.skipped_chunks,
        render_secs,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::audio::{AudioClip, AudioUnit};
    use crate::transcript::Speaker;
    use crate::tts::Synthesis;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Beeps;

    #[async_trait]
    impl SpeechBackend for Beeps {
        fn name(&self) -> &'static str {
            "beeps"
        }

        fn model_label(&self) -> String {
            "beep".to_string()
        }

        async fn synthesize(
            &self,
            utterances: &[Utterance],
            _progress: ProgressFn<'_>,
        ) -> Result<Synthesis, TtsError> {
            Ok(Synthesis {
                units: utterances
                    .iter()
                    .map(|u| AudioUnit {
                        clip: AudioClip::new(1000, vec![100; 1000]),
                        trailing_text: u.text.clone(),
                    })
                    .collect(),
                skipped_chunks: vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_render_writes_wav_with_pauses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep.wav");
        let utterances = vec![
            Utterance::new(Speaker::One, "Ready?"),
            Utterance::new(Speaker::Two, "Yes!"),
        ];
        let mut rng = StdRng::seed_from_u64(5);

        let rendered = render(&Beeps, &utterances, &mut rng, &path, AudioFormat::Wav, &mut |_| {})
            .await
            .unwrap();

        assert!(path.exists());
        // Two one-second clips plus a 500..=800 ms question pause.
        assert!(rendered.duration_secs >= 2.5 && rendered.duration_secs <= 2.8);
        assert!(rendered.skipped_chunks.is_empty());
    }
}
