//! Local voices through the macOS `say` command.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::process::Command;
use tracing::{info, instrument};

use super::{
    ProgressFn, SpeechBackend, Synthesis, TtsConfig, TtsError, TurnVoice, for_speaker,
    run_command, synthesize_turns,
};
use crate::audio::{AudioClip, DEFAULT_SAMPLE_RATE};
use crate::transcript::{Utterance, replace_filler_words};

const SAY: &str = "say";

/// Two `say` voices at a fixed speaking rate.
#[derive(Debug)]
pub struct MacosBackend {
    voices: [String; 2],
    rate: u32,
    rng: Mutex<StdRng>,
}

impl MacosBackend {
    #[must_use]
    pub fn new(voices: [String; 2], rate: u32, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            voices,
            rate,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        Self::new(config.macos_voices.clone(), config.macos_rate, config.seed)
    }

    fn clean(&self, text: &str) -> String {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        replace_filler_words(text, &mut *rng)
    }

    async fn validate_voice(voice: &str) -> Result<(), TtsError> {
        let output = Command::new(SAY)
            .args(["-v", voice, ""])
            .output()
            .await
            .map_err(|e| TtsError::io(SAY, e))?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if !output.status.success() || stderr.contains("not found") {
            return Err(TtsError::VoiceUnavailable {
                voice: voice.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TurnVoice for MacosBackend {
    async fn speak(&self, index: usize, utterance: &Utterance) -> Result<AudioClip, TtsError> {
        let voice = for_speaker(&self.voices, utterance.speaker);
        let text = self.clean(&utterance.text);
        let dir = tempfile::tempdir().map_err(|e| TtsError::io(std::env::temp_dir(), e))?;
        let path = dir.path().join(format!("segment_{index:04}.wav"));

        let rate = self.rate.to_string();
        let mut command = Command::new(SAY);
        command
            .args(["-v", voice.as_str(), "-r", rate.as_str(), "-o"])
            .arg(&path)
            .arg("--file-format=WAVE")
            .arg(format!("--data-format=LEI16@{DEFAULT_SAMPLE_RATE}"))
            .arg(&text);
        run_command(&mut command, SAY).await?;

        Ok(AudioClip::read_wav(&path)?)
    }
}

#[async_trait]
impl SpeechBackend for MacosBackend {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn model_label(&self) -> String {
        "macos_say".to_string()
    }

    async fn prepare(&self) -> Result<(), TtsError> {
        for voice in &self.voices {
            Self::validate_voice(voice).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, utterances, progress), fields(turns = utterances.len()))]
    async fn synthesize(
        &self,
        utterances: &[Utterance],
        progress: ProgressFn<'_>,
    ) -> Result<Synthesis, TtsError> {
        info!(
            person1 = %self.voices[0],
            person2 = %self.voices[1],
            "Generating audio with macOS voices"
        );
        synthesize_turns(self, utterances, progress).await
    }
}
