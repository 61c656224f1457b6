//! Voice cloning through a local Chatterbox command.
//!
//! The command is invoked once per turn as
//! `<command> --text TEXT --reference REF.wav --output OUT.wav` and must
//! write a WAV file to `OUT.wav`.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};

use super::{
    ProgressFn, SpeechBackend, Synthesis, TtsConfig, TtsError, TurnVoice, for_speaker,
    run_command, synthesize_turns,
};
use crate::audio::AudioClip;
use crate::transcript::{Speaker, Utterance};

/// Cloned voices from two reference recordings.
#[derive(Debug, Clone)]
pub struct ChatterboxBackend {
    program: String,
    args: Vec<String>,
    references: [PathBuf; 2],
}

impl ChatterboxBackend {
    /// `command` may carry leading arguments, e.g. `python -m chatterbox_cli`.
    #[must_use]
    pub fn new(command: &str, references: [PathBuf; 2]) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            references,
        }
    }

    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        Self::new(&config.chatterbox_command, config.chatterbox_voices.clone())
    }
}

#[async_trait]
impl TurnVoice for ChatterboxBackend {
    async fn speak(&self, index: usize, utterance: &Utterance) -> Result<AudioClip, TtsError> {
        let reference = for_speaker(&self.references, utterance.speaker);
        let dir = tempfile::tempdir().map_err(|e| TtsError::io(std::env::temp_dir(), e))?;
        let path = dir.path().join(format!("segment_{index:04}.wav"));

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--text")
            .arg(&utterance.text)
            .arg("--reference")
            .arg(reference)
            .arg("--output")
            .arg(&path);
        run_command(&mut command, &self.program).await?;

        Ok(AudioClip::read_wav(&path)?)
    }
}

#[async_trait]
impl SpeechBackend for ChatterboxBackend {
    fn name(&self) -> &'static str {
        "chatterbox"
    }

    fn model_label(&self) -> String {
        "chatterbox_turbo".to_string()
    }

    async fn prepare(&self) -> Result<(), TtsError> {
        for (speaker, path) in [Speaker::One, Speaker::Two].into_iter().zip(&self.references) {
            if !path.is_file() {
                return Err(TtsError::MissingReference {
                    speaker,
                    path: path.clone(),
                });
            }
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
            person1 = %self.references[0].display(),
            person2 = %self.references[1].display(),
            "Generating audio with Chatterbox"
        );
        synthesize_turns(self, utterances, progress).await
    }
}
