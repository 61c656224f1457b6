//! Speech synthesis backends behind one trait.
//!
//! # Architecture
//!
//! - [`SpeechBackend`] - Async trait every voice engine implements
//! - [`BackendRegistry`] - Name to factory map built once at startup
//! - [`MacosBackend`] - Local `say` voices, one call per turn
//! - [`ElevenLabsBackend`] - REST voices, one call per turn
//! - [`ChatterboxBackend`] - Local voice cloning command, one call per turn
//! - [`GoogleCloudBackend`] - Multi-speaker REST synthesis over chunks of turns,
//!   with a sanitize-and-retry path for moderation rejections
//! - [`render`] - Synthesize, assemble with pauses and export in one step

mod chatterbox;
mod elevenlabs;
mod google;
mod macos;
mod registry;
mod render;

pub use chatterbox::ChatterboxBackend;
pub use elevenlabs::ElevenLabsBackend;
pub use google::GoogleCloudBackend;
pub use macos::MacosBackend;
pub use registry::{BackendFactory, BackendRegistry, build_default_backend_registry};
pub use render::{Rendered, render};

use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::audio::{AudioClip, AudioError, AudioUnit};
use crate::llm::LanguageModel;
use crate::transcript::{Speaker, Utterance};

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const GOOGLE_TTS_BASE_URL: &str = "https://texttospeech.googleapis.com";

pub const DEFAULT_MACOS_VOICES: [&str; 2] = ["Zoe (Premium)", "Lee (Premium)"];
pub const DEFAULT_MACOS_RATE: u32 = 165;
pub const DEFAULT_ELEVENLABS_VOICES: [&str; 2] = ["21m00Tcm4TlvDq8ikWAM", "pNInz6obpgDQGcFmaJgB"];
pub const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";
pub const DEFAULT_GOOGLE_VOICES: [&str; 2] = ["Kore", "Charon"];
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_CHATTERBOX_VOICES: [&str; 2] =
    ["data/voices/person1.wav", "data/voices/person2.wav"];
pub const DEFAULT_CHATTERBOX_COMMAND: &str = "chatterbox-tts";

/// Errors raised by speech backends.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("unknown TTS backend '{name}' (available: {available})")]
    UnknownBackend { name: String, available: String },

    #[error("voice '{voice}' not found\n  Suggestion: run `say -v ?` to list available voices")]
    VoiceUnavailable { voice: String },

    #[error("{speaker} reference audio not found: {}", path.display())]
    MissingReference { speaker: Speaker, path: PathBuf },

    #[error("missing credentials for {backend}\n  Suggestion: set {env_var} in the environment or .env")]
    MissingCredentials {
        backend: &'static str,
        env_var: &'static str,
    },

    #[error("chunk {chunk} rejected by content moderation: {message}")]
    Moderation { chunk: usize, message: String },

    #[error("TTS API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("`{program}` failed ({status}): {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("all {total} chunk(s) failed content moderation; cannot generate audio")]
    AllChunksFailed { total: usize },

    #[error("no speaker turns to synthesize")]
    NoUtterances,

    #[error("could not decode synthesized audio: {0}")]
    Decode(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl TtsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Synthesis progress, reported after each request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisProgress {
    pub done: usize,
    pub total: usize,
}

/// Callback receiving [`SynthesisProgress`] updates.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(SynthesisProgress) + Send);

/// Audio units in speaking order plus the chunks that had to be dropped.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub units: Vec<AudioUnit>,
    /// 1-based indices of chunks skipped after moderation retries.
    pub skipped_chunks: Vec<usize>,
}

/// A voice engine that turns speaker turns into audio.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Registry name, e.g. `macos`.
    fn name(&self) -> &'static str;

    /// Model label recorded in the generation log.
    fn model_label(&self) -> String;

    /// Checks voices, reference files or credentials before any synthesis.
    async fn prepare(&self) -> Result<(), TtsError> {
        Ok(())
    }

    /// Synthesizes `utterances` in order.
    async fn synthesize(
        &self,
        utterances: &[Utterance],
        progress: ProgressFn<'_>,
    ) -> Result<Synthesis, TtsError>;
}

/// Voice settings for every built-in backend.
#[derive(Clone)]
pub struct TtsConfig {
    pub macos_voices: [String; 2],
    pub macos_rate: u32,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voices: [String; 2],
    pub elevenlabs_model: String,
    pub elevenlabs_base_url: String,
    pub google_api_key: Option<String>,
    pub google_access_token: Option<String>,
    pub google_voices: [String; 2],
    pub google_model: String,
    pub google_base_url: String,
    pub chatterbox_voices: [PathBuf; 2],
    pub chatterbox_command: String,
    /// Language model used to rewrite moderation-rejected chunks.
    pub sanitizer: Option<Arc<dyn LanguageModel>>,
    pub seed: Option<u64>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            macos_voices: DEFAULT_MACOS_VOICES.map(String::from),
            macos_rate: DEFAULT_MACOS_RATE,
            elevenlabs_api_key: None,
            elevenlabs_voices: DEFAULT_ELEVENLABS_VOICES.map(String::from),
            elevenlabs_model: DEFAULT_ELEVENLABS_MODEL.to_string(),
            elevenlabs_base_url: ELEVENLABS_BASE_URL.to_string(),
            google_api_key: None,
            google_access_token: None,
            google_voices: DEFAULT_GOOGLE_VOICES.map(String::from),
            google_model: DEFAULT_GOOGLE_MODEL.to_string(),
            google_base_url: GOOGLE_TTS_BASE_URL.to_string(),
            chatterbox_voices: DEFAULT_CHATTERBOX_VOICES.map(PathBuf::from),
            chatterbox_command: DEFAULT_CHATTERBOX_COMMAND.to_string(),
            sanitizer: None,
            seed: None,
        }
    }
}

impl std::fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsConfig")
            .field("macos_voices", &self.macos_voices)
            .field("elevenlabs_api_key", &self.elevenlabs_api_key.as_ref().map(|_| "***"))
            .field("elevenlabs_voices", &self.elevenlabs_voices)
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "***"))
            .field("google_access_token", &self.google_access_token.as_ref().map(|_| "***"))
            .field("google_voices", &self.google_voices)
            .field("google_model", &self.google_model)
            .field("chatterbox_voices", &self.chatterbox_voices)
            .field("sanitizer", &self.sanitizer.as_ref().map(|model| model.model().to_string()))
            .finish_non_exhaustive()
    }
}

pub(crate) fn for_speaker<T>(pair: &[T; 2], speaker: Speaker) -> &T {
    match speaker {
        Speaker::One => &pair[0],
        Speaker::Two => &pair[1],
    }
}

/// A backend that renders one turn per request.
#[async_trait]
pub(crate) trait TurnVoice: Send + Sync {
    async fn speak(&self, index: usize, utterance: &Utterance) -> Result<AudioClip, TtsError>;
}

/// Renders turns one at a time; any failure aborts the whole synthesis.
pub(crate) async fn synthesize_turns<V: TurnVoice + ?Sized>(
    voice: &V,
    utterances: &[Utterance],
    progress: ProgressFn<'_>,
) -> Result<Synthesis, TtsError> {
    if utterances.is_empty() {
        return Err(TtsError::NoUtterances);
    }
    let total = utterances.len();
    let mut units = Vec::with_capacity(total);

    for (index, utterance) in utterances.iter().enumerate() {
        let clip = voice.speak(index, utterance).await?;
        units.push(AudioUnit {
            clip,
            trailing_text: utterance.text.clone(),
        });
        progress(SynthesisProgress {
            done: index + 1,
            total,
        });
    }

    Ok(Synthesis {
        units,
        skipped_chunks: Vec::new(),
    })
}

/// Runs an external program and fails on a non-zero exit.
pub(crate) async fn run_command(command: &mut Command, program: &str) -> Result<Output, TtsError> {
    debug!(program, "Running voice command");
    let output = command
        .output()
        .await
        .map_err(|e| TtsError::io(program, e))?;
    if !output.status.success() {
        return Err(TtsError::Command {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Tone;

    #[async_trait]
    impl TurnVoice for Tone {
        async fn speak(&self, index: usize, _utterance: &Utterance) -> Result<AudioClip, TtsError> {
            if index == 2 {
                return Err(TtsError::Decode("boom".to_string()));
            }
            Ok(AudioClip::new(1000, vec![1; 10]))
        }
    }

    #[tokio::test]
    async fn test_synthesize_turns_reports_progress() {
        let utterances = vec![
            Utterance::new(Speaker::One, "Hi?"),
            Utterance::new(Speaker::Two, "Hello."),
        ];
        let mut seen = Vec::new();

        let synthesis = synthesize_turns(&Tone, &utterances, &mut |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(synthesis.units.len(), 2);
        assert_eq!(synthesis.units[0].trailing_text, "Hi?");
        assert_eq!(seen.last(), Some(&SynthesisProgress { done: 2, total: 2 }));
    }

    #[tokio::test]
    async fn test_synthesize_turns_aborts_on_failure() {
        let utterances = vec![Utterance::new(Speaker::One, "x"); 3];
        let result = synthesize_turns(&Tone, &utterances, &mut |_| {}).await;
        assert!(matches!(result, Err(TtsError::Decode(_))));
    }

    #[tokio::test]
    async fn test_synthesize_turns_rejects_empty_input() {
        let result = synthesize_turns(&Tone, &[], &mut |_| {}).await;
        assert!(matches!(result, Err(TtsError::NoUtterances)));
    }

    #[test]
    fn test_for_speaker_picks_pair_member() {
        let pair = ["a", "b"];
        assert_eq!(*for_speaker(&pair, Speaker::One), "a");
        assert_eq!(*for_speaker(&pair, Speaker::Two), "b");
    }

    #[test]
    fn test_config_debug_masks_secrets() {
        let config = TtsConfig {
            elevenlabs_api_key: Some("xi-secret".to_string()),
            google_access_token: Some("ya29.secret".to_string()),
            ..TtsConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("xi-secret"));
        assert!(!rendered.contains("ya29.secret"));
    }
}
