//! ElevenLabs REST voices, one request per turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use super::{
    ProgressFn, SpeechBackend, Synthesis, TtsConfig, TtsError, TurnVoice, for_speaker,
    synthesize_turns,
};
use crate::audio::{AudioClip, DEFAULT_SAMPLE_RATE};
use crate::transcript::Utterance;

/// Text-to-speech client for two ElevenLabs voices.
pub struct ElevenLabsBackend {
    client: Client,
    api_key: String,
    voices: [String; 2],
    model: String,
    base_url: String,
}

impl std::fmt::Debug for ElevenLabsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsBackend")
            .field("voices", &self.voices)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsBackend {
    pub fn new(api_key: impl Into<String>, voices: [String; 2], model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            voices,
            model: model.into(),
            base_url: super::ELEVENLABS_BASE_URL.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// # Errors
    ///
    /// Returns [`TtsError::MissingCredentials`] without an API key.
    pub fn from_config(config: &TtsConfig) -> Result<Self, TtsError> {
        let key = config
            .elevenlabs_api_key
            .clone()
            .ok_or(TtsError::MissingCredentials {
                backend: "elevenlabs",
                env_var: "ELEVENLABS_API_KEY",
            })?;
        Ok(Self::new(key, config.elevenlabs_voices.clone(), config.elevenlabs_model.clone())
            .with_base_url(config.elevenlabs_base_url.clone()))
    }
}

#[async_trait]
impl TurnVoice for ElevenLabsBackend {
    async fn speak(&self, _index: usize, utterance: &Utterance) -> Result<AudioClip, TtsError> {
        let voice = for_speaker(&self.voices, utterance.speaker);
        let resp = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{voice}?output_format=pcm_{DEFAULT_SAMPLE_RATE}",
                self.base_url
            ))
            .header("xi-api-key", &self.api_key)
            .json(&SpeechRequest {
                text: &utterance.text,
                model_id: &self.model,
            })
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(TtsError::Api { status, message });
        }

        let bytes = resp.bytes().await?;
        AudioClip::from_pcm_s16le(&bytes, DEFAULT_SAMPLE_RATE).map_err(TtsError::from)
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn model_label(&self) -> String {
        self.model.clone()
    }

    #[instrument(skip(self, utterances, progress), fields(turns = utterances.len()))]
    async fn synthesize(
        &self,
        utterances: &[Utterance],
        progress: ProgressFn<'_>,
    ) -> Result<Synthesis, TtsError> {
        info!(model = %self.model, "Generating audio with ElevenLabs");
        synthesize_turns(self, utterances, progress).await
    }
}
