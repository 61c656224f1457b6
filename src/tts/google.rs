//! Multi-speaker synthesis through the Cloud Text-to-Speech REST API.
//!
//! Turns are grouped into chunks under the request size ceiling and each
//! chunk is one request voicing both speakers. A 400 response is treated as a
//! content-moderation rejection: the chunk is rewritten once by the sanitizer
//! model and retried, and skipped if the retry also fails.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{
    GOOGLE_TTS_BASE_URL, ProgressFn, SpeechBackend, Synthesis, SynthesisProgress, TtsConfig,
    TtsError,
};
use crate::audio::{AudioClip, AudioUnit, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_SAMPLE_RATE, chunk_utterances};
use crate::llm::LanguageModel;
use crate::transcript::{Speaker, Utterance, parse_speaker_lines, render_speaker_lines};

const SANITIZE_PROMPT: &str = include_str!("../prompts/sanitize_chunk.txt");
const SANITIZE_MAX_TOKENS: u32 = 4096;
const STYLE_PROMPT: &str = "A natural podcast conversation between two hosts";
const LANGUAGE_CODE: &str = "en-US";

enum Auth {
    ApiKey(String),
    Bearer(String),
}

/// Chunked two-speaker synthesis with moderation recovery.
pub struct GoogleCloudBackend {
    client: Client,
    auth: Auth,
    voices: [String; 2],
    model: String,
    base_url: String,
    max_chunk_bytes: usize,
    sanitizer: Option<Arc<dyn LanguageModel>>,
}

impl std::fmt::Debug for GoogleCloudBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCloudBackend")
            .field("voices", &self.voices)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_chunk_bytes", &self.max_chunk_bytes)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisInput<'a> {
    prompt: &'a str,
    multi_speaker_markup: MultiSpeakerMarkup<'a>,
}

#[derive(Debug, Serialize)]
struct MultiSpeakerMarkup<'a> {
    turns: Vec<Turn<'a>>,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    speaker: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'static str,
    model_name: &'a str,
    multi_speaker_voice_config: MultiSpeakerVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MultiSpeakerVoiceConfig<'a> {
    speaker_voice_configs: [SpeakerVoice<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeakerVoice<'a> {
    speaker_alias: &'static str,
    speaker_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

impl GoogleCloudBackend {
    /// # Errors
    ///
    /// Returns [`TtsError::MissingCredentials`] when neither an access token
    /// nor an API key is configured.
    pub fn from_config(config: &TtsConfig) -> Result<Self, TtsError> {
        let auth = match (&config.google_access_token, &config.google_api_key) {
            (Some(token), _) => Auth::Bearer(token.clone()),
            (None, Some(key)) => Auth::ApiKey(key.clone()),
            (None, None) => {
                return Err(TtsError::MissingCredentials {
                    backend: "google-cloud",
                    env_var: "GOOGLE_CLOUD_API_KEY or GOOGLE_CLOUD_ACCESS_TOKEN",
                });
            }
        };
        Ok(Self {
            client: Client::new(),
            auth,
            voices: config.google_voices.clone(),
            model: config.google_model.clone(),
            base_url: config.google_base_url.trim_end_matches('/').to_string(),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            sanitizer: config.sanitizer.clone(),
        })
    }

    #[must_use]
    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: usize) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }

    fn request_body<'a>(&'a self, chunk: &'a [Utterance]) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput {
                prompt: STYLE_PROMPT,
                multi_speaker_markup: MultiSpeakerMarkup {
                    turns: chunk
                        .iter()
                        .map(|utterance| Turn {
                            speaker: utterance.speaker.alias(),
                            text: &utterance.text,
                        })
                        .collect(),
                },
            },
            voice: VoiceSelection {
                language_code: LANGUAGE_CODE,
                model_name: &self.model,
                multi_speaker_voice_config: MultiSpeakerVoiceConfig {
                    speaker_voice_configs: [
                        SpeakerVoice {
                            speaker_alias: Speaker::One.alias(),
                            speaker_id: &self.voices[0],
                        },
                        SpeakerVoice {
                            speaker_alias: Speaker::Two.alias(),
                            speaker_id: &self.voices[1],
                        },
                    ],
                },
            },
            audio_config: AudioConfig {
                audio_encoding: "LINEAR16",
                sample_rate_hertz: DEFAULT_SAMPLE_RATE,
            },
        }
    }

    /// Sends one chunk. `number` is the 1-based chunk index.
    async fn synthesize_chunk(&self, number: usize, chunk: &[Utterance]) -> Result<AudioClip, TtsError> {
        let mut request = self
            .client
            .post(format!("{}/v1/text:synthesize", self.base_url))
            .json(&self.request_body(chunk));
        request = match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::ApiKey(key) => request.header("x-goog-api-key", key),
        };

        let resp = request
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST {
            let message = resp.text().await.unwrap_or_default();
            return Err(TtsError::Moderation {
                chunk: number,
                message,
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.json::<SynthesizeResponse>().await?;
        let bytes = STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| TtsError::Decode(e.to_string()))?;
        decode_linear16(&bytes)
    }

    /// Rewrites a rejected chunk through the sanitizer model. Falls back to
    /// the original turns when no model is configured, the call fails, or the
    /// answer has no `SpeakerN:` lines.
    async fn sanitize(&self, number: usize, chunk: &[Utterance]) -> Vec<Utterance> {
        let Some(model) = &self.sanitizer else {
            warn!(chunk = number, "No sanitizer model configured; retrying original text");
            return chunk.to_vec();
        };

        let prompt = SANITIZE_PROMPT.replace("{conversation}", &render_speaker_lines(chunk));
        match model.complete(&prompt, SANITIZE_MAX_TOKENS).await {
            Ok(answer) => {
                let rewritten = parse_speaker_lines(&answer);
                if rewritten.is_empty() {
                    warn!(chunk = number, "Sanitized text had no speaker lines; retrying original text");
                    chunk.to_vec()
                } else {
                    rewritten
                }
            }
            Err(error) => {
                warn!(chunk = number, %error, "Failed to sanitize content");
                chunk.to_vec()
            }
        }
    }
}

/// Decodes LINEAR16 audio, which arrives as a WAV file or as bare samples.
fn decode_linear16(bytes: &[u8]) -> Result<AudioClip, TtsError> {
    if bytes.starts_with(b"RIFF") {
        Ok(AudioClip::from_wav_bytes(bytes)?)
    } else {
        Ok(AudioClip::from_pcm_s16le(bytes, DEFAULT_SAMPLE_RATE)?)
    }
}

fn unit_for(clip: AudioClip, chunk: &[Utterance]) -> AudioUnit {
    AudioUnit {
        clip,
        trailing_text: chunk
            .last()
            .map(|utterance| utterance.text.clone())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl SpeechBackend for GoogleCloudBackend {
    fn name(&self) -> &'static str {
        "google-cloud"
    }

    fn model_label(&self) -> String {
        self.model.clone()
    }

    #[instrument(skip(self, utterances, progress), fields(turns = utterances.len(), model = %self.model))]
    async fn synthesize(
        &self,
        utterances: &[Utterance],
        progress: ProgressFn<'_>,
    ) -> Result<Synthesis, TtsError> {
        if utterances.is_empty() {
            return Err(TtsError::NoUtterances);
        }
        let chunks = chunk_utterances(utterances, self.max_chunk_bytes);
        let total = chunks.len();
        info!(
            segments = utterances.len(),
            chunks = total,
            person1 = %self.voices[0],
            person2 = %self.voices[1],
            "Generating audio with Google Cloud TTS"
        );

        let mut synthesis = Synthesis::default();
        for (index, chunk) in chunks.iter().enumerate() {
            let number = index + 1;
            match self.synthesize_chunk(number, chunk).await {
                Ok(clip) => synthesis.units.push(unit_for(clip, chunk)),
                Err(TtsError::Moderation { message, .. }) => {
                    warn!(chunk = number, %message, "Content moderation triggered, attempting to sanitize");
                    let sanitized = self.sanitize(number, chunk).await;
                    match self.synthesize_chunk(number, &sanitized).await {
                        Ok(clip) => {
                            info!(chunk = number, "Sanitized version succeeded");
                            synthesis.units.push(unit_for(clip, &sanitized));
                        }
                        Err(error) => {
                            warn!(chunk = number, %error, "Still failed after sanitization, skipping");
                            synthesis.skipped_chunks.push(number);
                        }
                    }
                }
                Err(other) => return Err(other),
            }
            progress(SynthesisProgress {
                done: number,
                total,
            });
        }

        if !synthesis.skipped_chunks.is_empty() {
            warn!(
                skipped = ?synthesis.skipped_chunks,
                "Skipped chunk(s) due to content moderation"
            );
        }
        if synthesis.units.is_empty() {
            return Err(TtsError::AllChunksFailed { total });
        }
        Ok(synthesis)
    }
}
