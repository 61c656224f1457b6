//! Language-model providers behind one completion interface.
//!
//! Models are named `provider/model`, e.g. `anthropic/claude-haiku-4-5` or
//! `gemini/gemini-2.5-flash`. [`build_model`] turns such a name plus the
//! configured credentials into a shared [`LanguageModel`].

mod anthropic;
mod gemini;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Default Anthropic API origin.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default Gemini API origin.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors from language-model providers.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("{provider} returned no text")]
    EmptyResponse { provider: &'static str },

    #[error("missing API key for {provider}\n  Suggestion: set {env_var} in the environment or .env")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("invalid model '{0}': expected provider/model with provider anthropic or gemini")]
    InvalidModel(String),
}

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider label, e.g. `anthropic`.
    fn provider(&self) -> &'static str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Completes a single user prompt.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Gemini,
}

/// A parsed `provider/model` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
}

impl FromStr for ModelSpec {
    type Err = LlmError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let Some((provider, model)) = raw.trim().split_once('/') else {
            return Err(LlmError::InvalidModel(raw.to_string()));
        };
        let provider = match provider {
            "anthropic" => Provider::Anthropic,
            "gemini" | "google" => Provider::Gemini,
            _ => return Err(LlmError::InvalidModel(raw.to_string())),
        };
        if model.is_empty() {
            return Err(LlmError::InvalidModel(raw.to_string()));
        }
        Ok(Self {
            provider,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider = match self.provider {
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        };
        write!(f, "{provider}/{}", self.model)
    }
}

/// API keys and origins for every provider.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "***"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("gemini_base_url", &self.gemini_base_url)
            .finish()
    }
}

/// Builds a model client for `spec`.
///
/// # Errors
///
/// Returns [`LlmError::MissingApiKey`] when the provider's key is not configured.
pub fn build_model(
    spec: &ModelSpec,
    credentials: &ProviderCredentials,
) -> Result<Arc<dyn LanguageModel>, LlmError> {
    match spec.provider {
        Provider::Anthropic => {
            let key = credentials
                .anthropic_api_key
                .clone()
                .ok_or(LlmError::MissingApiKey {
                    provider: "anthropic",
                    env_var: "ANTHROPIC_API_KEY",
                })?;
            let mut client = AnthropicClient::new(key, spec.model.clone());
            if let Some(base) = &credentials.anthropic_base_url {
                client = client.with_base_url(base.clone());
            }
            Ok(Arc::new(client))
        }
        Provider::Gemini => {
            let key = credentials
                .gemini_api_key
                .clone()
                .ok_or(LlmError::MissingApiKey {
                    provider: "gemini",
                    env_var: "GEMINI_API_KEY",
                })?;
            let mut client = GeminiClient::new(key, spec.model.clone());
            if let Some(base) = &credentials.gemini_base_url {
                client = client.with_base_url(base.clone());
            }
            Ok(Arc::new(client))
        }
    }
}
