//! Settings resolution: defaults, config file, `.env`/environment, CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use threadcast_core::audio::AudioFormat;
use threadcast_core::fetch::{
    ClientConfig, DEFAULT_MAX_RETRIES, DEFAULT_OAUTH_BASE, DEFAULT_USER_AGENT, DEFAULT_WEB_BASE,
    RetryPolicy,
};
use threadcast_core::ingest::{DEFAULT_COMMENT_DELAY, DEFAULT_GROUP_DELAY};
use threadcast_core::llm::{LanguageModel, ModelSpec, ProviderCredentials, build_model};
use threadcast_core::tts::{
    DEFAULT_CHATTERBOX_COMMAND, DEFAULT_CHATTERBOX_VOICES, DEFAULT_ELEVENLABS_MODEL,
    DEFAULT_ELEVENLABS_VOICES, DEFAULT_GOOGLE_MODEL, DEFAULT_GOOGLE_VOICES, DEFAULT_MACOS_RATE,
    DEFAULT_MACOS_VOICES, ELEVENLABS_BASE_URL, GOOGLE_TTS_BASE_URL, TtsConfig,
};
use tracing::warn;

const APP_DIR: &str = "threadcast";

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerbositySetting {
    #[default]
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    /// `EnvFilter` directive for this setting.
    #[must_use]
    pub fn filter_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Effective configuration for one invocation.
#[derive(Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub transcript_dir: PathBuf,
    pub test_audio_dir: PathBuf,
    /// `None` disables the generation log.
    pub generation_log: Option<PathBuf>,

    pub user_agent: String,
    pub reddit_base_url: String,
    pub reddit_oauth_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub comment_delay_ms: u64,
    pub group_delay_ms: u64,

    pub tts_backend: String,
    pub transcript_model: String,
    pub scoring_model: String,
    /// Model used to rewrite moderation-rejected chunks; `None` disables rewriting.
    pub sanitize_model: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub elevenlabs_base_url: String,
    pub google_tts_base_url: String,

    pub macos_voices: [String; 2],
    pub macos_rate: u32,
    pub elevenlabs_voices: [String; 2],
    pub elevenlabs_model: String,
    pub google_cloud_voices: [String; 2],
    pub google_cloud_model: String,
    pub chatterbox_voices: [PathBuf; 2],
    pub chatterbox_command: String,

    pub audio_format: AudioFormat,
    /// Player for `test-voices --play`; `None` picks the first one found.
    pub player_command: Option<String>,
    pub seed: Option<u64>,
    pub verbosity: VerbositySetting,

    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub google_cloud_api_key: Option<String>,
    pub google_cloud_access_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/threadcast.db"),
            output_dir: PathBuf::from("data/audio"),
            transcript_dir: PathBuf::from("data/transcripts"),
            test_audio_dir: PathBuf::from("data/voice_tests"),
            generation_log: Some(PathBuf::from("data/generation_log.csv")),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            reddit_base_url: DEFAULT_WEB_BASE.to_string(),
            reddit_oauth_url: DEFAULT_OAUTH_BASE.to_string(),
            request_timeout_secs: 15,
            max_retries: DEFAULT_MAX_RETRIES,
            comment_delay_ms: millis(DEFAULT_COMMENT_DELAY),
            group_delay_ms: millis(DEFAULT_GROUP_DELAY),
            tts_backend: "macos".to_string(),
            transcript_model: "anthropic/claude-sonnet-4-5".to_string(),
            scoring_model: "anthropic/claude-haiku-4-5".to_string(),
            sanitize_model: Some("gemini/gemini-2.5-flash".to_string()),
            anthropic_base_url: None,
            gemini_base_url: None,
            elevenlabs_base_url: ELEVENLABS_BASE_URL.to_string(),
            google_tts_base_url: GOOGLE_TTS_BASE_URL.to_string(),
            macos_voices: DEFAULT_MACOS_VOICES.map(String::from),
            macos_rate: DEFAULT_MACOS_RATE,
            elevenlabs_voices: DEFAULT_ELEVENLABS_VOICES.map(String::from),
            elevenlabs_model: DEFAULT_ELEVENLABS_MODEL.to_string(),
            google_cloud_voices: DEFAULT_GOOGLE_VOICES.map(String::from),
            google_cloud_model: DEFAULT_GOOGLE_MODEL.to_string(),
            chatterbox_voices: DEFAULT_CHATTERBOX_VOICES.map(PathBuf::from),
            chatterbox_command: DEFAULT_CHATTERBOX_COMMAND.to_string(),
            audio_format: AudioFormat::Mp3,
            player_command: None,
            seed: None,
            verbosity: VerbositySetting::Default,
            anthropic_api_key: None,
            gemini_api_key: None,
            elevenlabs_api_key: None,
            google_cloud_api_key: None,
            google_cloud_access_token: None,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("database_path", &self.database_path)
            .field("output_dir", &self.output_dir)
            .field("tts_backend", &self.tts_backend)
            .field("transcript_model", &self.transcript_model)
            .field("scoring_model", &self.scoring_model)
            .field("audio_format", &self.audio_format)
            .field("anthropic_api_key", &mask(self.anthropic_api_key.as_ref()))
            .field("gemini_api_key", &mask(self.gemini_api_key.as_ref()))
            .field("elevenlabs_api_key", &mask(self.elevenlabs_api_key.as_ref()))
            .field("google_cloud_api_key", &mask(self.google_cloud_api_key.as_ref()))
            .finish_non_exhaustive()
    }
}

fn mask(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "***")
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Settings plus where they came from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/threadcast/config.toml`
/// 2. `$HOME/.config/threadcast/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads settings from defaults, the config file and the process environment.
///
/// An explicit `config_path` must exist; the default path is optional.
pub fn load_settings(config_path: Option<&Path>) -> Result<LoadedSettings> {
    let (path, required) = match config_path {
        Some(path) => (Some(path.to_path_buf()), true),
        None => (resolve_default_config_path(), false),
    };

    let (mut settings, loaded_from_file) = match path.as_deref() {
        Some(path) if path.exists() => (load_file_settings(path)?, true),
        Some(path) if required => bail!("Config file '{}' does not exist", path.display()),
        _ => (Settings::default(), false),
    };

    settings.apply_env(|name| env::var(name).ok());
    Ok(LoadedSettings {
        settings,
        path,
        loaded_from_file,
    })
}

fn load_file_settings(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

impl Settings {
    /// Applies API keys and the database override from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(value);
        }
        if let Some(value) = non_empty("GEMINI_API_KEY") {
            self.gemini_api_key = Some(value);
        }
        if let Some(value) = non_empty("ELEVENLABS_API_KEY") {
            self.elevenlabs_api_key = Some(value);
        }
        if let Some(value) = non_empty("GOOGLE_CLOUD_API_KEY") {
            self.google_cloud_api_key = Some(value);
        }
        if let Some(value) = non_empty("GOOGLE_CLOUD_ACCESS_TOKEN") {
            self.google_cloud_access_token = Some(value);
        }
        if let Some(value) = non_empty("THREADCAST_DATABASE_PATH") {
            self.database_path = PathBuf::from(value);
        }
    }

    /// Validates values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if !(1..=3600).contains(&self.request_timeout_secs) {
            bail!(
                "Invalid config value for `request_timeout_secs`: {}. Expected range: 1..=3600",
                self.request_timeout_secs
            );
        }
        if self.max_retries > 10 {
            bail!(
                "Invalid config value for `max_retries`: {}. Expected range: 0..=10",
                self.max_retries
            );
        }
        for (key, value) in [
            ("comment_delay_ms", self.comment_delay_ms),
            ("group_delay_ms", self.group_delay_ms),
        ] {
            if value > 600_000 {
                bail!("Invalid config value for `{key}`: {value}. Expected range: 0..=600000");
            }
        }
        if !(80..=400).contains(&self.macos_rate) {
            bail!(
                "Invalid config value for `macos_rate`: {}. Expected range: 80..=400",
                self.macos_rate
            );
        }
        for (key, model) in [
            ("transcript_model", Some(&self.transcript_model)),
            ("scoring_model", Some(&self.scoring_model)),
            ("sanitize_model", self.sanitize_model.as_ref()),
        ] {
            if let Some(model) = model {
                model
                    .parse::<ModelSpec>()
                    .with_context(|| format!("Invalid config value for `{key}`"))?;
            }
        }
        Ok(())
    }

    pub fn provider_credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            anthropic_api_key: self.anthropic_api_key.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
            anthropic_base_url: self.anthropic_base_url.clone(),
            gemini_base_url: self.gemini_base_url.clone(),
        }
    }

    /// Builds the model named by `name` (`provider/model`).
    pub fn model(&self, name: &str) -> Result<Arc<dyn LanguageModel>> {
        let spec: ModelSpec = name.parse()?;
        Ok(build_model(&spec, &self.provider_credentials())?)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            user_agent: self.user_agent.clone(),
            web_base: self.reddit_base_url.clone(),
            oauth_base: self.reddit_oauth_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry: RetryPolicy::with_max_retries(self.max_retries),
        }
    }

    /// Voice settings for every backend. A sanitizer model that cannot be
    /// built is logged and left out.
    pub fn tts_config(&self) -> TtsConfig {
        let sanitizer = self
            .sanitize_model
            .as_deref()
            .and_then(|name| match self.model(name) {
                Ok(model) => Some(model),
                Err(error) => {
                    warn!(model = name, %error, "Chunk sanitizer unavailable");
                    None
                }
            });

        TtsConfig {
            macos_voices: self.macos_voices.clone(),
            macos_rate: self.macos_rate,
            elevenlabs_api_key: self.elevenlabs_api_key.clone(),
            elevenlabs_voices: self.elevenlabs_voices.clone(),
            elevenlabs_model: self.elevenlabs_model.clone(),
            elevenlabs_base_url: self.elevenlabs_base_url.clone(),
            google_api_key: self.google_cloud_api_key.clone(),
            google_access_token: self.google_cloud_access_token.clone(),
            google_voices: self.google_cloud_voices.clone(),
            google_model: self.google_cloud_model.clone(),
            google_base_url: self.google_tts_base_url.clone(),
            chatterbox_voices: self.chatterbox_voices.clone(),
            chatterbox_command: self.chatterbox_command.clone(),
            sanitizer,
            seed: self.seed,
        }
    }

    /// `key = value` lines for `config show`; secrets are reported as set/unset.
    pub fn display_lines(&self) -> Vec<(&'static str, String)> {
        let path = |p: &Path| p.display().to_string();
        let opt = |value: Option<&String>| value.cloned().unwrap_or_default();
        let secret = |value: Option<&String>| {
            if value.is_some() { "set" } else { "unset" }.to_string()
        };
        vec![
            ("database_path", path(&self.database_path)),
            ("output_dir", path(&self.output_dir)),
            ("transcript_dir", path(&self.transcript_dir)),
            ("test_audio_dir", path(&self.test_audio_dir)),
            (
                "generation_log",
                self.generation_log.as_deref().map(path).unwrap_or_default(),
            ),
            ("user_agent", self.user_agent.clone()),
            ("reddit_base_url", self.reddit_base_url.clone()),
            ("reddit_oauth_url", self.reddit_oauth_url.clone()),
            ("request_timeout_secs", self.request_timeout_secs.to_string()),
            ("max_retries", self.max_retries.to_string()),
            ("comment_delay_ms", self.comment_delay_ms.to_string()),
            ("group_delay_ms", self.group_delay_ms.to_string()),
            ("tts_backend", self.tts_backend.clone()),
            ("transcript_model", self.transcript_model.clone()),
            ("scoring_model", self.scoring_model.clone()),
            ("sanitize_model", opt(self.sanitize_model.as_ref())),
            ("macos_voice_1", self.macos_voices[0].clone()),
            ("macos_voice_2", self.macos_voices[1].clone()),
            ("macos_rate", self.macos_rate.to_string()),
            ("elevenlabs_voice_1", self.elevenlabs_voices[0].clone()),
            ("elevenlabs_voice_2", self.elevenlabs_voices[1].clone()),
            ("elevenlabs_model", self.elevenlabs_model.clone()),
            ("google_cloud_voice_1", self.google_cloud_voices[0].clone()),
            ("google_cloud_voice_2", self.google_cloud_voices[1].clone()),
            ("google_cloud_model", self.google_cloud_model.clone()),
            ("chatterbox_voice_1", path(&self.chatterbox_voices[0])),
            ("chatterbox_voice_2", path(&self.chatterbox_voices[1])),
            ("chatterbox_command", self.chatterbox_command.clone()),
            ("audio_format", self.audio_format.extension().to_string()),
            ("player_command", opt(self.player_command.as_ref())),
            (
                "seed",
                self.seed.map(|seed| seed.to_string()).unwrap_or_default(),
            ),
            ("verbosity", self.verbosity.as_str().to_string()),
            ("anthropic_api_key", secret(self.anthropic_api_key.as_ref())),
            ("gemini_api_key", secret(self.gemini_api_key.as_ref())),
            ("elevenlabs_api_key", secret(self.elevenlabs_api_key.as_ref())),
            ("google_cloud_api_key", secret(self.google_cloud_api_key.as_ref())),
            (
                "google_cloud_access_token",
                secret(self.google_cloud_access_token.as_ref()),
            ),
        ]
    }
}

fn parse_config_str(raw: &str) -> Result<Settings> {
    let mut cfg = Settings::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);
        let string = || parse_string_literal(value).with_context(invalid);
        let integer = || parse_integer_u64(value).with_context(invalid);

        match key {
            "database_path" => cfg.database_path = PathBuf::from(string()?),
            "output_dir" => cfg.output_dir = PathBuf::from(string()?),
            "transcript_dir" => cfg.transcript_dir = PathBuf::from(string()?),
            "test_audio_dir" => cfg.test_audio_dir = PathBuf::from(string()?),
            "generation_log" => {
                let parsed = string()?;
                cfg.generation_log = (!parsed.is_empty()).then(|| PathBuf::from(parsed));
            }
            "user_agent" => cfg.user_agent = string()?,
            "reddit_base_url" => cfg.reddit_base_url = string()?,
            "reddit_oauth_url" => cfg.reddit_oauth_url = string()?,
            "request_timeout_secs" => cfg.request_timeout_secs = integer()?,
            "max_retries" => {
                cfg.max_retries = u32::try_from(integer()?)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
            }
            "comment_delay_ms" => cfg.comment_delay_ms = integer()?,
            "group_delay_ms" => cfg.group_delay_ms = integer()?,
            "tts_backend" => cfg.tts_backend = string()?,
            "transcript_model" => cfg.transcript_model = string()?,
            "scoring_model" => cfg.scoring_model = string()?,
            "sanitize_model" => {
                let parsed = string()?;
                cfg.sanitize_model = (!parsed.is_empty()).then_some(parsed);
            }
            "anthropic_base_url" => cfg.anthropic_base_url = Some(string()?),
            "gemini_base_url" => cfg.gemini_base_url = Some(string()?),
            "elevenlabs_base_url" => cfg.elevenlabs_base_url = string()?,
            "google_tts_base_url" => cfg.google_tts_base_url = string()?,
            "macos_voice_1" => cfg.macos_voices[0] = string()?,
            "macos_voice_2" => cfg.macos_voices[1] = string()?,
            "macos_rate" => {
                cfg.macos_rate = u32::try_from(integer()?)
                    .map_err(|_| anyhow::anyhow!("macos_rate out of range for u32"))?;
            }
            "elevenlabs_voice_1" => cfg.elevenlabs_voices[0] = string()?,
            "elevenlabs_voice_2" => cfg.elevenlabs_voices[1] = string()?,
            "elevenlabs_model" => cfg.elevenlabs_model = string()?,
            "google_cloud_voice_1" => cfg.google_cloud_voices[0] = string()?,
            "google_cloud_voice_2" => cfg.google_cloud_voices[1] = string()?,
            "google_cloud_model" => cfg.google_cloud_model = string()?,
            "chatterbox_voice_1" => cfg.chatterbox_voices[0] = PathBuf::from(string()?),
            "chatterbox_voice_2" => cfg.chatterbox_voices[1] = PathBuf::from(string()?),
            "chatterbox_command" => cfg.chatterbox_command = string()?,
            "audio_format" => {
                cfg.audio_format = string()?
                    .parse()
                    .map_err(|message: String| anyhow::anyhow!(message))
                    .with_context(invalid)?;
            }
            "player_command" => {
                let parsed = string()?;
                cfg.player_command = (!parsed.is_empty()).then_some(parsed);
            }
            "seed" => cfg.seed = Some(integer()?),
            "verbosity" => {
                let parsed = string()?;
                cfg.verbosity = parse_verbosity(&parsed).with_context(|| {
                    format!(
                        "Invalid `verbosity` value '{}' on line {}",
                        parsed,
                        line_index + 1
                    )
                })?;
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
