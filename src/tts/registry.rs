//! Name to factory registry for speech backends.

use std::collections::BTreeMap;

use tracing::debug;

use super::{
    ChatterboxBackend, ElevenLabsBackend, GoogleCloudBackend, MacosBackend, SpeechBackend,
    TtsConfig, TtsError,
};

/// Builds a backend from the voice settings.
pub type BackendFactory =
    Box<dyn Fn(&TtsConfig) -> Result<Box<dyn SpeechBackend>, TtsError> + Send + Sync>;

/// Backends addressable by name (`macos`, `elevenlabs`, ...).
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<&'static str, BackendFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl BackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any earlier entry.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        debug!(backend = name, "Registering TTS backend");
        self.factories.insert(name, factory);
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds the backend registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TtsError::UnknownBackend`] for unregistered names, or the
    /// factory's own error (e.g. missing credentials).
    pub fn build(&self, name: &str, config: &TtsConfig) -> Result<Box<dyn SpeechBackend>, TtsError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TtsError::UnknownBackend {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;
        factory(config)
    }
}

/// Registry holding every built-in backend.
#[must_use]
pub fn build_default_backend_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("macos", Box::new(macos));
    registry.register("elevenlabs", Box::new(elevenlabs));
    registry.register("chatterbox", Box::new(chatterbox));
    registry.register("google-cloud", Box::new(google_cloud));
    registry
}

fn macos(config: &TtsConfig) -> Result<Box<dyn SpeechBackend>, TtsError> {
    Ok(Box::new(MacosBackend::from_config(config)))
}

fn elevenlabs(config: &TtsConfig) -> Result<Box<dyn SpeechBackend>, TtsError> {
    Ok(Box::new(ElevenLabsBackend::from_config(config)?))
}

fn chatterbox(config: &TtsConfig) -> Result<Box<dyn SpeechBackend>, TtsError> {
    Ok(Box::new(ChatterboxBackend::from_config(config)))
}

fn google_cloud(config: &TtsConfig) -> Result<Box<dyn SpeechBackend>, TtsError> {
    Ok(Box::new(GoogleCloudBackend::from_config(config)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_names() {
        let registry = build_default_backend_registry();
        assert_eq!(
            registry.names(),
            vec!["chatterbox", "elevenlabs", "google-cloud", "macos"]
        );
    }

    #[test]
    fn test_unknown_backend_lists_available() {
        let registry = build_default_backend_registry();
        let err = registry
            .build("festival", &TtsConfig::default())
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("festival"));
        assert!(msg.contains("google-cloud"));
    }

    #[test]
    fn test_build_reports_missing_credentials() {
        let registry = build_default_backend_registry();
        let err = registry
            .build("elevenlabs", &TtsConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, TtsError::MissingCredentials { .. }));
    }

    #[test]
    fn test_build_known_backend() {
        let registry = build_default_backend_registry();
        let backend = registry.build("macos", &TtsConfig::default()).unwrap();
        assert_eq!(backend.name(), "macos");
        assert_eq!(backend.model_label(), "macos_say");
    }

    #[test]
    fn test_register_custom_backend() {
        let mut registry = BackendRegistry::new();
        registry.register("quiet", Box::new(macos));
        assert!(registry.contains("quiet"));
        assert!(!registry.contains("macos"));
    }
}
