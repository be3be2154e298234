//! Store implementations

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use speaksel_tts::SpeechSettings;
use tracing::{debug, info};

use crate::{SettingsError, SettingsStore};

/// Settings persisted as a camelCase JSON file.
///
/// Keys missing from the file deserialize to their defaults, so a file
/// written by an older build (or edited by hand) is backfilled rather than
/// rejected. Writes replace the whole record via temp-file-and-rename;
/// concurrent writers race last-write-wins, which only ever affects the
/// *next* utterance.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the settings and write the full record back.
    ///
    /// Run once at startup: afterwards every key exists on disk with its
    /// default or pre-existing value. Values already present are never
    /// overwritten.
    pub async fn ensure_initialized(&self) -> Result<SpeechSettings, SettingsError> {
        let settings = self.load().await?;
        self.store(&settings).await?;
        info!("settings initialized at {}", self.path.display());
        Ok(settings)
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<SpeechSettings, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {}, using defaults", self.path.display());
                Ok(SpeechSettings::default())
            }
            Err(e) => Err(SettingsError::Io(e)),
        }
    }

    async fn store(&self, settings: &SpeechSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
///
/// Supports injecting a load failure to exercise the store-error path of
/// callers.
#[derive(Default)]
pub struct MemoryStore {
    settings: RwLock<SpeechSettings>,
    fail_loads: RwLock<bool>,
}

impl MemoryStore {
    pub fn new(settings: SpeechSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            fail_loads: RwLock::new(false),
        }
    }

    /// Make every subsequent `load` fail until cleared.
    pub fn set_fail_loads(&self, fail: bool) {
        *self.fail_loads.write() = fail;
    }

    /// Replace the record directly, bypassing the trait.
    pub fn replace(&self, settings: SpeechSettings) {
        *self.settings.write() = settings;
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<SpeechSettings, SettingsError> {
        if *self.fail_loads.read() {
            return Err(SettingsError::Unavailable("injected failure".to_string()));
        }
        Ok(self.settings.read().clone())
    }

    async fn store(&self, settings: &SpeechSettings) -> Result<(), SettingsError> {
        *self.settings.write() = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("settings.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let settings = store.load().await.unwrap();
        assert_eq!(settings, SpeechSettings::default());
    }

    #[tokio::test]
    async fn round_trip_preserves_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let settings = SpeechSettings {
            voice_name: "en-gb".into(),
            rate: 1.4,
            pitch: 0.9,
            volume: 0.7,
            max_text_length: 500,
        };
        store.store(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn ensure_initialized_backfills_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"rate": 2.5}"#).unwrap();

        let store = JsonFileStore::new(&path);
        let settings = store.ensure_initialized().await.unwrap();

        // The existing key survives, the missing ones gain defaults.
        assert_eq!(settings.rate, 2.5);
        assert_eq!(settings.voice_name, "");

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("voiceName"));
        assert!(on_disk.contains("maxTextLength"));
        assert!(on_disk.contains("2.5"));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json {{{").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(SettingsError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_failure_injection() {
        let store = MemoryStore::new(SpeechSettings::default());
        assert!(store.load().await.is_ok());

        store.set_fail_loads(true);
        assert!(matches!(
            store.load().await,
            Err(SettingsError::Unavailable(_))
        ));

        store.set_fail_loads(false);
        assert!(store.load().await.is_ok());
    }
}
