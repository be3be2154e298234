//! Core types for speech synthesis

use serde::{Deserialize, Serialize};

/// Lowest speaking rate multiplier the rate controls will go down to
pub const MIN_RATE: f32 = 0.5;
/// Highest speaking rate multiplier the rate controls will go up to
pub const MAX_RATE: f32 = 3.0;
/// Increment applied by a single rate-adjustment step
pub const RATE_STEP: f32 = 0.1;

/// Clamp a rate multiplier into `[MIN_RATE, MAX_RATE]` and round it to one
/// decimal place.
///
/// All rates stored in a session record pass through here, so repeated
/// stepping stays on exact tenths and comparing two rates for equality is
/// well defined.
pub fn clamp_rate(rate: f32) -> f32 {
    (rate.clamp(MIN_RATE, MAX_RATE) * 10.0).round() / 10.0
}

/// Per-utterance speech parameters handed to the engine
///
/// Built from [`SpeechSettings`] at speak time; a rate adjustment mutates
/// `rate` in place on the session's copy and re-speaks with the rest
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams {
    /// Voice to speak with; `None` selects the engine's default voice
    pub voice_name: Option<String>,
    /// Speaking rate multiplier (1.0 is normal)
    pub rate: f32,
    /// Voice pitch (0.0-2.0, 1.0 is normal)
    pub pitch: f32,
    /// Volume (0.0-1.0)
    pub volume: f32,
}

impl SpeechParams {
    /// Resolve engine parameters from a settings record.
    ///
    /// An empty `voice_name` means "engine default"; numeric fields are
    /// sanitized first so a corrupted settings file falls back to defaults
    /// instead of producing NaN parameters.
    pub fn from_settings(settings: &SpeechSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            voice_name: if settings.voice_name.is_empty() {
                None
            } else {
                Some(settings.voice_name)
            },
            rate: settings.rate,
            pitch: settings.pitch,
            volume: settings.volume,
        }
    }
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            voice_name: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// The persisted settings record shared across every speaksel frontend
///
/// Field names on disk are camelCase to match the wire protocol. Missing
/// keys deserialize to their defaults, which is what lets the store
/// backfill a partial file without overwriting anything present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechSettings {
    /// Preferred voice; empty string means the engine default
    pub voice_name: String,
    /// Speaking rate multiplier applied to new utterances
    pub rate: f32,
    /// Voice pitch
    pub pitch: f32,
    /// Volume
    pub volume: f32,
    /// Longest text (in characters) a speak request will read; 0 = unlimited
    pub max_text_length: usize,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            voice_name: String::new(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            max_text_length: 0,
        }
    }
}

impl SpeechSettings {
    /// Return a copy with every numeric field forced into its valid range.
    ///
    /// Non-finite values (a hand-edited settings file can contain anything
    /// serde_json will parse) fall back to the defaults; finite values are
    /// clamped. Applied on every read path, never written back.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            voice_name: self.voice_name.clone(),
            rate: if self.rate.is_finite() {
                clamp_rate(self.rate)
            } else {
                defaults.rate
            },
            pitch: if self.pitch.is_finite() {
                self.pitch.clamp(0.0, 2.0)
            } else {
                defaults.pitch
            },
            volume: if self.volume.is_finite() {
                self.volume.clamp(0.0, 1.0)
            } else {
                defaults.volume
            },
            max_text_length: self.max_text_length,
        }
    }
}

/// Voice information as reported to protocol clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Engine voice identifier
    pub voice_name: String,
    /// Language code (e.g. "en-US")
    pub lang: String,
    /// Whether synthesis happens locally rather than via a network service
    pub local_service: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_bounds() {
        assert_eq!(clamp_rate(0.1), MIN_RATE);
        assert_eq!(clamp_rate(9.9), MAX_RATE);
        assert_eq!(clamp_rate(1.0), 1.0);
    }

    #[test]
    fn clamp_rate_stays_on_tenths() {
        // Seven upward steps from 1.0 must land exactly on 1.7.
        let mut rate = 1.0f32;
        for _ in 0..7 {
            rate = clamp_rate(rate + RATE_STEP);
        }
        assert_eq!(rate, 1.7);

        let mut rate = 1.0f32;
        for _ in 0..5 {
            rate = clamp_rate(rate - RATE_STEP);
        }
        assert_eq!(rate, MIN_RATE);
    }

    #[test]
    fn params_from_settings_resolves_default_voice() {
        let params = SpeechParams::from_settings(&SpeechSettings::default());
        assert!(params.voice_name.is_none());
        assert_eq!(params.rate, 1.0);

        let params = SpeechParams::from_settings(&SpeechSettings {
            voice_name: "en-gb".into(),
            rate: 2.0,
            ..Default::default()
        });
        assert_eq!(params.voice_name.as_deref(), Some("en-gb"));
        assert_eq!(params.rate, 2.0);
    }

    #[test]
    fn sanitized_replaces_bad_numbers() {
        let settings = SpeechSettings {
            rate: f32::NAN,
            pitch: 7.5,
            volume: -2.0,
            ..Default::default()
        };
        let clean = settings.sanitized();
        assert_eq!(clean.rate, 1.0);
        assert_eq!(clean.pitch, 2.0);
        assert_eq!(clean.volume, 0.0);
    }

    #[test]
    fn settings_backfill_missing_keys() {
        let settings: SpeechSettings = serde_json::from_str(r#"{"rate": 1.5}"#).unwrap();
        assert_eq!(settings.rate, 1.5);
        assert_eq!(settings.voice_name, "");
        assert_eq!(settings.max_text_length, 0);
    }
}
