//! Request/response wire protocol for the session controller
//!
//! One JSON object per request, at most one JSON object in response. A
//! request may be answered later than the requests that followed it (the
//! rate-change restart answers after its settle delay), so clients must
//! not assume response ordering.

use serde::{Deserialize, Serialize};
use speaksel_tts::VoiceInfo;

/// Requests a frontend can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Speak a text selection, replacing any current speech
    Speak { text: String },
    /// Stop any current speech
    Stop,
    /// Nudge the rate of in-progress speech one step up or down
    AdjustRate { direction: RateDirection },
    /// List the engine's voices
    GetVoices,
}

/// Direction of a rate adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateDirection {
    Up,
    Down,
}

/// Any response the controller can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Session(SessionResponse),
    Voices(VoicesResponse),
}

/// Responses to speak/stop/adjustRate, tagged by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionResponse {
    /// The speak call was accepted and queued (not necessarily audible yet)
    Started {
        #[serde(rename = "initialRate")]
        initial_rate: f32,
    },
    /// Speech stopped (or there was nothing to stop)
    Stopped,
    /// The rate change took effect and speech restarted
    Adjusted {
        #[serde(rename = "newRate")]
        new_rate: f32,
    },
    /// The rate was already at its bound; nothing changed
    LimitReached {
        #[serde(rename = "newRate")]
        new_rate: f32,
    },
    /// No speech is active to adjust
    Inactive,
    Error { message: String },
}

/// Responses to getVoices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoicesResponse {
    Voices { voices: Vec<VoiceInfo> },
    Error { error: String },
}

impl From<SessionResponse> for Response {
    fn from(response: SessionResponse) -> Self {
        Response::Session(response)
    }
}

impl From<VoicesResponse> for Response {
    fn from(response: VoicesResponse) -> Self {
        Response::Voices(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(response: impl Into<Response>) -> String {
        let response: Response = response.into();
        serde_json::to_string(&response).unwrap()
    }

    #[test]
    fn requests_parse_from_wire_form() {
        let request: Request = serde_json::from_str(r#"{"action":"speak","text":"hi"}"#).unwrap();
        assert_eq!(request, Request::Speak { text: "hi".into() });

        let request: Request = serde_json::from_str(r#"{"action":"stop"}"#).unwrap();
        assert_eq!(request, Request::Stop);

        let request: Request =
            serde_json::from_str(r#"{"action":"adjustRate","direction":"up"}"#).unwrap();
        assert_eq!(
            request,
            Request::AdjustRate {
                direction: RateDirection::Up
            }
        );

        let request: Request = serde_json::from_str(r#"{"action":"getVoices"}"#).unwrap();
        assert_eq!(request, Request::GetVoices);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"action":"pause"}"#).is_err());
    }

    #[test]
    fn session_responses_use_exact_wire_form() {
        assert_eq!(
            wire(SessionResponse::Started { initial_rate: 1.2 }),
            r#"{"status":"started","initialRate":1.2}"#
        );
        assert_eq!(wire(SessionResponse::Stopped), r#"{"status":"stopped"}"#);
        assert_eq!(
            wire(SessionResponse::Adjusted { new_rate: 1.1 }),
            r#"{"status":"adjusted","newRate":1.1}"#
        );
        assert_eq!(
            wire(SessionResponse::LimitReached { new_rate: 3.0 }),
            r#"{"status":"limit_reached","newRate":3.0}"#
        );
        assert_eq!(wire(SessionResponse::Inactive), r#"{"status":"inactive"}"#);
        assert_eq!(
            wire(SessionResponse::Error {
                message: "no".into()
            }),
            r#"{"status":"error","message":"no"}"#
        );
    }

    #[test]
    fn voices_responses_are_untagged() {
        let voices = vec![VoiceInfo {
            voice_name: "english".into(),
            lang: "en-gb".into(),
            local_service: true,
        }];
        assert_eq!(
            wire(VoicesResponse::Voices { voices }),
            r#"{"voices":[{"voiceName":"english","lang":"en-gb","localService":true}]}"#
        );
        assert_eq!(
            wire(VoicesResponse::Error {
                error: "engine gone".into()
            }),
            r#"{"error":"engine gone"}"#
        );
    }

    #[test]
    fn responses_round_trip() {
        let response: Response = SessionResponse::Adjusted { new_rate: 1.4 }.into();
        let parsed: Response = serde_json::from_str(&wire(SessionResponse::Adjusted {
            new_rate: 1.4,
        }))
        .unwrap();
        assert_eq!(parsed, response);
    }
}
