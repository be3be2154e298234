//! speaksel application library
//!
//! Wires the TTS engine, the settings store, and the session controller
//! together behind the JSON request/response protocol served by the
//! `speaksel` binary.

pub mod protocol;
pub mod session;
pub mod shutdown;
