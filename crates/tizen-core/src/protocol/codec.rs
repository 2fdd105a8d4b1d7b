//! JSON codec for the Tizen control channel.
//!
//! Every frame is a UTF-8 JSON text message.  Encoding never fails for the
//! well-formed request types in [`crate::protocol::messages`], but the
//! functions still return `Result` so callers handle all codec paths the
//! same way.
//!
//! Inbound frames are classified before they are parsed: the TV interleaves
//! unsolicited notifications (touch mode toggles, IME end) with real
//! responses, and those must never be mistaken for an answer.

use thiserror::Error;

use crate::key::Key;
use crate::protocol::messages::{
    ChannelEmitRequest, ConnectEvent, InstalledApp, InstalledAppsEvent, LaunchActionType,
    RemoteControlRequest, EVENT_APPS_LAUNCH, IGNORABLE_MARKERS,
};
use crate::sequence::KeyAction;

/// Errors that can occur while encoding or decoding control-channel frames.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame is not valid JSON or does not match the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame is valid JSON but does not answer the request that was sent.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A request could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Classification of an inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// A frame that may answer an outstanding request.
    Response,
    /// An unsolicited notification carrying the given marker.
    Ignorable(&'static str),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a key command.
///
/// # Examples
///
/// ```rust
/// use tizen_core::protocol::encode_key_command;
/// use tizen_core::{Key, KeyAction};
///
/// let frame = encode_key_command(Key::Mute, KeyAction::Click).unwrap();
/// assert!(frame.contains(r#""DataOfCmd":"KEY_MUTE""#));
/// ```
pub fn encode_key_command(key: Key, action: KeyAction) -> Result<String, ProtocolError> {
    serde_json::to_string(&RemoteControlRequest::new(key, action))
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Encodes an `ed.apps.launch` request.
pub fn encode_launch_app(
    app_id: &str,
    action_type: LaunchActionType,
    meta_tag: &str,
) -> Result<String, ProtocolError> {
    serde_json::to_string(&ChannelEmitRequest::launch(app_id, action_type, meta_tag))
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Encodes an `ed.installedApp.get` request.
pub fn encode_installed_apps_query() -> Result<String, ProtocolError> {
    serde_json::to_string(&ChannelEmitRequest::installed_apps())
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Returns whether `frame` answers a request or is an unsolicited notification.
pub fn classify_frame(frame: &str) -> Frame {
    IGNORABLE_MARKERS
        .iter()
        .find(|marker| frame.contains(*marker))
        .map_or(Frame::Response, |marker| Frame::Ignorable(marker))
}

/// Parses the handshake event the TV sends right after the upgrade.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the frame is not JSON or has no
/// `event` field.
pub fn decode_connect_event(frame: &str) -> Result<ConnectEvent, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Parses the reply to an installed-apps query.
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] if the frame cannot be parsed.
/// - [`ProtocolError::UnexpectedResponse`] if it is some other event.
pub fn decode_installed_apps(frame: &str) -> Result<Vec<InstalledApp>, ProtocolError> {
    let event: InstalledAppsEvent =
        serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if event.event != crate::protocol::messages::EVENT_INSTALLED_APPS {
        return Err(ProtocolError::UnexpectedResponse(event.event));
    }
    Ok(event.data.data)
}

/// Validates the reply to an app launch.
///
/// The TV acknowledges a launch either by echoing an `ed.apps.launch` event
/// or with a bare `{"data": true}`.  Anything else is rejected.
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] if the frame is not JSON.
/// - [`ProtocolError::UnexpectedResponse`] if it is not an acknowledgment.
pub fn check_launch_ack(frame: &str) -> Result<(), ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let echoed = value.get("event").and_then(|e| e.as_str()) == Some(EVENT_APPS_LAUNCH);
    let accepted = value.get("data").and_then(|d| d.as_bool()) == Some(true);

    if echoed || accepted {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedResponse(frame.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
