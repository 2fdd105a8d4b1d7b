//! Message type definitions for the Tizen control channel.
//!
//! All messages are JSON text frames on a WebSocket.  Outbound messages fall
//! into two families:
//!
//! - `ms.remote.control` – a key event (`Click`, `Press`, `Release`).
//! - `ms.channel.emit`   – a request addressed to the TV host application
//!   (launch an app, list installed apps).
//!
//! Field names and their order follow the TV firmware exactly; several of
//! them (`Cmd`, `DataOfCmd`, `appId`, `action_type`) use inconsistent casing
//! on purpose.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde::{Deserialize, Serialize};

use crate::key::Key;
use crate::sequence::KeyAction;

/// Path of the remote-control channel on the TV's WebSocket server.
pub const CONTROL_CHANNEL_PATH: &str = "/api/v2/channels/samsung.remote.control";

pub const METHOD_REMOTE_CONTROL: &str = "ms.remote.control";
pub const METHOD_CHANNEL_EMIT: &str = "ms.channel.emit";

pub const EVENT_CHANNEL_CONNECT: &str = "ms.channel.connect";
/// Sent instead of `ms.channel.connect` when the user denies the client.
pub const EVENT_CHANNEL_UNAUTHORIZED: &str = "ms.channel.unauthorized";
pub const EVENT_APPS_LAUNCH: &str = "ed.apps.launch";
pub const EVENT_INSTALLED_APPS: &str = "ed.installedApp.get";

/// Emit target for requests handled by the TV itself.
pub const EMIT_TO_HOST: &str = "host";

/// Fixed `Option` flag of every key command.
pub const KEY_OPTION: &str = "false";
/// Fixed `TypeOfRemote` marker of every key command.
pub const KEY_REMOTE_TYPE: &str = "SendRemoteKey";

/// Substrings identifying unsolicited notifications that never answer a request.
pub const IGNORABLE_MARKERS: [&str; 3] = [
    "ms.remote.touchDisable",
    "ms.remote.touchEnable",
    "ms.remote.imeEnd",
];

// ── Outbound ──────────────────────────────────────────────────────────────────

/// A key event sent with method `ms.remote.control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteControlRequest {
    pub method: String,
    pub params: RemoteControlParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteControlParams {
    /// `Click`, `Press` or `Release`.
    pub cmd: String,
    /// The key code, e.g. `KEY_VOLUP`.
    pub data_of_cmd: String,
    pub option: String,
    pub type_of_remote: String,
}

impl RemoteControlRequest {
    pub fn new(key: Key, action: KeyAction) -> Self {
        Self {
            method: METHOD_REMOTE_CONTROL.to_string(),
            params: RemoteControlParams {
                cmd: action.verb().to_string(),
                data_of_cmd: key.as_str().to_string(),
                option: KEY_OPTION.to_string(),
                type_of_remote: KEY_REMOTE_TYPE.to_string(),
            },
        }
    }
}

/// How the TV should start an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchActionType {
    /// Open the app at a content location given by the meta tag.
    DeepLink,
    /// Start a native app, passing the meta tag as its argument.
    NativeLaunch,
}

/// A request addressed to the TV host with method `ms.channel.emit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEmitRequest {
    pub method: String,
    pub params: EmitParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitParams {
    pub event: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LaunchData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchData {
    pub action_type: LaunchActionType,
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "metaTag")]
    pub meta_tag: String,
}

impl ChannelEmitRequest {
    /// `ed.apps.launch` for `app_id`.
    pub fn launch(app_id: &str, action_type: LaunchActionType, meta_tag: &str) -> Self {
        Self {
            method: METHOD_CHANNEL_EMIT.to_string(),
            params: EmitParams {
                event: EVENT_APPS_LAUNCH.to_string(),
                to: EMIT_TO_HOST.to_string(),
                data: Some(LaunchData {
                    action_type,
                    app_id: app_id.to_string(),
                    meta_tag: meta_tag.to_string(),
                }),
            },
        }
    }

    /// `ed.installedApp.get`.
    pub fn installed_apps() -> Self {
        Self {
            method: METHOD_CHANNEL_EMIT.to_string(),
            params: EmitParams {
                event: EVENT_INSTALLED_APPS.to_string(),
                to: EMIT_TO_HOST.to_string(),
                data: None,
            },
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// The first frame the TV sends after the WebSocket upgrade.
///
/// `event` is `ms.channel.connect` when the client is authorized.  A newly
/// approved client receives its token in `data.token`; reconnecting with a
/// valid token usually yields an empty or identical token.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectEvent {
    pub event: String,
    #[serde(default)]
    pub data: ConnectData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConnectData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub clients: Vec<ChannelClient>,
}

/// A peer attached to the same channel (phones, other remotes, the TV).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelClient {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub connect_time: f64,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub attributes: ClientAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ClientAttributes {
    #[serde(default)]
    pub name: Option<String>,
}

/// Reply to `ed.installedApp.get`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstalledAppsEvent {
    pub event: String,
    #[serde(default)]
    pub from: String,
    pub data: InstalledAppsData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InstalledAppsData {
    #[serde(default)]
    pub data: Vec<InstalledApp>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstalledApp {
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(default)]
    pub app_type: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub name: String,
}

// ── Control URL ───────────────────────────────────────────────────────────────

/// Builds the WebSocket URL of the remote-control channel.
///
/// The client name is shown on the TV's authorization prompt and must be
/// base64 (URL alphabet, padded) encoded.  `token` may be empty on first
/// connect.
pub fn control_url(secure: bool, host: &str, port: u16, client_name: &str, token: &str) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!(
        "{scheme}://{host}:{port}{CONTROL_CHANNEL_PATH}?name={}&token={token}",
        URL_SAFE.encode(client_name.as_bytes())
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
