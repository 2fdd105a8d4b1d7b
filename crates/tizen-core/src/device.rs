//! Typed views over the metadata returned by the TV's HTTP API.
//!
//! `GET /api/v2/` answers with a [`DeviceInfo`] whose `device` object is a
//! loose string map; [`DeviceDescriptor`] gives named accessors for the keys
//! this workspace relies on.  `GET /api/v2/applications/<id>` answers with an
//! [`AppStatus`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::InstalledApp;

/// Response of `GET /api/v2/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub device: DeviceDescriptor,
    /// A JSON object encoded as a string, e.g. `"{\"remote\":\"true\"}"`.
    #[serde(default, rename = "isSupport")]
    pub is_support: String,
}

impl DeviceInfo {
    /// Decodes the `isSupport` string into a map of feature flags.
    ///
    /// An empty string yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the string is not a JSON object.
    pub fn supported_features(&self) -> Result<BTreeMap<String, serde_json::Value>, ProtocolError> {
        if self.is_support.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&self.is_support).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// The `device` object of [`DeviceInfo`].
///
/// Keys that are absent read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceDescriptor(pub BTreeMap<String, String>);

impl DeviceDescriptor {
    pub fn id(&self) -> &str {
        self.get("id")
    }

    pub fn ip(&self) -> &str {
        self.get("ip")
    }

    pub fn name(&self) -> &str {
        self.get("name")
    }

    /// MAC address of the wireless interface, used for Wake-on-LAN.
    pub fn mac(&self) -> &str {
        self.get("wifiMac")
    }

    /// Whether the TV issues session tokens.  `false` when absent or not a boolean.
    pub fn token_auth_support(&self) -> bool {
        matches!(
            self.get("TokenAuthSupport"),
            "1" | "t" | "T" | "true" | "TRUE" | "True"
        )
    }

    /// Raw access to any key.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or_default()
    }
}

/// Response of `GET /api/v2/applications/<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub version: String,
}

/// An installed application with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub visible: bool,
    pub version: String,
}

impl App {
    /// Combines an installed-apps entry with its REST status.
    ///
    /// The status name wins unless it is empty.
    pub fn merge(installed: &InstalledApp, status: AppStatus) -> Self {
        let name = if status.name.is_empty() {
            installed.name.clone()
        } else {
            status.name
        };
        Self {
            id: installed.app_id.clone(),
            name,
            running: status.running,
            visible: status.visible,
            version: status.version,
        }
    }
}

impl From<AppStatus> for App {
    fn from(status: AppStatus) -> Self {
        Self {
            id: status.id,
            name: status.name,
            running: status.running,
            visible: status.visible,
            version: status.version,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "device": {
            "id": "uuid:1234",
            "ip": "192.168.1.20",
            "name": "[TV] Living Room",
            "wifiMac": "aa:bb:cc:dd:ee:ff",
            "TokenAuthSupport": "true"
        },
        "id": "uuid:1234",
        "isSupport": "{\"DMP_available\":\"true\",\"remote\":\"true\"}",
        "name": "[TV] Living Room",
        "remote": "1.0",
        "type": "Samsung SmartTV",
        "uri": "http://192.168.1.20:8001/api/v2/",
        "version": "2.0.25"
    }"#;

    #[test]
    fn test_device_info_parses_descriptor() {
        // Act
        let info: DeviceInfo = serde_json::from_str(INFO).unwrap();

        // Assert
        assert_eq!(info.kind, "Samsung SmartTV");
        assert_eq!(info.device.id(), "uuid:1234");
        assert_eq!(info.device.ip(), "192.168.1.20");
        assert_eq!(info.device.mac(), "aa:bb:cc:dd:ee:ff");
        assert!(info.device.token_auth_support());
    }

    #[test]
    fn test_supported_features_decodes_embedded_json() {
        let info: DeviceInfo = serde_json::from_str(INFO).unwrap();

        let features = info.supported_features().unwrap();

        assert_eq!(features.get("remote"), Some(&serde_json::json!("true")));
    }

    #[test]
    fn test_supported_features_malformed_is_error() {
        let info = DeviceInfo {
            is_support: "{not json".to_string(),
            ..DeviceInfo::default()
        };
        assert!(matches!(info.supported_features(), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_supported_features_empty_is_empty_map() {
        assert!(DeviceInfo::default().supported_features().unwrap().is_empty());
    }

    #[test]
    fn test_token_auth_support_false_when_absent_or_invalid() {
        let mut descriptor = DeviceDescriptor::default();
        assert!(!descriptor.token_auth_support());

        descriptor.0.insert("TokenAuthSupport".into(), "maybe".into());
        assert!(!descriptor.token_auth_support());
    }

    #[test]
    fn test_missing_descriptor_key_reads_empty() {
        assert_eq!(DeviceDescriptor::default().name(), "");
    }

    #[test]
    fn test_app_merge_prefers_status_name() {
        // Arrange
        let installed = InstalledApp {
            app_id: "111299001912".into(),
            app_type: 2,
            icon: String::new(),
            name: "YouTube".into(),
        };
        let status = AppStatus {
            id: "111299001912".into(),
            name: String::new(),
            running: true,
            visible: false,
            version: "2.1".into(),
        };

        // Act
        let app = App::merge(&installed, status);

        // Assert
        assert_eq!(app.name, "YouTube");
        assert!(app.running);
        assert_eq!(app.version, "2.1");
    }
}
