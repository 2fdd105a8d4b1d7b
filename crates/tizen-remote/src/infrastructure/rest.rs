//! Client for the TV's HTTP metadata API.
//!
//! The API lives on port 8001 even when the control channel uses TLS on 8002:
//!
//! | Method   | Path                          | Purpose                  |
//! |----------|-------------------------------|--------------------------|
//! | `GET`    | `/api/v2/`                    | device information       |
//! | `GET`    | `/api/v2/applications/<id>`   | application status       |
//! | `POST`   | `/api/v2/applications/<id>`   | start an application     |
//! | `DELETE` | `/api/v2/applications/<id>`   | stop an application      |
//! | `PUT`    | `/api/v2/applications/<id>`   | install an application   |
//!
//! Only `200 OK` counts as success.  The body of a successful `POST` must
//! additionally be `true` or `{"ok": true}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tizen_core::{AppStatus, DeviceInfo, ProtocolError};
use tracing::debug;

pub const DEFAULT_REST_PORT: u16 = 8001;
pub const DEFAULT_REST_DIAL_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_REST_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for HTTP API calls.
#[derive(Debug, Error)]
pub enum RestError {
    /// Connection, timeout, or body decoding failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The TV answered with a status other than `200 OK`.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The body has the wrong shape.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Metadata and application management over HTTP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn device_info(&self) -> Result<DeviceInfo, RestError>;
    async fn app_status(&self, app_id: &str) -> Result<AppStatus, RestError>;
    async fn open_app(&self, app_id: &str) -> Result<(), RestError>;
    async fn close_app(&self, app_id: &str) -> Result<(), RestError>;
    async fn install_app(&self, app_id: &str) -> Result<(), RestError>;
}

/// `reqwest`-backed [`DeviceApi`].
#[derive(Debug, Clone)]
pub struct RestClient {
    host: String,
    port: u16,
    dial_timeout: Duration,
    request_timeout: Duration,
    http: reqwest::Client,
}

impl RestClient {
    /// Creates a client with the default port and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Http`] if the TLS backend cannot be initialised.
    pub fn new(host: impl Into<String>) -> Result<Self, RestError> {
        Self::with_settings(
            host,
            DEFAULT_REST_PORT,
            DEFAULT_REST_DIAL_TIMEOUT,
            DEFAULT_REST_REQUEST_TIMEOUT,
        )
    }

    pub fn with_settings(
        host: impl Into<String>,
        port: u16,
        dial_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(dial_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            host: host.into(),
            port,
            dial_timeout,
            request_timeout,
            http,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn service_url(&self) -> String {
        format!("http://{}:{}/api/v2/", self.host, self.port)
    }

    fn app_url(&self, app_id: &str) -> String {
        format!("http://{}:{}/api/v2/applications/{}", self.host, self.port, app_id)
    }

    async fn call(&self, method: Method, url: String) -> Result<reqwest::Response, RestError> {
        debug!("{} {}", method, url);
        let response = self.http.request(method, url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(RestError::Status(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl DeviceApi for RestClient {
    async fn device_info(&self) -> Result<DeviceInfo, RestError> {
        let response = self.call(Method::GET, self.service_url()).await?;
        Ok(response.json().await?)
    }

    async fn app_status(&self, app_id: &str) -> Result<AppStatus, RestError> {
        let response = self.call(Method::GET, self.app_url(app_id)).await?;
        Ok(response.json().await?)
    }

    async fn open_app(&self, app_id: &str) -> Result<(), RestError> {
        let response = self.call(Method::POST, self.app_url(app_id)).await?;
        let body = response.text().await?;
        check_open_ack(&body)?;
        Ok(())
    }

    async fn close_app(&self, app_id: &str) -> Result<(), RestError> {
        self.call(Method::DELETE, self.app_url(app_id)).await?;
        Ok(())
    }

    async fn install_app(&self, app_id: &str) -> Result<(), RestError> {
        self.call(Method::PUT, self.app_url(app_id)).await?;
        Ok(())
    }
}

/// Accepts `true` or `{"ok": true}`; everything else is rejected.
fn check_open_ack(body: &str) -> Result<(), ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let accepted = match &value {
        serde_json::Value::Bool(ok) => *ok,
        serde_json::Value::Object(map) => map.get("ok").and_then(|v| v.as_bool()) == Some(true),
        _ => false,
    };
    if accepted {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedResponse(body.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
