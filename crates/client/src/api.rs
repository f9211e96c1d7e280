//! Remote action endpoint.
//!
//! Every request is a single JSON object naming an `action`. The client
//! attaches the device id and, when a valid session exists, the session
//! token. Responses are tagged with `ok` and an optional `error` message;
//! any other fields are action-specific data.

use std::future::Future;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::state::ClientState;

/// Message used when the endpoint rejects a request without saying why.
const DEFAULT_REJECTION: &str = "Request failed";

/// Errors talking to the remote endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body is not a valid response envelope.
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request data must be a JSON object (or null).
    #[error("request data must be a JSON object")]
    InvalidPayload,

    /// The endpoint answered with `ok: false`.
    #[error("{0}")]
    Rejected(String),
}

/// HTTP method used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// JSON body.
    #[default]
    Post,
    /// Payload as query parameters.
    Get,
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the action succeeded.
    #[serde(default)]
    pub ok: bool,
    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Action-specific fields.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ApiResponse {
    /// Turn an `ok: false` response into [`ApiError::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns the endpoint's message, or a generic one, when `ok` is false.
    pub fn into_result(self) -> Result<Self, ApiError> {
        if self.ok {
            Ok(self)
        } else {
            Err(ApiError::Rejected(
                self.error
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
            ))
        }
    }

    /// Decode the data field `name`, if present and well-typed.
    #[must_use]
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.data
            .get(name)
            .filter(|value| !value.is_null())
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// The data field `name` as a string.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }
}

/// Build the request payload for `action`.
///
/// `action` always wins over a caller-supplied `action` field. `deviceId` and
/// `token` are only added when the caller did not supply them; the token only
/// when one is available.
#[must_use]
pub fn build_payload(
    action: &str,
    mut data: Map<String, Value>,
    device_id: &str,
    token: Option<&SecretString>,
) -> Map<String, Value> {
    data.insert("action".to_string(), Value::String(action.to_string()));
    data.entry("deviceId")
        .or_insert_with(|| Value::String(device_id.to_string()));
    if let Some(token) = token {
        data.entry("token")
            .or_insert_with(|| Value::String(token.expose_secret().to_string()));
    }
    data
}

/// Payload flattened into query parameters. Strings are used verbatim, other
/// values in their JSON text form.
#[must_use]
pub fn query_pairs(payload: &Map<String, Value>) -> Vec<(String, String)> {
    payload
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Something that delivers a payload to the remote endpoint.
pub trait Transport: Send + Sync {
    /// Send `payload` and decode the response envelope.
    fn send(
        &self,
        method: Method,
        payload: &Map<String, Value>,
    ) -> impl Future<Output = Result<ApiResponse, ApiError>> + Send;
}

/// Transport over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// The endpoint URL.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        payload: &Map<String, Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request = match method {
            Method::Post => self.client.post(self.endpoint.clone()).json(payload),
            Method::Get => self
                .client
                .get(self.endpoint.clone())
                .query(&query_pairs(payload)),
        };

        let body = request.send().await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Action-addressed client that attaches device id and session token.
#[derive(Clone)]
pub struct ApiClient<T> {
    transport: T,
    state: ClientState,
}

impl<T: Transport> ApiClient<T> {
    /// Create a client sending through `transport` with identity from `state`.
    #[must_use]
    pub const fn new(transport: T, state: ClientState) -> Self {
        Self { transport, state }
    }

    /// The client state requests are attributed to.
    #[must_use]
    pub const fn state(&self) -> &ClientState {
        &self.state
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// POST `action` with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not an object, or the request fails or
    /// returns an undecodable body. An `ok: false` response is *not* an error
    /// here; use [`ApiResponse::into_result`].
    pub async fn request(&self, action: &str, data: Value) -> Result<ApiResponse, ApiError> {
        self.request_with(Method::Post, action, data).await
    }

    /// Send `action` with `data` using `method`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn request_with(
        &self,
        method: Method,
        action: &str,
        data: Value,
    ) -> Result<ApiResponse, ApiError> {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ApiError::InvalidPayload),
        };

        let device_id = self.state.device().device_id();
        let token = self.state.sessions().current_token();
        let payload = build_payload(action, data, &device_id, token.as_ref());

        tracing::debug!(action, authenticated = token.is_some(), "Sending request");
        self.transport.send(method, &payload).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! Scripted transport for flow tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays queued responses and records every payload sent.
    #[derive(Default)]
    pub struct StubTransport {
        responses: Mutex<VecDeque<Result<Value, String>>>,
        sent: Mutex<Vec<(Method, Map<String, Value>)>>,
    }

    impl StubTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, body: Value) -> &Self {
            self.responses.lock().unwrap().push_back(Ok(body));
            self
        }

        /// Queue an undecodable body.
        pub fn respond_garbage(&self, body: &str) -> &Self {
            self.responses.lock().unwrap().push_back(Err(body.to_string()));
            self
        }

        pub fn sent(&self) -> Vec<(Method, Map<String, Value>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        async fn send(
            &self,
            method: Method,
            payload: &Map<String, Value>,
        ) -> Result<ApiResponse, ApiError> {
            self.sent.lock().unwrap().push((method, payload.clone()));
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(serde_json::json!({ "ok": true })));
            match next {
                Ok(body) => Ok(serde_json::from_value(body)?),
                Err(raw) => Ok(serde_json::from_str(&raw)?),
            }
        }
    }
}
