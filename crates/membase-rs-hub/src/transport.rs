//! HTTP transport abstraction used by the hub client.

use crate::error::TransportError;
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// HTTP method of a hub request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Body of a hub request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// `application/json` payload.
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs, in order.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` with one binary part plus text fields.
    Multipart {
        file_field: String,
        file_name: String,
        data: Vec<u8>,
        fields: Vec<(String, String)>,
    },
}

/// A transport-agnostic hub request.
#[derive(Debug, Clone, PartialEq)]
pub struct HubRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl HubRequest {
    /// Create a request with an empty body and a 30s timeout.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.body = RequestBody::Form(pairs);
        self
    }

    /// Attach a binary file part plus text fields as a multipart body.
    pub fn multipart<K, V>(
        mut self,
        file_field: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Multipart {
            file_field: file_field.into(),
            file_name: file_name.into(),
            data,
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value of a form field, if the body is a form.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// JSON body, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Raw response from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HubResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response carrying the given JSON document.
    pub fn ok_json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Whether the body is empty or the JSON literal `null`.
    pub fn is_null(&self) -> bool {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        text.is_empty() || text == "null"
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Sends hub requests over some HTTP implementation.
#[async_trait]
pub trait HubTransport: Send + Sync {
    async fn send(&self, request: HubRequest) -> Result<HubResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that identifies itself with `user_agent` and asks for JSON.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HubTransport for ReqwestTransport {
    async fn send(&self, request: HubRequest) -> Result<HubResponse, TransportError> {
        let HubRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        debug!("sending hub request (method={:?}, url={})", method, url);

        let mut builder = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        }
        .timeout(timeout);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Multipart {
                file_field,
                file_name,
                data,
                fields,
            } => {
                let part = reqwest::multipart::Part::bytes(data)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")
                    .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
                let mut form = reqwest::multipart::Form::new().part(file_field, part);
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        debug!(
            "hub response received (url={}, status={}, bytes={})",
            url,
            status,
            body.len()
        );
        Ok(HubResponse::new(status, body.to_vec()))
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{HubRequest, HubResponse, RequestBody};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn form_builder_keeps_field_order() {
        let request = HubRequest::post("http://hub/api/conversation")
            .form([("owner", "alice"), ("id", "conv-1")])
            .timeout(Duration::from_millis(10));
        assert_eq!(
            request.body,
            RequestBody::Form(vec![
                ("owner".to_string(), "alice".to_string()),
                ("id".to_string(), "conv-1".to_string()),
            ])
        );
        assert_eq!(request.form_field("id"), Some("conv-1"));
        assert_eq!(request.timeout, Duration::from_millis(10));
    }

    #[test]
    fn null_and_empty_bodies_are_null() {
        assert!(HubResponse::new(200, "").is_null());
        assert!(HubResponse::new(200, " null ").is_null());
        assert!(!HubResponse::ok_json(&json!([])).is_null());
    }
}
