//! Outbound response adapter.
//!
//! Handlers may return plain text, JSON values or a prepared [`Response`];
//! [`IntoResponse`] normalizes all of them to a status + body pair.

use serde::{Deserialize, Serialize};

/// Response body.
///
/// Serialized as `{"kind": "...", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Body {
    Empty,
    Text(String),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16, body: Body) -> Self {
        Self { status, body }
    }

    /// `200` with a text body.
    pub fn ok(text: impl Into<String>) -> Self {
        Self::text(200, text)
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self::new(status, Body::Text(text.into()))
    }

    /// `200` with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        Self::new(200, Body::Json(value))
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Body::Empty)
    }

    pub fn not_found(text: impl Into<String>) -> Self {
        Self::text(404, text)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// The body rendered as text (JSON bodies are serialized).
    pub fn body_text(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Text(text) => text.clone(),
            Body::Json(value) => value.to_string(),
        }
    }

    /// Whether the rendered body contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.body_text().contains(needle)
    }
}

/// Conversion of handler results into a [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        Response::new(200, self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::ok(self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        Response::ok(self)
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response {
        Response::json(self)
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        Response::empty(204)
    }
}
