//! Inbound request adapter.
//!
//! A `PipeRequest` is the merged query/body/form input of one webhook call,
//! flattened into string fields. Field order is kept as received so that
//! wildcard pipes see values deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::PipeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeRequest {
    method: String,
    target: String,
    fields: Vec<(String, String)>,
}

impl PipeRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            fields: Vec::new(),
        }
    }

    /// Shorthand for a `POST` to `target`, the usual webhook shape.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new("POST", target)
    }

    pub fn from_fields<I, K, V>(method: impl Into<String>, target: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut request = Self::new(method, target);
        for (name, value) in fields {
            request.insert(name, value);
        }
        request
    }

    /// Build a request from a JSON object payload.
    ///
    /// Strings are taken as-is, numbers and booleans are rendered, `null`
    /// becomes an empty string and nested values keep their JSON text.
    pub fn from_json(
        method: impl Into<String>,
        target: impl Into<String>,
        payload: &serde_json::Value,
    ) -> Result<Self, PipeError> {
        let object = payload.as_object().ok_or_else(|| {
            PipeError::InvalidRequest(format!("expected a JSON object payload, got {payload}"))
        })?;

        let mut request = Self::new(method, target);
        for (name, value) in object {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            request.insert(name.clone(), value);
        }
        Ok(request)
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Target without query string and surrounding slashes.
    pub fn path(&self) -> &str {
        let target = self.target.split(['?', '#']).next().unwrap_or_default();
        target.trim_matches('/')
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// `METHOD target`, used in not-found diagnostics.
impl fmt::Display for PipeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.target)
    }
}
