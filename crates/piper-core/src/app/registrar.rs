//! PipeRegistrar - 属性付き登録のビルダー
//!
//! Each `with_*` call consumes the registrar and returns a new one carrying
//! one more attribute. The attributes apply to the pipes registered through
//! it, or to a whole group via [`PipeRegistrar::group`].

use std::collections::BTreeMap;

use serde::Deserialize;

use super::group::GroupAttributes;
use super::piper::{PipeKey, Piper};
use crate::domain::{IntoAction, MiddlewareRef, Pipe, PipeError};

/// Attribute names accepted by [`PipeRegistrar::attribute`].
pub const ALLOWED_ATTRIBUTES: [&str; 5] = ["middleware", "namespace", "key", "alias", "where"];

/// Loosely typed attribute value, as found in pipes files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    List(Vec<String>),
    Table(BTreeMap<String, String>),
}

impl AttributeValue {
    fn into_list(self, name: &str) -> Result<Vec<String>, PipeError> {
        match self {
            Self::Text(text) => Ok(vec![text]),
            Self::List(list) => Ok(list),
            Self::Table(_) => Err(type_mismatch(name, "a string or a list of strings")),
        }
    }

    fn into_text(self, name: &str) -> Result<String, PipeError> {
        match self {
            Self::Text(text) => Ok(text),
            _ => Err(type_mismatch(name, "a string")),
        }
    }
}

fn type_mismatch(name: &str, expected: &str) -> PipeError {
    PipeError::Configuration(format!("Attribute [{name}] expects {expected}."))
}

pub struct PipeRegistrar<'p> {
    piper: &'p mut Piper,
    attributes: GroupAttributes,
}

impl<'p> PipeRegistrar<'p> {
    pub fn new(piper: &'p mut Piper) -> Self {
        Self {
            piper,
            attributes: GroupAttributes::default(),
        }
    }

    pub fn attributes(&self) -> &GroupAttributes {
        &self.attributes
    }

    pub fn with_middleware<I, M>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.attributes
            .middleware
            .extend(middleware.into_iter().map(Into::into));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.attributes.namespace = Some(namespace.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.attributes.key = Some(key.into());
        self
    }

    pub fn with_alias<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.alias.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_where(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.attributes.wheres.insert(name.into(), pattern.into());
        self
    }

    /// Set an attribute by name.
    ///
    /// Names outside [`ALLOWED_ATTRIBUTES`] are rejected here, at
    /// registration time.
    pub fn attribute(self, name: &str, value: AttributeValue) -> Result<Self, PipeError> {
        match name {
            "middleware" => Ok(self.with_middleware(value.into_list(name)?)),
            "namespace" => Ok(self.with_namespace(value.into_text(name)?)),
            "key" => Ok(self.with_key(value.into_text(name)?)),
            "alias" => Ok(self.with_alias(value.into_list(name)?)),
            "where" => match value {
                AttributeValue::Table(wheres) => Ok(wheres
                    .into_iter()
                    .fold(self, |registrar, (name, pattern)| {
                        registrar.with_where(name, pattern)
                    })),
                _ => Err(type_mismatch(name, "a table of placeholder patterns")),
            },
            other => Err(PipeError::Configuration(format!(
                "Attribute [{other}] does not exist."
            ))),
        }
    }

    /// Register the pipes of `body` with these attributes.
    pub fn group<F>(self, body: F) -> Result<(), PipeError>
    where
        F: FnOnce(&mut Piper) -> Result<(), PipeError>,
    {
        self.piper.group(self.attributes, body)
    }

    pub fn match_pipe(
        self,
        key: impl Into<String>,
        cue: &str,
        action: impl IntoAction,
    ) -> Result<&'p mut Pipe, PipeError> {
        self.piper
            .register_scoped(PipeKey::Explicit(key.into()), cue, action, Some(self.attributes))
    }

    /// `"key:cue"` or a bare cue using the registrar's (or group's) key.
    pub fn pipe(self, shorthand: &str, action: impl IntoAction) -> Result<&'p mut Pipe, PipeError> {
        let (key, cue) = PipeKey::split(shorthand);
        self.piper
            .register_scoped(key, cue, action, Some(self.attributes))
    }

    pub fn any(self, cue: &str, action: impl IntoAction) -> Result<&'p mut Pipe, PipeError> {
        self.piper
            .register_scoped(PipeKey::Any, cue, action, Some(self.attributes))
    }

    pub fn fallback(self, action: impl IntoAction) -> Result<&'p mut Pipe, PipeError> {
        self.piper.register_fallback(action, Some(self.attributes))
    }
}
