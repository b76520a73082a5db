//! Pipe actions.
//!
//! An action is either a handler function, a reference to a registered
//! controller (`"Controller@method"`, or `"Controller"` for invokables), or
//! missing altogether when a pipe was registered without one.

use std::fmt;
use std::sync::Arc;

use super::errors::PipeError;
use super::pipe::PipeContext;
use super::response::{IntoResponse, Response};

/// Method called on controllers referenced without `@method`.
pub const INVOKE_METHOD: &str = "invoke";

pub type HandlerFn = Arc<dyn Fn(&PipeContext<'_>) -> Result<Response, PipeError> + Send + Sync>;

#[derive(Clone)]
pub enum Action {
    Handler(HandlerFn),
    Controller(ControllerAction),
    Missing,
}

impl Action {
    /// Wrap a handler closure; its return value goes through [`IntoResponse`].
    ///
    /// # 使用例
    /// ```ignore
    /// piper.match_pipe("trigger", "name {text}", Action::from_fn(|ctx| {
    ///     Ok(format!("you said {}", ctx.param("text").unwrap_or_default()))
    /// }))?;
    /// ```
    pub fn from_fn<F, R>(f: F) -> Self
    where
        F: Fn(&PipeContext<'_>) -> Result<R, PipeError> + Send + Sync + 'static,
        R: IntoResponse,
    {
        Self::Handler(Arc::new(move |ctx: &PipeContext<'_>| {
            f(ctx).map(IntoResponse::into_response)
        }))
    }

    /// Parse a `"Controller@method"` / `"Controller"` reference.
    pub fn controller(reference: &str) -> Result<Self, PipeError> {
        ControllerAction::parse(reference).map(Self::Controller)
    }

    pub fn as_controller(&self) -> Option<&ControllerAction> {
        match self {
            Self::Controller(action) => Some(action),
            _ => None,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Controller(action) => f.debug_tuple("Controller").field(action).finish(),
            Self::Missing => f.write_str("Missing"),
        }
    }
}

impl From<ControllerAction> for Action {
    fn from(action: ControllerAction) -> Self {
        Self::Controller(action)
    }
}

/// Anything the registration API accepts as an action.
///
/// Strings are parsed as controller references, so a malformed reference
/// fails at registration rather than on the first request.
pub trait IntoAction {
    fn into_action(self) -> Result<Action, PipeError>;
}

impl IntoAction for Action {
    fn into_action(self) -> Result<Action, PipeError> {
        Ok(self)
    }
}

impl IntoAction for ControllerAction {
    fn into_action(self) -> Result<Action, PipeError> {
        Ok(Action::Controller(self))
    }
}

impl IntoAction for &str {
    fn into_action(self) -> Result<Action, PipeError> {
        Action::controller(self)
    }
}

impl IntoAction for String {
    fn into_action(self) -> Result<Action, PipeError> {
        Action::controller(&self)
    }
}

/// `(controller, method)` pair resolved through the controller registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerAction {
    controller: String,
    method: String,
}

impl ControllerAction {
    pub fn new(controller: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            method: method.into(),
        }
    }

    pub fn parse(reference: &str) -> Result<Self, PipeError> {
        let reference = reference.trim();
        let (controller, method) = reference
            .split_once('@')
            .unwrap_or((reference, INVOKE_METHOD));

        if controller.trim_matches('\\').is_empty() || method.is_empty() {
            return Err(PipeError::Configuration(format!(
                "invalid pipe action [{reference}]"
            )));
        }
        Ok(Self::new(controller, method))
    }

    /// Controller name as written, possibly with a leading `\`.
    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Name used for registry lookups.
    pub fn class_name(&self) -> &str {
        self.controller.trim_start_matches('\\')
    }

    /// Prefix a group namespace unless the controller is written absolute
    /// (leading `\`).
    pub fn with_namespace(mut self, namespace: Option<&str>) -> Self {
        let namespace = namespace
            .map(|ns| ns.trim_matches('\\'))
            .filter(|ns| !ns.is_empty());
        if let Some(namespace) = namespace
            && !self.controller.starts_with('\\')
        {
            self.controller = format!("{namespace}\\{}", self.controller);
        }
        self
    }
}

impl fmt::Display for ControllerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.controller, self.method)
    }
}
