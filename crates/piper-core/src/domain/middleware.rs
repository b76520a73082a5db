//! Middleware protocol.
//!
//! A middleware receives the request context and a [`Next`] handle. Calling
//! `next.run(ctx)` continues the chain; returning a response without calling
//! it short-circuits everything behind it, including the pipe's action.

use std::fmt;
use std::sync::Arc;

use super::errors::PipeError;
use super::pipe::PipeContext;
use super::response::Response;

pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &PipeContext<'_>, next: Next<'_>) -> Result<Response, PipeError>;
}

/// Innermost step of a middleware chain.
pub type Endpoint<'a> = dyn Fn(&PipeContext<'_>) -> Result<Response, PipeError> + 'a;

/// The remainder of a middleware chain.
pub struct Next<'a> {
    stack: &'a [Arc<dyn Middleware>],
    endpoint: &'a Endpoint<'a>,
}

impl<'a> Next<'a> {
    pub fn new(stack: &'a [Arc<dyn Middleware>], endpoint: &'a Endpoint<'a>) -> Self {
        Self { stack, endpoint }
    }

    pub fn run(self, ctx: &PipeContext<'_>) -> Result<Response, PipeError> {
        match self.stack.split_first() {
            Some((head, rest)) => head.handle(ctx, Next::new(rest, self.endpoint)),
            None => (self.endpoint)(ctx),
        }
    }
}

struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&PipeContext<'_>, Next<'_>) -> Result<Response, PipeError> + Send + Sync,
{
    fn handle(&self, ctx: &PipeContext<'_>, next: Next<'_>) -> Result<Response, PipeError> {
        (self.0)(ctx, next)
    }
}

/// Wrap a closure as middleware.
pub fn middleware_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&PipeContext<'_>, Next<'_>) -> Result<Response, PipeError> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Middleware as attached to a pipe: either a short name resolved by the
/// piper at dispatch time, or a concrete instance.
#[derive(Clone)]
pub enum MiddlewareRef {
    Named(String),
    Inline(Arc<dyn Middleware>),
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Inline(_) => f.write_str("Inline(..)"),
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::Inline(middleware)
    }
}
