//! Controller trait - 名前で参照されるハンドラ群
//!
//! # 二層構造
//! - **表層（Typed）**: `Controller` trait - `const NAME` で登録名を固定
//! - **内部（Dyn）**: `DynController` trait - object-safe, type erasure
//!
//! Pipes refer to controllers as `"Name@method"`, or `"Name"` for invokable
//! controllers whose single entry point is `invoke`.

use crate::domain::{MiddlewareRef, PipeContext, PipeError, Response};

/// # 使用例
/// ```ignore
/// struct WeatherController;
///
/// impl Controller for WeatherController {
///     const NAME: &'static str = "Bot\\WeatherController";
///
///     fn methods(&self) -> &[&'static str] {
///         &["today"]
///     }
///
///     fn call(&self, method: &str, ctx: &PipeContext<'_>) -> Result<Response, PipeError> {
///         match method {
///             "today" => Ok(Response::ok(format!("sunny in {}", ctx.param("city").unwrap_or("?")))),
///             _ => unreachable!(),
///         }
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Registry name, including any namespace (`Bot\\WeatherController`).
    const NAME: &'static str;

    /// Methods reachable through `NAME@method`.
    fn methods(&self) -> &[&'static str];

    /// Only called with a method listed by [`Controller::methods`].
    fn call(&self, method: &str, ctx: &PipeContext<'_>) -> Result<Response, PipeError>;

    /// Middleware run before any of this controller's methods.
    fn middleware(&self) -> Vec<ControllerMiddleware> {
        Vec::new()
    }
}

/// Object-safe face of [`Controller`], stored in the registry.
pub trait DynController: Send + Sync {
    fn name(&self) -> &str;

    fn has_method(&self, method: &str) -> bool;

    fn call_dyn(&self, method: &str, ctx: &PipeContext<'_>) -> Result<Response, PipeError>;

    fn middleware(&self) -> Vec<ControllerMiddleware>;
}

pub struct TypedController<C: Controller>(C);

impl<C: Controller> TypedController<C> {
    pub fn new(controller: C) -> Self {
        Self(controller)
    }
}

impl<C: Controller> DynController for TypedController<C> {
    fn name(&self) -> &str {
        C::NAME
    }

    fn has_method(&self, method: &str) -> bool {
        self.0.methods().iter().any(|m| *m == method)
    }

    fn call_dyn(&self, method: &str, ctx: &PipeContext<'_>) -> Result<Response, PipeError> {
        self.0.call(method, ctx)
    }

    fn middleware(&self) -> Vec<ControllerMiddleware> {
        self.0.middleware()
    }
}

/// Controller-level middleware, optionally limited to some methods.
#[derive(Debug, Clone)]
pub struct ControllerMiddleware {
    middleware: MiddlewareRef,
    only: Option<Vec<String>>,
    except: Option<Vec<String>>,
}

impl ControllerMiddleware {
    pub fn new(middleware: impl Into<MiddlewareRef>) -> Self {
        Self {
            middleware: middleware.into(),
            only: None,
            except: None,
        }
    }

    pub fn only<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    pub fn except<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    pub fn middleware(&self) -> &MiddlewareRef {
        &self.middleware
    }

    pub fn applies_to(&self, method: &str) -> bool {
        let listed = |methods: &Option<Vec<String>>| {
            methods
                .as_ref()
                .is_some_and(|methods| methods.iter().any(|m| m == method))
        };
        if self.only.is_some() && !listed(&self.only) {
            return false;
        }
        !listed(&self.except)
    }
}
