//! Piper - パイプの登録面とディスパッチャ
//!
//! Registration happens once at boot through `&mut Piper`; afterwards the
//! piper is shared read-only (usually behind an `Arc`) and [`Piper::dispatch`]
//! may run from many threads at once.
//!
//! # 処理の流れ
//! 1. `PipeCollection::match_request` でパイプを選び、パラメータを束縛
//! 2. pipe と controller の middleware を解決
//! 3. middleware chain → action を実行
//! 4. `PipeError::Abort` はそのままレスポンスに変換

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error};

use super::collection::PipeCollection;
use super::group::{GroupAttributes, GroupStack};
use super::registrar::PipeRegistrar;
use crate::domain::{
    ANY, Action, BoundPipe, Endpoint, IntoAction, Middleware, MiddlewareRef, Next, Pipe,
    PipeContext, PipeError, PipeRequest, Response,
};
use crate::typed::{Controller, ControllerRegistry, RegistryError};

/// Builds the immediate answer of the incoming endpoint.
pub type ResponseResolver = Arc<dyn Fn(&PipeRequest) -> Response + Send + Sync>;

/// Where a registered pipe takes its key from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeKey {
    Explicit(String),
    /// The enclosing group's key.
    Inherited,
    Any,
}

impl PipeKey {
    /// Split the `"key:cue"` shorthand. Anything whose prefix is not a plain
    /// field name is a cue with an inherited key.
    pub fn split(shorthand: &str) -> (PipeKey, &str) {
        match shorthand.split_once(':') {
            Some((key, cue)) if key == ANY => (PipeKey::Any, cue),
            Some((key, cue)) if is_field_name(key) => (PipeKey::Explicit(key.to_string()), cue),
            _ => (PipeKey::Inherited, shorthand),
        }
    }
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[derive(Default)]
pub struct Piper {
    pipes: PipeCollection,
    groups: GroupStack,
    controllers: ControllerRegistry,
    middleware_aliases: HashMap<String, Arc<dyn Middleware>>,
    middleware_groups: HashMap<String, Vec<MiddlewareRef>>,
    response_resolver: Option<ResponseResolver>,
    skip_middleware: bool,
}

impl Piper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipes(&self) -> &PipeCollection {
        &self.pipes
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    // ── registration ────────────────────────────────────────────────────

    pub fn registrar(&mut self) -> PipeRegistrar<'_> {
        PipeRegistrar::new(self)
    }

    pub fn with_key(&mut self, key: impl Into<String>) -> PipeRegistrar<'_> {
        self.registrar().with_key(key)
    }

    pub fn with_namespace(&mut self, namespace: impl Into<String>) -> PipeRegistrar<'_> {
        self.registrar().with_namespace(namespace)
    }

    pub fn with_middleware<I, M>(&mut self, middleware: I) -> PipeRegistrar<'_>
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.registrar().with_middleware(middleware)
    }

    pub fn with_alias<I, S>(&mut self, names: I) -> PipeRegistrar<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registrar().with_alias(names)
    }

    pub fn with_where(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> PipeRegistrar<'_> {
        self.registrar().with_where(name, pattern)
    }

    /// Run `body` with `attributes` merged onto the group stack.
    ///
    /// # 使用例
    /// ```ignore
    /// piper.with_key("text").group(|p| {
    ///     p.pipe("ping", "PingController")?;
    ///     p.pipe("weather {city}", "WeatherController@today")?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn group<F>(&mut self, attributes: GroupAttributes, body: F) -> Result<(), PipeError>
    where
        F: FnOnce(&mut Piper) -> Result<(), PipeError>,
    {
        self.groups.push(attributes);
        let result = body(self);
        self.groups.pop();
        result
    }

    /// Register a pipe watching `key`.
    pub fn match_pipe(
        &mut self,
        key: impl Into<String>,
        cue: &str,
        action: impl IntoAction,
    ) -> Result<&mut Pipe, PipeError> {
        self.register(PipeKey::Explicit(key.into()), cue, action)
    }

    /// Register `"key:cue"`, or a bare cue using the group's key.
    pub fn pipe(&mut self, shorthand: &str, action: impl IntoAction) -> Result<&mut Pipe, PipeError> {
        let (key, cue) = PipeKey::split(shorthand);
        self.register(key, cue, action)
    }

    /// Register a pipe that watches every field.
    pub fn any(&mut self, cue: &str, action: impl IntoAction) -> Result<&mut Pipe, PipeError> {
        self.register(PipeKey::Any, cue, action)
    }

    /// Register the catch-all pipe.
    pub fn fallback(&mut self, action: impl IntoAction) -> Result<&mut Pipe, PipeError> {
        self.register_fallback(action, None)
    }

    pub fn register(
        &mut self,
        key: PipeKey,
        cue: &str,
        action: impl IntoAction,
    ) -> Result<&mut Pipe, PipeError> {
        self.register_scoped(key, cue, action, None)
    }

    pub(crate) fn register_scoped(
        &mut self,
        key: PipeKey,
        cue: &str,
        action: impl IntoAction,
        extra: Option<GroupAttributes>,
    ) -> Result<&mut Pipe, PipeError> {
        let scope = self.scope(extra);
        let key = match key {
            PipeKey::Explicit(key) => key,
            PipeKey::Any => ANY.to_string(),
            PipeKey::Inherited => scope.key.clone().ok_or_else(|| {
                PipeError::Configuration(format!(
                    "pipe for [{}] has no key and no enclosing key group",
                    cue.trim()
                ))
            })?,
        };

        let action = namespaced(action.into_action()?, scope.namespace.as_deref());
        let mut pipe = Pipe::with_wheres(key, cue, action, scope.wheres)?;
        pipe.alias(&scope.alias).with_middleware(scope.middleware);
        debug!(key = pipe.key(), cue = pipe.cue(), "pipe registered");
        self.pipes.add(pipe)
    }

    pub(crate) fn register_fallback(
        &mut self,
        action: impl IntoAction,
        extra: Option<GroupAttributes>,
    ) -> Result<&mut Pipe, PipeError> {
        let scope = self.scope(extra);
        let action = namespaced(action.into_action()?, scope.namespace.as_deref());
        let mut pipe = Pipe::fallback(action)?;
        pipe.with_middleware(scope.middleware);
        self.pipes.add(pipe)
    }

    fn scope(&self, extra: Option<GroupAttributes>) -> GroupAttributes {
        let top = self.groups.top().cloned().unwrap_or_default();
        match extra {
            Some(extra) => GroupAttributes::merge(extra, &top),
            None => top,
        }
    }

    // ── middleware / controllers / response ─────────────────────────────

    /// Make `name` usable as a middleware reference.
    pub fn alias_middleware(
        &mut self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> &mut Self {
        self.middleware_aliases.insert(name.into(), middleware);
        self
    }

    /// Make `name` expand to several middleware references.
    pub fn middleware_group<I, M>(&mut self, name: impl Into<String>, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.middleware_groups
            .insert(name.into(), middleware.into_iter().map(Into::into).collect());
        self
    }

    pub fn register_controller<C: Controller>(&mut self, controller: C) -> Result<(), RegistryError> {
        self.controllers.register(controller)
    }

    pub fn set_response_resolver<F>(&mut self, resolver: F) -> &mut Self
    where
        F: Fn(&PipeRequest) -> Response + Send + Sync + 'static,
    {
        self.response_resolver = Some(Arc::new(resolver));
        self
    }

    /// Skip every middleware on dispatch (tests).
    pub fn without_middleware(&mut self) -> &mut Self {
        self.skip_middleware = true;
        self
    }

    /// Immediate answer of the incoming endpoint; `"ok"` unless a resolver is
    /// installed.
    pub fn response(&self, request: &PipeRequest) -> Response {
        match &self.response_resolver {
            Some(resolver) => resolver(request),
            None => Response::ok("ok"),
        }
    }

    // ── dispatch ────────────────────────────────────────────────────────

    pub fn find_pipe(&self, request: &PipeRequest) -> Result<BoundPipe<'_>, PipeError> {
        self.pipes.match_request(request)
    }

    /// Match `request`, run the middleware chain and the pipe's action.
    pub fn dispatch(&self, request: &PipeRequest) -> Result<Response, PipeError> {
        let bound = self.find_pipe(request)?;
        let middleware = if self.skip_middleware {
            Vec::new()
        } else {
            self.gather_middleware(&bound)?
        };

        let controllers = &self.controllers;
        let endpoint: &Endpoint<'_> =
            &|ctx: &PipeContext<'_>| ctx.bound().run(ctx.request(), controllers);
        let ctx = PipeContext::new(request, &bound);

        match Next::new(&middleware, endpoint).run(&ctx) {
            Err(PipeError::Abort(response)) => Ok(*response),
            Err(e) => {
                error!(cue = bound.pipe().cue(), error = %e, "pipe failed");
                Err(e)
            }
            ok => ok,
        }
    }

    /// Resolve the pipe's middleware followed by its controller's, dropping
    /// repeated names.
    pub fn gather_middleware(&self, bound: &BoundPipe<'_>) -> Result<Vec<Arc<dyn Middleware>>, PipeError> {
        let pipe = bound.pipe();
        let mut references: Vec<MiddlewareRef> = pipe.middleware().to_vec();
        if let Action::Controller(action) = pipe.action() {
            references.extend(self.controllers.middleware_for(action));
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for reference in &references {
            if let MiddlewareRef::Named(name) = reference
                && !seen.insert(name.as_str())
            {
                continue;
            }
            self.resolve_middleware(reference, &mut resolved, &mut Vec::new())?;
        }
        Ok(resolved)
    }

    fn resolve_middleware(
        &self,
        reference: &MiddlewareRef,
        resolved: &mut Vec<Arc<dyn Middleware>>,
        expanding: &mut Vec<String>,
    ) -> Result<(), PipeError> {
        let name = match reference {
            MiddlewareRef::Inline(middleware) => {
                resolved.push(Arc::clone(middleware));
                return Ok(());
            }
            MiddlewareRef::Named(name) => name,
        };

        if let Some(middleware) = self.middleware_aliases.get(name) {
            resolved.push(Arc::clone(middleware));
            return Ok(());
        }

        let group = self
            .middleware_groups
            .get(name)
            .ok_or_else(|| PipeError::ActionResolution(format!("Middleware [{name}] is not defined.")))?;
        if expanding.contains(name) {
            return Err(PipeError::ActionResolution(format!(
                "Middleware group [{name}] includes itself."
            )));
        }

        expanding.push(name.clone());
        for inner in group {
            self.resolve_middleware(inner, resolved, expanding)?;
        }
        expanding.pop();
        Ok(())
    }
}

fn namespaced(action: Action, namespace: Option<&str>) -> Action {
    match action {
        Action::Controller(action) => Action::Controller(action.with_namespace(namespace)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, middleware_fn};
    use crate::typed::controller::fixtures::{PingController, TestController};

    fn request(fields: &[(&str, &str)]) -> PipeRequest {
        PipeRequest::from_fields("POST", "/handle-notification", fields.iter().copied())
    }

    fn echo_params() -> Action {
        Action::from_fn(|ctx| Ok(ctx.params().values().cloned().collect::<Vec<_>>().join(" ")))
    }

    fn reply(text: &'static str) -> Action {
        Action::from_fn(move |_| Ok(text))
    }

    #[test]
    fn shorthand_splits_only_on_field_names() {
        assert_eq!(
            PipeKey::split("text:something"),
            (PipeKey::Explicit("text".into()), "something")
        );
        assert_eq!(PipeKey::split("*:ping"), (PipeKey::Any, "ping"));
        assert_eq!(PipeKey::split("say: {x}"), (PipeKey::Explicit("say".into()), " {x}"));
        assert_eq!(PipeKey::split("time 10:30"), (PipeKey::Inherited, "time 10:30"));
    }

    #[test]
    fn dispatch_binds_placeholders() {
        let mut piper = Piper::new();
        piper.match_pipe("trigger", "trigger {text}", echo_params()).unwrap();

        let response = piper
            .dispatch(&request(&[("trigger", "trigger"), ("text", "hi")]))
            .unwrap();
        assert_eq!(response.body_text(), "hi");
    }

    #[test]
    fn literal_match_is_case_insensitive() {
        let mut piper = Piper::new();
        piper.match_pipe("field", "test", reply("matched")).unwrap();

        let response = piper.dispatch(&request(&[("field", "TEST")])).unwrap();
        assert_eq!(response.body_text(), "matched");
    }

    #[test]
    fn unmatched_request_is_not_found() {
        let mut piper = Piper::new();
        piper.match_pipe("text", "config", reply("config")).unwrap();

        let err = piper.dispatch(&request(&[("text", "c")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn leading_placeholders_bind_every_name() {
        let mut piper = Piper::new();
        piper.any("{name} {other}", echo_params()).unwrap();

        let response = piper
            .dispatch(&request(&[("name", "foo"), ("other", "bar")]))
            .unwrap();
        assert_eq!(response.body_text(), "foo bar");
    }

    #[test]
    fn key_group_applies_to_bare_cues() {
        let mut piper = Piper::new();
        piper
            .with_key("text")
            .group(|p| {
                p.pipe("something", reply("grouped"))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(piper.pipes().iter().next().map(Pipe::key), Some("text"));
        let response = piper.dispatch(&request(&[("text", "something")])).unwrap();
        assert_eq!(response.body_text(), "grouped");
    }

    #[test]
    fn bare_cue_without_a_key_group_is_rejected() {
        let mut piper = Piper::new();
        let err = piper.pipe("something", reply("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn controller_actions_resolve_through_the_registry() {
        let mut piper = Piper::new();
        piper.register_controller(TestController).unwrap();
        piper
            .pipe("text:something", "TestController@doSomething")
            .unwrap();

        let response = piper.dispatch(&request(&[("text", "something")])).unwrap();
        assert_eq!(response.body_text(), "doSomething: ");
    }

    #[test]
    fn group_namespace_prefixes_controllers() {
        let mut piper = Piper::new();
        piper.register_controller(PingController).unwrap();
        piper
            .with_namespace("Bot")
            .group(|p| {
                p.match_pipe("text", "ping", "PingController")?;
                Ok(())
            })
            .unwrap();

        let response = piper.dispatch(&request(&[("text", "ping")])).unwrap();
        assert_eq!(response.body_text(), "pong");
    }

    #[test]
    fn middleware_can_short_circuit() {
        let mut piper = Piper::new();
        piper.alias_middleware(
            "auth",
            middleware_fn(|ctx, next| match ctx.input("token") {
                Some("secret") => next.run(ctx),
                _ => Ok(Response::text(401, "denied")),
            }),
        );
        piper
            .match_pipe("text", "ping", reply("pong"))
            .unwrap()
            .with_middleware(["auth"]);

        let denied = piper.dispatch(&request(&[("text", "ping")])).unwrap();
        assert_eq!(denied.status, 401);

        let allowed = piper
            .dispatch(&request(&[("text", "ping"), ("token", "secret")]))
            .unwrap();
        assert_eq!(allowed.body_text(), "pong");
    }

    #[test]
    fn middleware_abort_becomes_the_response() {
        let mut piper = Piper::new();
        piper
            .match_pipe("text", "ping", reply("pong"))
            .unwrap()
            .with_middleware([middleware_fn(|_, _| {
                Err(PipeError::abort(Response::text(429, "slow down")))
            })]);

        let response = piper.dispatch(&request(&[("text", "ping")])).unwrap();
        assert_eq!(response.status, 429);
    }

    #[test]
    fn middleware_groups_expand_in_order() {
        let mut piper = Piper::new();
        let tag = |label: &'static str| {
            middleware_fn(move |ctx, next| {
                let inner = next.run(ctx)?;
                Ok(Response::ok(format!("{label}({})", inner.body_text())))
            })
        };
        piper
            .alias_middleware("outer", tag("outer"))
            .alias_middleware("inner", tag("inner"))
            .middleware_group("web", ["outer", "inner"]);
        piper
            .match_pipe("text", "ping", reply("pong"))
            .unwrap()
            .with_middleware(["web"]);

        let response = piper.dispatch(&request(&[("text", "ping")])).unwrap();
        assert_eq!(response.body_text(), "outer(inner(pong))");
    }

    #[test]
    fn unknown_or_cyclic_middleware_fails_the_request() {
        let mut piper = Piper::new();
        piper.middleware_group("loop", ["loop"]);
        piper
            .match_pipe("text", "ping", reply("pong"))
            .unwrap()
            .with_middleware(["missing"]);
        piper
            .match_pipe("text", "cycle", reply("pong"))
            .unwrap()
            .with_middleware(["loop"]);

        let err = piper.dispatch(&request(&[("text", "ping")])).unwrap_err();
        assert_eq!(err.to_string(), "Middleware [missing] is not defined.");

        let err = piper.dispatch(&request(&[("text", "cycle")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn controller_middleware_runs_only_for_listed_methods() {
        let mut piper = Piper::new();
        piper.register_controller(TestController).unwrap();
        piper.alias_middleware(
            "auth",
            middleware_fn(|_, _| Ok(Response::text(403, "forbidden"))),
        );
        piper.match_pipe("text", "secret", "TestController@secret").unwrap();
        piper.match_pipe("text", "open", "TestController@doSomething").unwrap();

        assert_eq!(piper.dispatch(&request(&[("text", "secret")])).unwrap().status, 403);
        assert_eq!(piper.dispatch(&request(&[("text", "open")])).unwrap().status, 200);

        piper.without_middleware();
        assert_eq!(piper.dispatch(&request(&[("text", "secret")])).unwrap().status, 200);
    }

    #[test]
    fn response_defaults_to_ok_and_can_be_replaced() {
        let mut piper = Piper::new();
        let req = request(&[("text", "hi")]);
        assert_eq!(piper.response(&req).body_text(), "ok");

        piper.set_response_resolver(|req| Response::ok(format!("got {}", req.len())));
        assert_eq!(piper.response(&req).body_text(), "got 1");
    }

    #[test]
    fn handler_errors_propagate() {
        let mut piper = Piper::new();
        piper
            .match_pipe(
                "text",
                "boom",
                Action::from_fn(|_| -> Result<Response, PipeError> {
                    Err(PipeError::handler("exploded"))
                }),
            )
            .unwrap();

        let err = piper.dispatch(&request(&[("text", "boom")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Handler);
        assert_eq!(err.status(), 500);
    }
}
