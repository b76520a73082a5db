//! Pipe - 登録済みの 1 ルール
//!
//! A pipe watches one request field (`key`, or [`ANY`] for every field) and
//! fires when that field's value matches its cue. Matching never mutates the
//! pipe: [`Pipe::bind`] returns a [`BoundPipe`] carrying the parameters of one
//! request, so a registered pipe can serve concurrent dispatches.
//!
//! # 構成
//! - `Pipe`: key / cue / alias / action / middleware / where 制約
//! - `BoundPipe`: pipe + そのリクエストで抽出したパラメータ
//! - `PipeContext`: handler と middleware に渡すリクエスト単位のビュー

use std::collections::BTreeMap;

use super::action::Action;
use super::cue::{ANY, CuePattern, FALLBACK_PLACEHOLDER, Segment};
use super::errors::PipeError;
use super::middleware::MiddlewareRef;
use super::request::PipeRequest;
use super::response::Response;
use crate::matching;
use crate::typed::ControllerRegistry;

#[derive(Debug, Clone)]
pub struct Pipe {
    key: String,
    cue: String,
    alias: Vec<String>,
    action: Action,
    middleware: Vec<MiddlewareRef>,
    wheres: BTreeMap<String, String>,
    is_fallback: bool,
    pattern: CuePattern,
}

impl Pipe {
    /// Create a pipe watching `key` for `cue`.
    ///
    /// Fails with [`PipeError::Configuration`] when either is empty or the cue
    /// does not compile.
    pub fn new(key: impl Into<String>, cue: &str, action: Action) -> Result<Self, PipeError> {
        Self::with_wheres(key, cue, action, BTreeMap::new())
    }

    /// Like [`Pipe::new`], compiling the cue with placeholder constraints.
    pub fn with_wheres(
        key: impl Into<String>,
        cue: &str,
        action: Action,
        wheres: BTreeMap<String, String>,
    ) -> Result<Self, PipeError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(PipeError::Configuration(format!(
                "pipe for [{cue}] has an empty key"
            )));
        }
        let cue = cue.trim();
        if cue.is_empty() {
            return Err(PipeError::Configuration(format!(
                "pipe on key [{key}] has an empty cue"
            )));
        }

        let pattern = CuePattern::compile(cue, &wheres)?;
        Ok(Self {
            key,
            cue: pattern.to_string(),
            alias: Vec::new(),
            action,
            middleware: Vec::new(),
            wheres,
            is_fallback: false,
            pattern,
        })
    }

    /// Catch-all pipe: any key, a single `{fallback}` placeholder accepting
    /// any value. Always tried after every other pipe.
    pub fn fallback(action: Action) -> Result<Self, PipeError> {
        let wheres = BTreeMap::from([(FALLBACK_PLACEHOLDER.to_string(), ".*".to_string())]);
        let mut pipe = Self::with_wheres(ANY, &format!("{{{FALLBACK_PLACEHOLDER}}}"), action, wheres)?;
        pipe.is_fallback = true;
        Ok(pipe)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cue with literals lowercased.
    pub fn cue(&self) -> &str {
        &self.cue
    }

    pub fn aliases(&self) -> &[String] {
        &self.alias
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    pub fn wheres(&self) -> &BTreeMap<String, String> {
        &self.wheres
    }

    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    pub fn pattern(&self) -> &CuePattern {
        &self.pattern
    }

    pub fn parameter_names(&self) -> &[String] {
        self.pattern.parameter_names()
    }

    pub fn has_alias(&self) -> bool {
        !self.alias.is_empty()
    }

    pub fn starts_with_placeholder(&self) -> bool {
        self.pattern.starts_with_placeholder()
    }

    /// Add literal alternates for the cue. Stored trimmed and lowercased.
    pub fn alias<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if !name.is_empty() && !self.alias.contains(&name) {
                self.alias.push(name);
            }
        }
        self
    }

    /// Append middleware, run in the order given.
    pub fn with_middleware<I, M>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Constrain placeholder `name` to `pattern` and recompile the cue.
    pub fn where_param(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<&mut Self, PipeError> {
        let name = name.into();
        if !self.pattern.parameter_names().contains(&name) {
            return Err(PipeError::Configuration(format!(
                "cue [{}] has no placeholder {{{name}}} to constrain",
                self.cue
            )));
        }
        let mut wheres = self.wheres.clone();
        wheres.insert(name, pattern.into());
        self.pattern = CuePattern::compile(&self.cue, &wheres)?;
        self.wheres = wheres;
        Ok(self)
    }

    /// True iff every validator accepts this pipe for `request`.
    pub fn matches(&self, request: &PipeRequest) -> bool {
        matching::all_pass(self, request)
    }

    /// Extract parameters for `request`.
    ///
    /// Call only after [`Pipe::matches`] returned true; otherwise the
    /// parameter map comes back empty.
    pub fn bind(&self, request: &PipeRequest) -> BoundPipe<'_> {
        let mut parameters = self
            .subjects(request)
            .iter()
            .find_map(|subject| self.pattern.captures(subject))
            .unwrap_or_default();

        if let Some(name) = self.pattern.single_placeholder()
            && self.key != ANY
            && let Some(value) = parameters.get(name).cloned()
        {
            parameters.entry(self.key.clone()).or_insert(value);
        }

        BoundPipe {
            pipe: self,
            parameters,
        }
    }

    /// Values this pipe inspects: the key field's value, or every value for
    /// wildcard pipes. Trimmed and lowercased.
    pub(crate) fn candidates(&self, request: &PipeRequest) -> Vec<String> {
        if self.key == ANY {
            request.values().map(normalize).collect()
        } else {
            request.get(&self.key).map(normalize).into_iter().collect()
        }
    }

    pub(crate) fn alias_matches(&self, candidate: &str) -> bool {
        self.alias
            .iter()
            .any(|alias| candidate == alias || candidate.starts_with(alias.as_str()))
    }

    /// Value a single-placeholder cue binds: the field named after the
    /// placeholder, else the key field, else the first value for wildcard
    /// pipes.
    pub(crate) fn resolve_single<'r>(&self, request: &'r PipeRequest) -> Option<&'r str> {
        let name = self.pattern.single_placeholder()?;
        request.get(name).or_else(|| {
            if self.key == ANY {
                request.values().next()
            } else {
                request.get(&self.key)
            }
        })
    }

    /// Strings the compiled regex is tried against.
    pub(crate) fn subjects(&self, request: &PipeRequest) -> Vec<String> {
        if self.pattern.single_placeholder().is_some() {
            return self
                .resolve_single(request)
                .map(str::to_string)
                .into_iter()
                .collect();
        }
        if self.pattern.starts_with_placeholder() {
            return vec![self.substitute(self.pattern.segments(), request)];
        }

        let prefix = self.pattern.literal_prefix();
        let literal = prefix.trim_end();
        let spacing = &prefix[literal.len()..];
        let rest = self.substitute(&self.pattern.segments()[1..], request);

        let mut subjects: Vec<String> = Vec::new();
        for candidate in self.candidates(request) {
            let head = if self.alias_matches(&candidate) {
                literal
            } else {
                candidate.as_str()
            };
            let subject = format!("{head}{spacing}{rest}");
            if !subjects.contains(&subject) {
                subjects.push(subject);
            }
        }
        subjects
    }

    fn substitute(&self, segments: &[Segment], request: &PipeRequest) -> String {
        segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(name) => request.get(name).unwrap_or_default(),
            })
            .collect()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A pipe together with the parameters bound for one request.
#[derive(Debug, Clone)]
pub struct BoundPipe<'p> {
    pipe: &'p Pipe,
    parameters: BTreeMap<String, String>,
}

impl<'p> BoundPipe<'p> {
    pub fn pipe(&self) -> &'p Pipe {
        self.pipe
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Run the pipe's action.
    ///
    /// A [`PipeError::Abort`] raised by the action becomes its response.
    pub fn run(
        &self,
        request: &PipeRequest,
        controllers: &ControllerRegistry,
    ) -> Result<Response, PipeError> {
        let ctx = PipeContext::new(request, self);
        let result = match self.pipe.action() {
            Action::Handler(handler) => handler(&ctx),
            Action::Controller(action) => controllers.dispatch(action, &ctx),
            Action::Missing => Err(PipeError::ActionResolution(format!(
                "Pipe for [{}] has no action.",
                self.pipe.cue()
            ))),
        };

        match result {
            Err(PipeError::Abort(response)) => Ok(*response),
            other => other,
        }
    }
}

/// What handlers and middleware see of the current request.
#[derive(Debug, Clone, Copy)]
pub struct PipeContext<'a> {
    request: &'a PipeRequest,
    bound: &'a BoundPipe<'a>,
}

impl<'a> PipeContext<'a> {
    pub fn new(request: &'a PipeRequest, bound: &'a BoundPipe<'a>) -> Self {
        Self { request, bound }
    }

    /// Bound cue parameter.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.bound.parameters.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &'a BTreeMap<String, String> {
        &self.bound.parameters
    }

    /// Raw request field.
    pub fn input(&self, name: &str) -> Option<&'a str> {
        self.request.get(name)
    }

    pub fn request(&self) -> &'a PipeRequest {
        self.request
    }

    pub fn pipe(&self) -> &'a Pipe {
        self.bound.pipe
    }

    pub fn bound(&self) -> &'a BoundPipe<'a> {
        self.bound
    }
}
