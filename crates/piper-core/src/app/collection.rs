//! PipeCollection - 登録済みパイプの索引
//!
//! Pipes are kept in registration order and indexed by key. Lookups return
//! the pipes of the requested keys plus the wildcard bucket; matching then
//! tries regular pipes before fallback pipes.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::domain::{ANY, BoundPipe, Pipe, PipeError, PipeRequest};

#[derive(Debug, Default)]
pub struct PipeCollection {
    pipes: Vec<Pipe>,
    by_key: HashMap<String, Vec<usize>>,
    identities: HashSet<(String, String)>,
}

impl PipeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `pipe`. The same key and cue may only be registered once.
    pub fn add(&mut self, pipe: Pipe) -> Result<&mut Pipe, PipeError> {
        let identity = (pipe.key().to_string(), pipe.cue().to_string());
        if self.identities.contains(&identity) {
            return Err(PipeError::Configuration(format!(
                "a pipe for [{}] on key [{}] is already registered",
                identity.1, identity.0
            )));
        }

        let index = self.pipes.len();
        self.by_key
            .entry(pipe.key().to_string())
            .or_default()
            .push(index);
        self.identities.insert(identity);
        self.pipes.push(pipe);
        Ok(&mut self.pipes[index])
    }

    /// Pipes registered under any of `keys` or under the wildcard key, in
    /// registration order. No keys means every pipe.
    pub fn get<'k, I>(&self, keys: I) -> Vec<&Pipe>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let keys: Vec<&str> = keys.into_iter().collect();
        if keys.is_empty() {
            return self.pipes.iter().collect();
        }

        let mut indexes: Vec<usize> = keys
            .into_iter()
            .chain(std::iter::once(ANY))
            .filter_map(|key| self.by_key.get(key))
            .flatten()
            .copied()
            .collect();
        indexes.sort_unstable();
        indexes.dedup();
        indexes.into_iter().map(|index| &self.pipes[index]).collect()
    }

    /// First matching pipe, bound to `request`.
    ///
    /// Regular pipes are tried in registration order, then fallback pipes.
    pub fn match_request(&self, request: &PipeRequest) -> Result<BoundPipe<'_>, PipeError> {
        if request.is_empty() {
            warn!(request = %request, "empty pipe request");
            return Err(PipeError::not_found(request));
        }

        let (fallbacks, regular): (Vec<&Pipe>, Vec<&Pipe>) = self
            .get(request.keys())
            .into_iter()
            .partition(|pipe| pipe.is_fallback());

        let Some(pipe) = regular
            .into_iter()
            .chain(fallbacks)
            .find(|pipe| pipe.matches(request))
        else {
            warn!(request = %request, fields = ?request.keys().collect::<Vec<_>>(), "no pipe matched");
            return Err(PipeError::not_found(request));
        };

        let bound = pipe.bind(request);
        debug!(
            key = pipe.key(),
            cue = pipe.cue(),
            parameters = ?bound.parameters(),
            "pipe matched"
        );
        Ok(bound)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pipe> {
        self.pipes.iter()
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
}

impl<'a> IntoIterator for &'a PipeCollection {
    type Item = &'a Pipe;
    type IntoIter = std::slice::Iter<'a, Pipe>;

    fn into_iter(self) -> Self::IntoIter {
        self.pipes.iter()
    }
}
