use super::Validator;
use crate::domain::{Pipe, PipeRequest};

/// Every placeholder must be resolvable from the request.
///
/// A single-placeholder cue resolves through the same-named field, the key
/// field or (wildcard pipes) the first field; other cues need one field per
/// placeholder name.
pub struct ParameterValidator;

impl Validator for ParameterValidator {
    fn name(&self) -> &'static str {
        "parameter"
    }

    fn matches(&self, pipe: &Pipe, request: &PipeRequest) -> bool {
        if pipe.pattern().single_placeholder().is_some() {
            return pipe.resolve_single(request).is_some();
        }
        pipe.parameter_names().iter().all(|name| request.has(name))
    }
}
