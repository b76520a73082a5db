use super::Validator;
use crate::domain::{Pipe, PipeRequest};

/// The compiled cue regex must match the path built from the request.
pub struct PatternValidator;

impl Validator for PatternValidator {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn matches(&self, pipe: &Pipe, request: &PipeRequest) -> bool {
        pipe.subjects(request)
            .iter()
            .any(|subject| pipe.pattern().is_match(subject))
    }
}
