use super::Validator;
use crate::domain::{ANY, Pipe, PipeRequest};

/// Passes when the pipe watches any field or the request carries its key.
pub struct KeyValidator;

impl Validator for KeyValidator {
    fn name(&self) -> &'static str {
        "key"
    }

    fn matches(&self, pipe: &Pipe, request: &PipeRequest) -> bool {
        pipe.key() == ANY || request.has(pipe.key())
    }
}
