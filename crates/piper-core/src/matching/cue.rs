use super::Validator;
use crate::domain::{ANY, Pipe, PipeRequest};

/// Literal-prefix and alias check.
///
/// A candidate value passes when it and the cue's literal prefix are
/// prefixes of one another (`"trig"` and `"triggering"` both pass for
/// `"trigger"`). Cues starting with a placeholder are left to
/// [`PatternValidator`](super::PatternValidator). When no candidate passes,
/// an alias equal to or prefixing a candidate still does.
pub struct CueValidator;

impl Validator for CueValidator {
    fn name(&self) -> &'static str {
        "cue"
    }

    fn matches(&self, pipe: &Pipe, request: &PipeRequest) -> bool {
        if pipe.starts_with_placeholder() {
            return true;
        }

        let mut candidates = pipe.candidates(request);
        candidates.push(ANY.to_string());

        let literal = pipe.pattern().literal_prefix().trim();
        if candidates
            .iter()
            .any(|candidate| prefix_match(candidate, literal))
        {
            return true;
        }

        pipe.has_alias() && candidates.iter().any(|candidate| pipe.alias_matches(candidate))
    }
}

/// The shorter string is a non-empty prefix of the longer one.
fn prefix_match(a: &str, b: &str) -> bool {
    let (needle, haystack) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    !needle.is_empty() && haystack.starts_with(needle)
}
