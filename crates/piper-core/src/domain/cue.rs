//! Cue pattern compiler.
//!
//! A cue is the text a request field has to carry for a pipe to fire, e.g.
//! `"weather {city}"`. Literal parts are compared case-insensitively and are
//! stored lowercase; `{name}` placeholders capture request values.
//!
//! # 構成
//! - `parse_segments`: cue をリテラル / プレースホルダの列に分解
//! - `CuePattern::compile`: セグメント列 + where 制約から anchored regex を生成

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use regex::Regex;

use super::errors::PipeError;

/// Key / value sentinel meaning "any field".
pub const ANY: &str = "*";

/// Placeholder name used by fallback pipes.
pub const FALLBACK_PLACEHOLDER: &str = "fallback";

/// Pattern a placeholder matches when no `where` constraint is given.
pub const DEFAULT_PLACEHOLDER_PATTERN: &str = "[^/]+";

/// One piece of a cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Verbatim text, already lowercased.
    Literal(String),
    /// `{name}` placeholder.
    Placeholder(String),
}

/// A compiled cue: its segments, placeholder names and matching regex.
#[derive(Debug, Clone)]
pub struct CuePattern {
    segments: Vec<Segment>,
    parameter_names: Vec<String>,
    regex: Regex,
}

impl CuePattern {
    /// Compile `cue`, using `wheres` as per-placeholder regex constraints.
    ///
    /// Fails with [`PipeError::Configuration`] on unbalanced or nested braces,
    /// placeholder names outside `[A-Za-z]+`, duplicate names, or a
    /// constraint that is not a valid regex.
    pub fn compile(cue: &str, wheres: &BTreeMap<String, String>) -> Result<Self, PipeError> {
        let segments = parse_segments(cue)?;

        let parameter_names: Vec<String> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();

        let mut seen = HashSet::new();
        if let Some(name) = parameter_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(PipeError::Configuration(format!(
                "cue [{cue}] declares placeholder {{{name}}} more than once"
            )));
        }

        let regex = build_regex(&segments, wheres).map_err(|e| {
            PipeError::Configuration(format!("cue [{cue}] does not compile: {e}"))
        })?;

        Ok(Self {
            segments,
            parameter_names,
            regex,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in declaration order.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Text before the first placeholder, or the whole cue when there is none.
    pub fn literal_prefix(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Literal(text)) => text,
            _ => "",
        }
    }

    pub fn has_placeholders(&self) -> bool {
        !self.parameter_names.is_empty()
    }

    pub fn starts_with_placeholder(&self) -> bool {
        matches!(self.segments.first(), Some(Segment::Placeholder(_)))
    }

    /// The placeholder name when the cue is exactly one `{name}`.
    pub fn single_placeholder(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Placeholder(name)] => Some(name),
            _ => None,
        }
    }

    pub fn is_match(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }

    /// Capture every placeholder from `subject`, or `None` if it does not match.
    pub fn captures(&self, subject: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(subject)?;
        Some(
            self.parameter_names
                .iter()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

/// Renders the normalized cue (lowercase literals, placeholders as written).
impl fmt::Display for CuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(name) => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

fn parse_segments(cue: &str) -> Result<Vec<Segment>, PipeError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = cue.char_indices();

    while let Some((at, c)) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, '{')) | None => return Err(unbalanced(cue, at)),
                        Some((_, c)) => name.push(c),
                    }
                }
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(PipeError::Configuration(format!(
                        "cue [{cue}] has an invalid placeholder {{{name}}}"
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            '}' => return Err(unbalanced(cue, at)),
            c => literal.extend(c.to_lowercase()),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn unbalanced(cue: &str, at: usize) -> PipeError {
    PipeError::Configuration(format!("cue [{cue}] has an unbalanced brace at byte {at}"))
}

fn build_regex(
    segments: &[Segment],
    wheres: &BTreeMap<String, String>,
) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("(?i)^");
    for segment in segments {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder(name) => {
                let constraint = wheres
                    .get(name)
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PLACEHOLDER_PATTERN);
                pattern.push_str(&format!("(?P<{name}>{constraint})"));
            }
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn compile(cue: &str) -> CuePattern {
        CuePattern::compile(cue, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn literal_cue_is_an_exact_case_insensitive_match() {
        let pattern = compile("Ping");
        assert_eq!(pattern.to_string(), "ping");
        assert_eq!(pattern.literal_prefix(), "ping");
        assert!(!pattern.has_placeholders());
        assert!(pattern.is_match("PING"));
        assert!(!pattern.is_match("pingpong"));
        assert!(!pattern.is_match("pin"));
    }

    #[test]
    fn placeholders_are_captured_in_declaration_order() {
        let pattern = compile("Trigger {text} to {target}");
        assert_eq!(pattern.literal_prefix(), "trigger ");
        assert_eq!(pattern.parameter_names(), ["text", "target"]);

        let captured = pattern.captures("trigger Hello to Bob").unwrap();
        assert_eq!(captured["text"], "Hello");
        assert_eq!(captured["target"], "Bob");
    }

    #[test]
    fn placeholder_names_keep_their_spelling() {
        let pattern = compile("Find {userId}");
        assert_eq!(pattern.to_string(), "find {userId}");
        assert_eq!(pattern.parameter_names(), ["userId"]);
    }

    #[test]
    fn leading_and_single_placeholders_are_detected() {
        let leading = compile("{name} rest");
        assert!(leading.starts_with_placeholder());
        assert_eq!(leading.literal_prefix(), "");
        assert_eq!(leading.single_placeholder(), None);

        let single = compile("{name}");
        assert_eq!(single.single_placeholder(), Some("name"));
    }

    #[test]
    fn where_constraints_replace_the_default_placeholder_pattern() {
        let wheres = BTreeMap::from([("name".to_string(), "foo|bar".to_string())]);
        let pattern = CuePattern::compile("{name}", &wheres).unwrap();
        assert!(pattern.is_match("foo"));
        assert!(pattern.is_match("BAR"));
        assert!(!pattern.is_match("baz"));
    }

    #[test]
    fn default_placeholder_does_not_cross_slashes() {
        let pattern = compile("open {path}");
        assert!(pattern.is_match("open docs"));
        assert!(!pattern.is_match("open docs/intro"));
    }

    #[rstest]
    #[case::unclosed("trigger {text")]
    #[case::stray_close("trigger text}")]
    #[case::nested("trigger {te{xt}}")]
    #[case::empty_name("trigger {}")]
    #[case::digits("trigger {text1}")]
    #[case::duplicate("{a} and {a}")]
    fn malformed_cues_are_rejected(#[case] cue: &str) {
        let result = CuePattern::compile(cue, &BTreeMap::new());
        assert!(matches!(result, Err(PipeError::Configuration(_))));
    }

    #[test]
    fn invalid_constraint_is_a_configuration_error() {
        let wheres = BTreeMap::from([("name".to_string(), "(".to_string())]);
        let result = CuePattern::compile("{name}", &wheres);
        assert!(matches!(result, Err(PipeError::Configuration(_))));
    }
}
