//! PipeManifest - 宣言的なパイプ定義ファイル
//!
//! ```toml
//! fallback = "FallbackController"
//!
//! [[pipes]]
//! key = "text"
//! cue = "ping"
//! action = "PingController"
//! alias = ["p"]
//!
//! [[groups]]
//! key = "text"
//! namespace = "Weather"
//! middleware = ["log"]
//!
//! [[groups.pipes]]
//! cue = "weather {city}"
//! action = "WeatherController@today"
//! where = { city = "[a-z]+" }
//! ```
//!
//! Group attributes go through [`PipeRegistrar::attribute`], so an unknown
//! attribute fails registration just like it does in code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::group::GroupAttributes;
use super::piper::{PipeKey, Piper};
use super::registrar::{AttributeValue, PipeRegistrar};
use crate::domain::{ANY, Action, CuePattern, PipeError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipeManifest {
    #[serde(default)]
    pub pipes: Vec<PipeEntry>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    /// Action of the catch-all pipe.
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipeEntry {
    /// Field to watch; `"*"` for any. Omitted inside key groups, or given
    /// through the `"key:cue"` shorthand.
    #[serde(default)]
    pub key: Option<String>,
    pub cue: String,
    /// `"Controller@method"` or `"Controller"`.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub alias: Vec<String>,
    #[serde(default)]
    pub middleware: Vec<String>,
    #[serde(default, rename = "where")]
    pub wheres: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub pipes: Vec<PipeEntry>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read pipes file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipes file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl PipeManifest {
    pub fn from_toml_str(contents: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Register every pipe, group and the fallback on `piper`.
    pub fn register(&self, piper: &mut Piper) -> Result<(), PipeError> {
        register_all(&self.pipes, &self.groups, piper)?;
        if let Some(action) = &self.fallback {
            piper.fallback(action.as_str())?;
        }
        Ok(())
    }
}

fn register_all(pipes: &[PipeEntry], groups: &[GroupEntry], piper: &mut Piper) -> Result<(), PipeError> {
    for pipe in pipes {
        pipe.register(piper)?;
    }
    for group in groups {
        group.register(piper)?;
    }
    Ok(())
}

impl PipeEntry {
    fn register(&self, piper: &mut Piper) -> Result<(), PipeError> {
        let action = match &self.action {
            Some(reference) => Action::controller(reference)?,
            None => Action::Missing,
        };
        let (key, cue) = match &self.key {
            Some(key) if key == ANY => (PipeKey::Any, self.cue.as_str()),
            Some(key) => (PipeKey::Explicit(key.clone()), self.cue.as_str()),
            None => PipeKey::split(&self.cue),
        };

        let declared = CuePattern::compile(cue, &BTreeMap::new())?;
        if let Some(name) = self
            .wheres
            .keys()
            .find(|name| !declared.parameter_names().contains(*name))
        {
            return Err(PipeError::Configuration(format!(
                "cue [{cue}] has no placeholder {{{name}}} to constrain"
            )));
        }

        // where and middleware are applied before the pipe is added
        let extra = GroupAttributes {
            middleware: self.middleware.iter().map(|name| name.as_str().into()).collect(),
            wheres: self.wheres.clone(),
            ..GroupAttributes::default()
        };
        piper
            .register_scoped(key, cue, action, Some(extra))?
            .alias(&self.alias);
        Ok(())
    }
}

impl GroupEntry {
    fn register(&self, piper: &mut Piper) -> Result<(), PipeError> {
        let registrar = self
            .attributes
            .iter()
            .try_fold(PipeRegistrar::new(piper), |registrar, (name, value)| {
                registrar.attribute(name, value.clone())
            })?;
        registrar.group(|piper| register_all(&self.pipes, &self.groups, piper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipeRequest;

    const MANIFEST: &str = r#"
        fallback = "FallbackController"

        [[pipes]]
        key = "text"
        cue = "ping"
        action = "PingController"
        alias = ["p"]

        [[pipes]]
        cue = "trigger:name {text}"
        action = "TestController@doSomething"

        [[groups]]
        key = "text"
        namespace = "Weather"
        middleware = ["log"]

        [[groups.pipes]]
        cue = "weather {city}"
        action = "WeatherController@today"
        where = { city = "[a-z]+" }

        [[groups.groups]]
        alias = ["w"]

        [[groups.groups.pipes]]
        key = "*"
        cue = "forecast"
        action = "\\Forecast\\Controller"
    "#;

    #[test]
    fn manifest_registers_pipes_groups_and_fallback() {
        let manifest = PipeManifest::from_toml_str(MANIFEST).unwrap();
        let mut piper = Piper::new();
        manifest.register(&mut piper).unwrap();

        let pipes: Vec<_> = piper.pipes().iter().collect();
        assert_eq!(pipes.len(), 5);

        assert_eq!(pipes[0].aliases(), ["p"]);
        assert_eq!(pipes[1].key(), "trigger");
        assert_eq!(pipes[1].cue(), "name {text}");

        assert_eq!(pipes[2].key(), "text");
        assert_eq!(pipes[2].middleware().len(), 1);
        assert_eq!(pipes[2].wheres()["city"], "[a-z]+");
        assert_eq!(
            pipes[2].action().as_controller().map(|a| a.class_name()),
            Some("Weather\\WeatherController")
        );

        assert_eq!(pipes[3].key(), ANY);
        assert_eq!(pipes[3].aliases(), ["w"]);
        assert_eq!(
            pipes[3].action().as_controller().map(|a| a.class_name()),
            Some("Forecast\\Controller")
        );

        assert!(pipes[4].is_fallback());
    }

    #[test]
    fn pipes_without_action_are_registered_as_missing() {
        let manifest = PipeManifest::from_toml_str(
            r#"
            [[pipes]]
            key = "text"
            cue = "todo"
            "#,
        )
        .unwrap();
        let mut piper = Piper::new();
        manifest.register(&mut piper).unwrap();

        let request = PipeRequest::post("/handle-notification").with_field("text", "todo");
        let err = piper.dispatch(&request).unwrap_err();
        assert_eq!(err.to_string(), "Pipe for [todo] has no action.");
    }

    #[test]
    fn invalid_where_leaves_no_pipe_behind() {
        let manifest = PipeManifest::from_toml_str(
            r#"
            [[pipes]]
            key = "text"
            cue = "weather {city}"
            where = { city = "(" }
            "#,
        )
        .unwrap();
        let mut piper = Piper::new();

        let err = manifest.register(&mut piper).unwrap_err();
        assert!(matches!(err, PipeError::Configuration(_)));
        assert_eq!(piper.pipes().len(), 0);

        let request = PipeRequest::post("/handle-notification")
            .with_field("text", "weather")
            .with_field("city", "42");
        assert!(matches!(piper.dispatch(&request), Err(PipeError::NotFound { .. })));
    }

    #[test]
    fn where_on_an_undeclared_placeholder_fails_registration() {
        let manifest = PipeManifest::from_toml_str(
            r#"
            [[pipes]]
            key = "text"
            cue = "weather {city}"
            where = { cty = "[a-z]+" }
            "#,
        )
        .unwrap();
        let mut piper = Piper::new();

        let err = manifest.register(&mut piper).unwrap_err();
        assert!(err.to_string().contains("{cty}"));
        assert_eq!(piper.pipes().len(), 0);
    }

    #[test]
    fn unknown_group_attribute_fails_registration() {
        let manifest = PipeManifest::from_toml_str(
            r#"
            [[groups]]
            prefix = "api"
            "#,
        )
        .unwrap();

        let err = manifest.register(&mut Piper::new()).unwrap_err();
        assert!(err.to_string().contains("Attribute [prefix] does not exist."));
    }

    #[test]
    fn unknown_pipe_field_fails_parsing() {
        let result = PipeManifest::from_toml_str(
            r#"
            [[pipes]]
            cue = "text:ping"
            handler = "PingController"
            "#,
        );
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }
}
