//! ControllerRegistry - Controller の登録と名前解決
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use std::collections::HashMap;
use std::sync::Arc;

use super::controller::{Controller, DynController, TypedController};
use crate::domain::{
    ControllerAction, INVOKE_METHOD, MiddlewareRef, PipeContext, PipeError, Response,
};

/// # 使用例
/// ```ignore
/// let mut registry = ControllerRegistry::new();
/// registry.register(WeatherController)?;
///
/// let response = registry.dispatch(&ControllerAction::parse("Bot\\WeatherController@today")?, &ctx)?;
/// ```
#[derive(Default, Clone)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn DynController>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Controller '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Controller>(&mut self, controller: C) -> Result<(), RegistryError> {
        let name = C::NAME.trim_start_matches('\\').to_string();
        if self.controllers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.controllers
            .insert(name, Arc::new(TypedController::new(controller)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynController>> {
        self.controllers.get(name.trim_start_matches('\\')).cloned()
    }

    /// Whether `action` names a registered controller and one of its methods.
    pub fn resolves(&self, action: &ControllerAction) -> bool {
        self.get(action.class_name())
            .is_some_and(|controller| controller.has_method(action.method()))
    }

    pub fn dispatch(
        &self,
        action: &ControllerAction,
        ctx: &PipeContext<'_>,
    ) -> Result<Response, PipeError> {
        let controller = self.get(action.class_name()).ok_or_else(|| {
            PipeError::ActionResolution(format!(
                "Controller [{}] is not registered.",
                action.class_name()
            ))
        })?;

        if !controller.has_method(action.method()) {
            let message = if action.method() == INVOKE_METHOD {
                format!("Invalid pipe action: [{}] is not invokable.", action.class_name())
            } else {
                format!("Method [{action}] does not exist.")
            };
            return Err(PipeError::ActionResolution(message));
        }

        controller.call_dyn(action.method(), ctx)
    }

    /// Controller middleware that applies to `action`'s method.
    pub fn middleware_for(&self, action: &ControllerAction) -> Vec<MiddlewareRef> {
        self.get(action.class_name())
            .map(|controller| {
                controller
                    .middleware()
                    .into_iter()
                    .filter(|m| m.applies_to(action.method()))
                    .map(|m| m.middleware().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.controllers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Pipe, PipeRequest};
    use crate::typed::controller::fixtures::{PingController, TestController};

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(TestController).unwrap();
        registry.register(PingController).unwrap();
        registry
    }

    fn run(registry: &ControllerRegistry, reference: &str) -> Result<Response, PipeError> {
        let action = ControllerAction::parse(reference).unwrap();
        let pipe = Pipe::new("text", "{text}", Action::from(action.clone())).unwrap();
        let request = PipeRequest::post("/hook").with_field("text", "something");
        let bound = pipe.bind(&request);
        registry.dispatch(&action, &PipeContext::new(&request, &bound))
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = registry();
        let result = registry.register(TestController);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "TestController"));
    }

    #[test]
    fn registered_names_are_sorted_without_leading_backslash() {
        assert_eq!(
            registry().registered_names(),
            ["Bot\\PingController", "TestController"]
        );
    }

    #[test]
    fn dispatches_to_the_named_method() {
        let response = run(&registry(), "TestController@doSomething").unwrap();
        assert_eq!(response.body_text(), "doSomething: something");
    }

    #[test]
    fn invokable_controller_is_called_without_a_method() {
        let response = run(&registry(), "\\Bot\\PingController").unwrap();
        assert_eq!(response.body_text(), "pong");
    }

    #[test]
    fn unresolvable_actions_report_what_is_missing() {
        let registry = registry();

        let err = run(&registry, "MissingController@index").unwrap_err();
        assert_eq!(err.to_string(), "Controller [MissingController] is not registered.");

        let err = run(&registry, "TestController@nothing").unwrap_err();
        assert_eq!(err.to_string(), "Method [TestController@nothing] does not exist.");

        let err = run(&registry, "TestController").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid pipe action: [TestController] is not invokable."
        );
    }

    #[test]
    fn middleware_is_filtered_by_method() {
        let registry = registry();
        let secret = ControllerAction::parse("TestController@secret").unwrap();
        let open = ControllerAction::parse("TestController@doSomething").unwrap();

        assert_eq!(registry.middleware_for(&secret).len(), 1);
        assert!(registry.middleware_for(&open).is_empty());
        assert!(registry.resolves(&open));
        assert!(!registry.resolves(&ControllerAction::parse("Nope@x").unwrap()));
    }
}
