//! PipeFake - テスト用のダブル
//!
//! Runs requests synchronously through a [`Kernel`] wired to a
//! [`RecordingEventSink`], so tests can assert on the two events a handled
//! request produces instead of on live infrastructure.
//!
//! # 使用例
//! ```ignore
//! let mut piper = Piper::new();
//! piper.match_pipe("text", "ping", Action::from_fn(|_| Ok("pong")))?;
//!
//! let fake = PipeFake::new(piper);
//! fake.pipe([("text", "ping")]);
//! fake.assert_responded_with(|r| r.contains("pong"));
//! ```

use std::sync::Arc;

use crate::app::{Kernel, Piper};
use crate::config::PiperConfig;
use crate::domain::{PipeError, PipeEvent, PipeRequest, Response};
use crate::impls::RecordingEventSink;

pub struct PipeFake {
    kernel: Kernel,
    events: Arc<RecordingEventSink>,
    target: String,
}

impl PipeFake {
    pub fn new(piper: Piper) -> Self {
        Self::with_config(piper, &PiperConfig::default())
    }

    pub fn with_config(piper: Piper, config: &PiperConfig) -> Self {
        let events = Arc::new(RecordingEventSink::new());
        let kernel = Kernel::new(Arc::new(piper)).with_events(events.clone());
        Self {
            kernel,
            events,
            target: format!("/{}", config.incoming_path()),
        }
    }

    pub fn piper(&self) -> &Piper {
        self.kernel.piper()
    }

    /// A `POST` to the incoming path carrying `fields`.
    pub fn request<I, K, V>(&self, fields: I) -> PipeRequest
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PipeRequest::from_fields("POST", self.target.as_str(), fields)
    }

    /// Handle `fields` through the kernel and return the rendered response.
    pub fn pipe<I, K, V>(&self, fields: I) -> Response
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.kernel.handle(&self.request(fields))
    }

    /// Handle `fields`, then return the immediate answer the incoming
    /// endpoint would have sent.
    pub fn acknowledge<I, K, V>(&self, fields: I) -> Response
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = self.request(fields);
        self.kernel.handle(&request);
        self.piper().response(&request)
    }

    /// Dispatch without error rendering and without recording events.
    pub fn try_pipe<I, K, V>(&self, fields: I) -> Result<Response, PipeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.kernel.try_handle(&self.request(fields))
    }

    pub fn events(&self) -> Vec<PipeEvent> {
        self.events.events()
    }

    pub fn clear(&self) {
        self.events.clear();
    }

    #[track_caller]
    pub fn assert_requested(&self) {
        assert!(
            !self.events.requests().is_empty(),
            "expected an incoming pipe request, none was recorded"
        );
    }

    #[track_caller]
    pub fn assert_requested_with<F>(&self, predicate: F)
    where
        F: Fn(&PipeRequest) -> bool,
    {
        let requests = self.events.requests();
        assert!(
            requests.iter().any(predicate),
            "no recorded pipe request satisfies the predicate: {requests:?}"
        );
    }

    #[track_caller]
    pub fn assert_nothing_requested(&self) {
        let requests = self.events.requests();
        assert!(requests.is_empty(), "unexpected pipe requests: {requests:?}");
    }

    #[track_caller]
    pub fn assert_responded(&self) {
        assert!(
            !self.events.responses().is_empty(),
            "expected a pipe response, none was recorded"
        );
    }

    #[track_caller]
    pub fn assert_responded_with<F>(&self, predicate: F)
    where
        F: Fn(&Response) -> bool,
    {
        let responses = self.events.responses();
        assert!(
            responses.iter().any(predicate),
            "no recorded pipe response satisfies the predicate: {responses:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, PipeContext, middleware_fn};
    use crate::typed::controller::fixtures::{PingController, TestController};

    const NO_FIELDS: [(&str, &str); 0] = [];

    fn reply(text: &'static str) -> Action {
        Action::from_fn(move |_| Ok(text))
    }

    fn said(ctx: &PipeContext<'_>) -> Result<String, PipeError> {
        Ok(format!("you said {}", ctx.param("text").unwrap_or_default()))
    }

    fn fake(register: impl FnOnce(&mut Piper) -> Result<(), PipeError>) -> PipeFake {
        let mut piper = Piper::new();
        piper.register_controller(TestController).unwrap();
        piper.register_controller(PingController).unwrap();
        register(&mut piper).unwrap();
        PipeFake::new(piper)
    }

    fn assert_ok_with(fake: &PipeFake, text: &str) {
        fake.assert_responded_with(|r| r.is_success() && r.contains(text));
    }

    #[test]
    fn no_pipe_is_not_found() {
        let fake = fake(|_| Ok(()));
        let err = fake.try_pipe(NO_FIELDS).unwrap_err();
        assert!(matches!(err, PipeError::NotFound { .. }));

        assert!(fake.pipe(NO_FIELDS).is_not_found());
        fake.assert_responded_with(Response::is_not_found);
    }

    #[test]
    fn incoming_endpoint_answers_ok() {
        let fake = fake(|_| Ok(()));
        let response = fake.acknowledge(NO_FIELDS);
        assert_eq!(response.status, 200);
        assert!(response.contains("ok"));
    }

    #[test]
    fn response_resolver_changes_the_answer() {
        let mut piper = Piper::new();
        piper.set_response_resolver(|request| {
            Response::ok(request.get("message").unwrap_or_default())
        });
        let fake = PipeFake::new(piper);

        assert!(fake.acknowledge([("message", "test")]).contains("test"));
    }

    #[test]
    fn handling_records_request_and_response() {
        let fake = fake(|_| Ok(()));
        fake.assert_nothing_requested();

        fake.pipe([("text", "hi")]);

        fake.assert_requested();
        fake.assert_requested_with(|r| r.get("text") == Some("hi"));
        fake.assert_responded();
        assert_eq!(fake.events().len(), 2);
    }

    #[test]
    fn resolves_callbacks_case_insensitively() {
        let fake = fake(|p| {
            p.match_pipe("text", "test", reply("pipe was resolved"))?;
            Ok(())
        });

        fake.pipe([("text", "test")]);
        fake.pipe([("text", "TEST")]);
        assert_eq!(fake.events.responses().len(), 2);
        assert!(fake.events.responses().iter().all(|r| r.contains("pipe was resolved")));
    }

    #[test]
    fn resolves_controller_actions() {
        let fake = fake(|p| {
            p.match_pipe("text", "something", "TestController@doSomething")?;
            Ok(())
        });
        fake.pipe([("text", "something")]);
        assert_ok_with(&fake, "doSomething");
    }

    #[test]
    fn resolves_controller_actions_through_the_shorthand() {
        let fake = fake(|p| {
            p.pipe("text:something", "\\TestController@doSomething")?;
            Ok(())
        });
        fake.pipe([("text", "something")]);
        assert_ok_with(&fake, "doSomething");
    }

    #[test]
    fn middleware_can_answer_first() {
        let fake = fake(|p| {
            p.with_middleware([middleware_fn(|_, _| Ok(Response::ok("middleware succeeded")))])
                .match_pipe("text", "middle", reply("middleware failed"))?;
            Ok(())
        });
        fake.pipe([("text", "middle")]);
        assert_ok_with(&fake, "middleware succeeded");
    }

    #[test]
    fn key_groups_pass_their_key_on() {
        let fake = fake(|p| {
            p.with_key("text").group(|p| {
                p.pipe("something", reply("did one"))?;
                p.pipe("report", reply("it ignored report()"))?;
                Ok(())
            })
        });
        fake.pipe([("text", "something")]);
        fake.pipe([("text", "report")]);
        assert_ok_with(&fake, "did one");
        assert_ok_with(&fake, "it ignored report()");
    }

    #[test]
    fn namespace_groups_qualify_controller_actions() {
        let fake = fake(|p| {
            p.with_namespace("Bot").with_key("test").group(|p| {
                p.pipe("ping", "PingController")?;
                Ok(())
            })
        });
        fake.pipe([("test", "ping")]);
        assert_ok_with(&fake, "pong");
    }

    #[test]
    fn fallback_handles_the_rest() {
        let fake = fake(|p| {
            p.match_pipe("text", "hello", reply("hi"))?;
            p.fallback(reply("no other pipe did match up"))?;
            Ok(())
        });
        fake.pipe([("foo", "bar")]);
        assert_ok_with(&fake, "no other pipe did match up");
    }

    #[test]
    fn binds_placeholders_after_a_literal() {
        let fake = fake(|p| {
            p.pipe("trigger:name {text}", Action::from_fn(said))?;
            Ok(())
        });
        fake.pipe([("trigger", "name"), ("text", "something")]);
        assert_ok_with(&fake, "you said something");
    }

    #[test]
    fn single_placeholder_prefers_the_named_field() {
        let fake = fake(|p| {
            p.pipe("trigger:{text}", Action::from_fn(said))?;
            Ok(())
        });

        let response = fake.pipe([("trigger", "something")]);
        assert_eq!(response.body_text(), "you said something");

        let response = fake.pipe([("trigger", "something"), ("text", "another")]);
        assert_eq!(response.body_text(), "you said another");
    }

    #[test]
    fn binds_multiple_placeholders() {
        let fake = fake(|p| {
            p.any(
                "{name} {other}",
                Action::from_fn(|ctx| {
                    Ok(format!(
                        "{} {}",
                        ctx.param("name").unwrap_or_default(),
                        ctx.param("other").unwrap_or_default()
                    ))
                }),
            )?;
            Ok(())
        });
        fake.pipe([("name", "foo"), ("other", "bar")]);
        assert_ok_with(&fake, "foo bar");
    }

    #[test]
    fn wildcard_pipes_need_the_whole_literal() {
        let fake = fake(|p| {
            p.any("name {text}", Action::from_fn(said))?;
            Ok(())
        });

        let response = fake.pipe([("bla", "name"), ("text", "something")]);
        assert_eq!(response.body_text(), "you said something");

        assert!(fake.pipe([("bla", "nam"), ("text", "something")]).is_not_found());
    }

    #[test]
    fn where_constraints_filter_values() {
        let fake = fake(|p| {
            p.any("{name}", Action::from_fn(|ctx| Ok(ctx.param("name").unwrap_or_default().to_string())))?
                .where_param("name", "foo")?;
            Ok(())
        });

        assert_eq!(fake.pipe([("name", "foo")]).body_text(), "foo");
        assert!(fake.pipe([("name", "bar")]).is_not_found());
    }

    #[test]
    fn aliases_match_exactly_or_as_prefix() {
        let fake = fake(|p| {
            p.any("mshule", reply("matched"))?.alias(["mhule", "mule"]);
            Ok(())
        });
        assert_eq!(fake.pipe([("foo", "mule")]).body_text(), "matched");
        assert_eq!(fake.pipe([("foo", "mule1")]).body_text(), "matched");
    }

    #[test]
    fn predefined_aliases_apply() {
        let fake = fake(|p| {
            p.with_alias(["mhule", "mule"]).any("mshule", reply("matched"))?;
            Ok(())
        });
        assert_eq!(fake.pipe([("foo", "mule")]).body_text(), "matched");
    }

    #[test]
    fn one_character_does_not_match_a_literal_cue() {
        let fake = fake(|p| {
            p.with_key("text").group(|p| {
                p.pipe("config", reply("config pipe triggered"))?;
                Ok(())
            })
        });
        assert!(fake.pipe([("text", "c")]).is_not_found());
        fake.assert_responded_with(Response::is_not_found);
    }

    #[test]
    fn custom_incoming_path_is_used_for_requests() {
        let config = PiperConfig {
            incoming_request_path: "/bots/hook/".into(),
            ..PiperConfig::default()
        };
        let fake = PipeFake::with_config(Piper::new(), &config);
        let request = fake.request([("text", "x")]);
        assert_eq!(request.target(), "/bots/hook");
        assert_eq!(request.path(), "bots/hook");
    }
}
