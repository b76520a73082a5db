use std::error::Error;
use std::io::BufRead;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use piper_core::app::{IncomingGateway, Kernel, PiperBuilder, WorkerGroup};
use piper_core::config::PiperConfig;
use piper_core::domain::{
    Action, PipeContext, PipeError, PipeEvent, PipeRequest, Response, middleware_fn,
};
use piper_core::impls::InMemoryJobQueue;
use piper_core::ports::{EventSink, JobQueue};
use piper_core::typed::{Controller, ControllerMiddleware};

/// 返信を待つ上限
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

struct PingController;

impl Controller for PingController {
    const NAME: &'static str = "PingController";

    fn methods(&self) -> &[&'static str] {
        &[piper_core::domain::INVOKE_METHOD]
    }

    fn call(&self, _method: &str, _ctx: &PipeContext<'_>) -> Result<Response, PipeError> {
        Ok(Response::ok("pong"))
    }
}

struct WeatherController;

impl Controller for WeatherController {
    const NAME: &'static str = "WeatherController";

    fn methods(&self) -> &[&'static str] {
        &["today", "week"]
    }

    fn call(&self, method: &str, ctx: &PipeContext<'_>) -> Result<Response, PipeError> {
        let city = ctx.param("city").unwrap_or("somewhere");
        let forecast = match method {
            "today" => format!("sunny in {city} today"),
            _ => format!("rain all week in {city}"),
        };
        Ok(Response::json(json!({ "city": city, "forecast": forecast })))
    }

    fn middleware(&self) -> Vec<ControllerMiddleware> {
        vec![ControllerMiddleware::new("log").only(["week"])]
    }
}

/// Forwards every kernel event to the main task.
struct ChannelSink(mpsc::UnboundedSender<PipeEvent>);

impl EventSink for ChannelSink {
    fn emit(&self, event: PipeEvent) {
        // main may have stopped listening
        let _ = self.0.send(event);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("piper_cli=info,piper_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

fn demo_requests() -> Vec<serde_json::Value> {
    vec![
        json!({ "text": "ping" }),
        json!({ "text": "PING" }),
        json!({ "text": "p" }),
        json!({ "text": "weather", "city": "berlin" }),
        json!({ "text": "weather", "city": "42" }),
        json!({ "trigger": "forecast", "city": "oslo" }),
        json!({ "text": "echo", "words": "hello there" }),
        json!({ "sticker": "thumbs-up" }),
    ]
}

/// stdin の JSON 行を読む（`--stdin` 指定時のみ）
fn stdin_requests() -> Result<Vec<serde_json::Value>, Box<dyn Error>> {
    let mut payloads = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        payloads.push(serde_json::from_str(&line)?);
    }
    Ok(payloads)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let mut read_stdin = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--stdin" => read_stdin = true,
            _ => config_path = Some(arg),
        }
    }
    let config = match &config_path {
        Some(path) => PiperConfig::load_from(path)?,
        None => PiperConfig::default(),
    };

    // (A) Piper を組み立てる（controller, middleware, pipes）
    let piper = PiperBuilder::new(config.clone())
        .controller(PingController)?
        .controller(WeatherController)?
        .middleware(
            "log",
            middleware_fn(|ctx, next| {
                info!(pipe = ctx.pipe().cue(), "log middleware");
                next.run(ctx)
            }),
        )
        .response_resolver(|_| Response::text(202, "accepted"))
        .pipes(|p| {
            p.match_pipe("text", "ping", "PingController")?.alias(["p"]);
            p.with_key("text").group(|p| {
                p.pipe("weather {city}", "WeatherController@today")?
                    .where_param("city", "[a-z]+")?;
                p.pipe(
                    "echo {words}",
                    Action::from_fn(|ctx| Ok(ctx.param("words").unwrap_or_default().to_string())),
                )?
                .where_param("words", ".+")?;
                Ok(())
            })?;
            p.pipe("trigger:forecast {city}", "WeatherController@week")?;
            p.fallback(Action::from_fn(|ctx| {
                Ok(Response::text(404, format!("no idea what to do with {}", ctx.request())))
            }))?;
            Ok(())
        })?
        .verify_actions()
        .build()?;
    let piper = Arc::new(piper);

    // (B) Queue, Kernel, Worker を用意
    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let kernel = Kernel::new(Arc::clone(&piper)).with_events(Arc::new(ChannelSink(events_tx)));
    let workers = WorkerGroup::spawn(
        config.workers,
        Arc::clone(&queue),
        config.queue.clone(),
        Arc::new(kernel),
    );
    let gateway = IncomingGateway::new(&config, Arc::clone(&queue), piper);

    // (C) リクエストを受け付ける（すぐに応答が返り、処理はワーカー側）
    let payloads = if read_stdin { stdin_requests()? } else { demo_requests() };
    let target = format!("/{}", config.incoming_path());
    let mut accepted = 0;
    for payload in &payloads {
        let request = match PipeRequest::from_json("POST", target.as_str(), payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "skipping payload");
                continue;
            }
        };
        let ack = gateway.accept(request).await?;
        println!(
            "accepted {} -> {} {}",
            ack.job_id,
            ack.response.status,
            ack.response.body_text()
        );
        accepted += 1;
    }

    // (D) ワーカーの返信を待つ
    let mut replies = 0;
    while replies < accepted {
        match timeout(REPLY_TIMEOUT, events_rx.recv()).await {
            Ok(Some(PipeEvent::IncomingPipeResponse { response, .. })) => {
                println!("reply: {} {}", response.status, response.body_text());
                replies += 1;
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                warn!(replies, accepted, "timed out waiting for replies");
                break;
            }
        }
    }

    // (E) graceful shutdown
    workers.shutdown_and_join().await;
    Ok(())
}
