//! Startup ordering and serving over a real socket.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use trellis::prelude::*;

type EventLog = Arc<Mutex<Vec<String>>>;

struct SlowCache {
    log: EventLog,
    delay: Duration,
}

#[async_trait]
impl BackgroundService for SlowCache {
    async fn on_start(&self) -> Result<(), LifecycleError> {
        tokio::time::sleep(self.delay).await;
        self.log.lock().push("cache warmed".into());
        Ok(())
    }
}

struct Mailer {
    log: EventLog,
}

#[async_trait]
impl BackgroundService for Mailer {
    async fn on_start(&self) -> Result<(), LifecycleError> {
        self.log.lock().push("mailer connected".into());
        Ok(())
    }
}

struct Stuck;

#[async_trait]
impl BackgroundService for Stuck {
    async fn on_start(&self) -> Result<(), LifecycleError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

struct AgeController;

impl Controller for AgeController {
    fn routes(routes: &mut Routes<Self>) {
        routes
            .get("get_age", "/:age")
            .arg(Arg::path("age"))
            .arg(Arg::query("userId").optional().format(StringFormat::Date))
            .handle(|_this, args: Arguments| async move {
                let age = args.text(0)?;
                let user_id = args.optional_text(1)?;
                Ok::<_, HandlerError>(json!({ "age": age, "id": user_id }))
            });
    }
}

fn local_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.http_addr = "127.0.0.1:0".into();
    config
}

#[tokio::test]
async fn test_services_start_before_listening() {
    let log = EventLog::default();
    let application = Application::builder()
        .controller(AgeController)
        .background_service(SlowCache {
            log: Arc::clone(&log),
            delay: Duration::from_millis(50),
        })
        .background_service(Mailer {
            log: Arc::clone(&log),
        })
        .config(local_config())
        .build()
        .unwrap();

    let running = application.start(0).await.unwrap();
    log.lock().push("listening".into());

    // Hooks run concurrently, so the fast one finishes first.
    assert_eq!(
        *log.lock(),
        vec!["mailer connected", "cache warmed", "listening"]
    );
    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_startup_timeout_prevents_binding() {
    let mut config = local_config();
    config.lifecycle.startup_timeout_ms = Some(20);
    let application = Application::builder()
        .controller(AgeController)
        .background_service(Stuck)
        .config(config)
        .build()
        .unwrap();

    let err = application.start(0).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Lifecycle(LifecycleError::StartupTimeout { .. })
    ));
}

#[tokio::test]
async fn test_serves_over_tcp() {
    let application = Application::builder()
        .controller(AgeController)
        .config(local_config())
        .build()
        .unwrap();
    let running = application.start(0).await.unwrap();
    let base = format!("http://{}", running.local_addr());

    let response = reqwest::get(format!("{base}/20?userId=2020-01-01")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        json!({"age": "20", "id": "2020-01-01"})
    );

    let response = reqwest::get(format!("{base}/20?userId=soon")).await.unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["cause"], "Invalid format of query \"userId\".");

    let response = reqwest::Client::new()
        .post(format!("{base}/20"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = local_config();
    config.server.max_body_bytes = 16;

    struct Sink;

    impl Controller for Sink {
        fn routes(routes: &mut Routes<Self>) {
            routes
                .post("accept", "/sink")
                .handle(|_this, _args| async { Ok::<_, HandlerError>(()) });
        }
    }

    let application = Application::builder()
        .controller(Sink)
        .config(config)
        .build()
        .unwrap();
    let running = application.start(0).await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/sink", running.local_addr()))
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    running.shutdown().await.unwrap();
}
