//! A small profile service.
//!
//! ```text
//! cargo run -p trellis --example profile_service
//! curl 'localhost:3000/20?userId=2020-01-01'
//! curl -X POST localhost:3000/profile -H 'content-type: application/json' \
//!      -d '{"age": "20", "bord": "2020-01-01T00:00:00.000Z"}'
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trellis::prelude::*;

#[derive(Debug, Serialize)]
struct Profile {
    id: String,
    age: String,
}

#[derive(Debug, Deserialize)]
struct BodyRequest {
    age: String,
    bord: Option<DateTime<Utc>>,
}

impl BodyRequest {
    fn age_plus(&self) -> String {
        match self.bord {
            Some(bord) => format!("{}{}", self.age, bord.format("%a %b %d %Y")),
            None => self.age.clone(),
        }
    }
}

impl Validate for BodyRequest {
    fn schema() -> BodySchema {
        BodySchema::new("BodyRequest")
            .field("age", [Rule::IsString])
            .field("bord", [Rule::IsDate])
    }
}

/// Counts ticks in the background.
#[derive(Debug, Default)]
struct Timer {
    ticks: Arc<AtomicU64>,
}

#[async_trait]
impl BackgroundService for Timer {
    async fn on_start(&self) -> Result<(), LifecycleError> {
        let ticks = Arc::clone(&self.ticks);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                let count = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!(count, "Timer tick");
            }
        });
        Ok(())
    }
}

struct UserController {
    id: String,
}

impl Controller for UserController {
    fn routes(routes: &mut Routes<Self>) {
        routes
            .get("get_profile", "/:age")
            .returns::<Profile>()
            .arg(Arg::service::<Timer>())
            .arg(Arg::path("age"))
            .arg(Arg::query("userId").optional().format(StringFormat::Date))
            .handle(|this: Arc<Self>, args: Arguments| async move {
                let timer = args.service::<Timer>(0)?;
                tracing::debug!(ticks = timer.ticks.load(Ordering::Relaxed), "Serving profile");
                Ok::<_, HandlerError>(Profile {
                    id: args.optional_text(2)?.unwrap_or(this.id.as_str()).to_string(),
                    age: args.text(1)?.to_string(),
                })
            });

        routes
            .post("get_profile2", "/profile")
            .returns_many::<Profile>()
            .arg(Arg::body::<BodyRequest>())
            .handle(|this: Arc<Self>, args: Arguments| async move {
                let request: BodyRequest = args.body(0)?;
                tracing::debug!(?request, "Received profile body");
                Ok::<_, HandlerError>(vec![Profile {
                    id: this.id.clone(),
                    age: request.age_plus(),
                }])
            });
    }
}

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    let config = ConfigLoader::new()
        .with_defaults()
        .with_dotenv()?
        .with_env_prefix("TRELLIS")
        .load()?;

    let application = create_application(ApplicationOptions {
        controllers: vec![ControllerRegistration::new(UserController {
            id: "12".to_string(),
        })],
        background_services: vec![ServiceRegistration::new(Timer::default())],
        config,
    })?;
    application.init_telemetry()?;

    let running = application
        .start_with_shutdown(ShutdownSignal::with_os_signals())
        .await?;
    tracing::info!(addr = %running.local_addr(), "Profile service ready");

    running.wait().await
}
