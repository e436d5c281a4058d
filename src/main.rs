//! Food delivery ordering service

use anyhow::Result;
use food_delivery::api::{router, AppState};
use food_delivery::config::AppConfig;
use food_delivery::ports::EventPublisher;
use food_delivery::store::{MockPaymentGateway, NatsPublisher, TracingPublisher};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.event_subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, %url, "NATS unreachable, domain events go to the log");
                Arc::new(TracingPublisher)
            }
        },
        None => Arc::new(TracingPublisher),
    };
    if config.payment_auto_settle {
        tracing::warn!("card payments are simulated: every payment intent is settled on creation");
    } else {
        tracing::warn!("card payments are simulated: payment intents are never settled, card checkout will be refused");
    }
    let payments = Arc::new(MockPaymentGateway::new(config.payment_auto_settle));
    let state = AppState::in_memory(config.pricing, &config.currency, payments, publisher);
    let app = router(state);

    tracing::info!("food-delivery listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
