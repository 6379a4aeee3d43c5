// Helloapi instance
// Decision: Exit immediately after the terminal status publish; in-flight requests are abandoned
// Decision: A failed publish takes the whole instance down with exit code 1

mod api;
mod signals;

use anyhow::{Context, Result};
use helloapi_core::config::HTTP_PORT;
use helloapi_core::{
    random_name, Coordinator, InstanceConfig, InstanceState, LoadGenerator, PubSubSink,
    StatusPublisher,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "helloapi_instance=info,helloapi_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = InstanceConfig::from_env().context("Invalid instance configuration")?;
    tracing::info!(
        project_id = %config.pubsub.project_id,
        topic = %config.pubsub.topic_name,
        emulator = ?config.pubsub.emulator_host,
        message_interval_secs = config.message_interval.as_secs(),
        response_delay_secs = config.handler.response_delay.as_secs(),
        "Configuration loaded"
    );

    let sink = PubSubSink::connect(&config.pubsub)
        .await
        .context("Could not create Pub/Sub client")?;

    let termination = signals::TerminationSignals::install()
        .context("Failed to install termination signal handlers")?;

    let name = random_name();
    tracing::info!(name = %name, "Starting instance...");

    let (coordinator, handle) = Coordinator::new(
        InstanceState::new(name.clone()),
        StatusPublisher::new(sink),
        config.message_interval,
    );
    let mut coordinator_task = tokio::spawn(coordinator.run());

    LoadGenerator::new()
        .spawn(handle.clone())
        .context("Failed to start load generator")?;

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = termination.forward(signal_handle).await {
            tracing::error!(error = %e, "Signal forwarding failed");
        }
    });

    let app = api::routes(api::AppState::new(&name, config.handler, handle));
    let addr = SocketAddr::from(([0, 0, 0, 0], HTTP_PORT));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    tokio::select! {
        result = &mut coordinator_task => {
            match result {
                Ok(Ok(shutdown)) => {
                    tracing::info!(state = ?shutdown.state, "Exiting...");
                    std::process::exit(0);
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Coordinator stopped");
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Coordinator task panicked");
                    std::process::exit(1);
                }
            }
        }
        result = axum::serve(listener, app).into_future() => {
            result.context("Server error")?;
        }
    }

    Ok(())
}
