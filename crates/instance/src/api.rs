// HTTP routes
// Decision: Everything except /health is a hello request (router fallback), any method
// Decision: /health answers every method, like the hello fallback
// Decision: Handlers report start/finish to the coordinator and wait for acceptance

use axum::{extract::State, http::StatusCode, routing::any, Router};
use helloapi_core::{CoordinatorHandle, HandlerConfig};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// State shared by the hello handler
#[derive(Clone)]
pub struct AppState {
    pub name: Arc<str>,
    pub response_delay: Duration,
    pub coordinator: CoordinatorHandle,
}

impl AppState {
    pub fn new(name: &str, handler: HandlerConfig, coordinator: CoordinatorHandle) -> Self {
        Self {
            name: Arc::from(name),
            response_delay: handler.response_delay,
            coordinator,
        }
    }
}

/// Build the instance router
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", any(health))
        .fallback(hello)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// /health - liveness, no coordinator interaction
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Delayed hello identifying the instance
async fn hello(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.coordinator.request_started().await.map_err(|e| {
        tracing::warn!(error = %e, "Coordinator unavailable, rejecting request");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    tokio::time::sleep(state.response_delay).await;

    let message = format!("Hi, from instance: {} \n", state.name);
    tracing::info!(message = %message.trim_end(), "Responding");

    state.coordinator.request_finished().await.map_err(|e| {
        tracing::warn!(error = %e, "Coordinator unavailable after response");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use helloapi_core::{Coordinator, InMemorySink, InstanceState, StatusPublisher};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(delay: Duration) -> (Router, CoordinatorHandle, InMemorySink) {
        let sink = InMemorySink::new();
        let (coordinator, handle) = Coordinator::new(
            InstanceState::new("keen-otter"),
            StatusPublisher::new(sink.clone()),
            Duration::from_secs(3600),
        );
        tokio::spawn(coordinator.run());

        let state = AppState::new(
            "keen-otter",
            HandlerConfig {
                response_delay: delay,
            },
            handle.clone(),
        );
        (routes(state), handle, sink)
    }

    #[tokio::test]
    async fn test_health_is_empty_and_silent() {
        let (app, _handle, sink) = app(Duration::ZERO);
        sink.wait_for(1).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_health_accepts_any_method() {
        let (app, _handle, sink) = app(Duration::ZERO);
        sink.wait_for(1).await;

        for method in ["POST", "PUT", "DELETE"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/health")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), 200, "{method} /health");
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert!(body.is_empty());
        }
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_hello_reports_start_and_finish() {
        let (app, handle, sink) = app(Duration::ZERO);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Hi, from instance: keen-otter \n");

        // Start published Processing; the finish shows up in the terminal snapshot
        handle.terminate().await.unwrap();
        sink.wait_for(3).await;
        let messages = sink.messages();
        assert_eq!(messages[1]["InstanceStatus"], 2);
        assert_eq!(messages[2]["InstanceStatus"], 3);
        assert_eq!(messages[2]["RequestCount"], 1);
    }

    #[tokio::test]
    async fn test_any_path_and_method_is_hello() {
        let (app, _handle, _sink) = app(Duration::ZERO);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/anything/else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(b"Hi, from instance: keen-otter"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hello_waits_for_delay() {
        let (app, _handle, _sink) = app(Duration::from_secs(10));

        let started = tokio::time::Instant::now();
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_hello_after_shutdown_is_unavailable() {
        let (app, handle, sink) = app(Duration::ZERO);
        handle.terminate().await.unwrap();
        sink.wait_for(2).await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
