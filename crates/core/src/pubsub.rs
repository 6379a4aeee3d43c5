// Google Pub/Sub sink
// Decision: Talk to the Pub/Sub REST API directly with reqwest instead of pulling in a gRPC SDK
// Decision: Credentials come from Application Default Credentials (gcp_auth); a fixed
//           PUBSUB_ACCESS_TOKEN overrides them
// Decision: Honour PUBSUB_EMULATOR_HOST the same way Google client libraries do (plain HTTP, no auth)
//
// Each status message becomes one Pub/Sub message whose data is the
// base64-encoded JSON payload. A token is requested on every delivery;
// gcp_auth caches it and refreshes before expiry.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PubSubConfig;
use crate::error::PublishError;
use crate::publisher::MessageSink;

const PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";
const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// TokenSource - Bearer tokens for the REST endpoint
// ============================================================================

/// Source of OAuth access tokens for Pub/Sub requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token
    async fn access_token(&self) -> Result<String, PublishError>;
}

/// A fixed token supplied through configuration
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, PublishError> {
        Ok(self.0.clone())
    }
}

/// Application Default Credentials (service account file, gcloud user
/// credentials or the GCE/Cloud Run metadata server)
#[derive(Clone)]
pub struct DefaultCredentials {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl DefaultCredentials {
    /// Discover credentials from the environment
    ///
    /// Failure here means the instance cannot reach its channel at all.
    pub async fn discover() -> Result<Self, PublishError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| PublishError::Connect(format!("no application default credentials: {e}")))?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl TokenSource for DefaultCredentials {
    async fn access_token(&self) -> Result<String, PublishError> {
        let token = self
            .provider
            .token(&[PUBSUB_SCOPE])
            .await
            .map_err(|e| PublishError::Credentials(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

// ============================================================================
// PubSubSink
// ============================================================================

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<PubsubMessage>,
}

#[derive(Debug, Serialize)]
struct PubsubMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes status payloads to a Pub/Sub topic
#[derive(Clone)]
pub struct PubSubSink {
    client: reqwest::Client,
    publish_url: String,
    credentials: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for PubSubSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubSink")
            .field("publish_url", &self.publish_url)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl PubSubSink {
    /// Build a sink for the configured topic, resolving credentials
    ///
    /// Emulator: plain HTTP, no credentials. Otherwise a configured access
    /// token wins, and Application Default Credentials are discovered last.
    pub async fn connect(config: &PubSubConfig) -> Result<Self, PublishError> {
        if let Some(host) = &config.emulator_host {
            info!(host = %host, "Publishing to Pub/Sub emulator");
            return Self::with_base_url(config, format!("http://{}", host), None);
        }

        let credentials: Arc<dyn TokenSource> = match &config.access_token {
            Some(token) => {
                info!("Using configured Pub/Sub access token");
                Arc::new(StaticToken::new(token.clone()))
            }
            None => {
                let credentials = DefaultCredentials::discover().await?;
                info!("Using application default credentials");
                Arc::new(credentials)
            }
        };

        Self::with_base_url(config, PUBSUB_ENDPOINT, Some(credentials))
    }

    /// Build a sink against an explicit base URL and token source
    pub fn with_base_url(
        config: &PubSubConfig,
        base_url: impl Into<String>,
        credentials: Option<Arc<dyn TokenSource>>,
    ) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        let base_url = base_url.into();
        let publish_url = format!(
            "{}/v1/projects/{}/topics/{}:publish",
            base_url.trim_end_matches('/'),
            config.project_id,
            config.topic_name
        );

        Ok(Self {
            client,
            publish_url,
            credentials,
        })
    }

    pub fn publish_url(&self) -> &str {
        &self.publish_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl MessageSink for PubSubSink {
    async fn deliver(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        let body = PublishRequest {
            messages: vec![PubsubMessage {
                data: STANDARD.encode(payload),
            }],
        };

        let mut request = self.client.post(&self.publish_url).json(&body);
        if let Some(credentials) = &self.credentials {
            request = request.bearer_auth(credentials.access_token().await?);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let published: PublishResponse = response.json().await?;
        debug!(message_ids = ?published.message_ids, "Pub/Sub accepted message");
        Ok(())
    }
}
