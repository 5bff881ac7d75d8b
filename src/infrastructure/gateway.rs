use crate::domain::gateway::{GatewayError, GatewayIntent, IntentStatus};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fixture entry: either a status or a simulated failure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FixtureEntry {
    Error { error: String },
    Status(IntentStatus),
}

/// Gateway answering from a fixed table of intents.
///
/// Used by tests and by the CLI when no live gateway is configured.
/// Unknown intents answer `NotFound`.
#[derive(Debug, Default, Clone)]
pub struct StaticGateway {
    intents: Arc<RwLock<HashMap<String, std::result::Result<GatewayIntent, GatewayError>>>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON object mapping intent ids to a status string, or to
    /// `{"error": "..."}` for an intent whose lookup should fail.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        let table: HashMap<String, FixtureEntry> = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidInput(format!("malformed gateway fixture: {}", e)))?;
        let intents = table
            .into_iter()
            .map(|(id, entry)| {
                let answer = match entry {
                    FixtureEntry::Status(status) => Ok(GatewayIntent {
                        id: id.clone(),
                        status,
                        metadata: HashMap::new(),
                    }),
                    FixtureEntry::Error { error } => Err(GatewayError::Transport(error)),
                };
                (id, answer)
            })
            .collect();
        Ok(Self {
            intents: Arc::new(RwLock::new(intents)),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let payload = std::fs::read(path.as_ref()).map_err(|e| {
            PaymentError::InvalidInput(format!(
                "cannot read gateway fixture {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&payload)
    }

    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) {
        self.intents.write().await.insert(
            intent_id.to_string(),
            Ok(GatewayIntent {
                id: intent_id.to_string(),
                status,
                metadata: HashMap::new(),
            }),
        );
    }

    pub async fn set_error(&self, intent_id: &str, error: GatewayError) {
        self.intents
            .write()
            .await
            .insert(intent_id.to_string(), Err(error));
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn retrieve_intent(
        &self,
        intent_id: &str,
    ) -> std::result::Result<GatewayIntent, GatewayError> {
        self.intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::NotFound(intent_id.to_string())))
    }
}

#[cfg(feature = "gateway-stripe")]
pub use stripe::StripeGateway;

#[cfg(feature = "gateway-stripe")]
mod stripe {
    use super::*;
    use reqwest::StatusCode;
    use std::time::Duration;

    pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

    /// Reads payment intents from the Stripe REST API.
    #[derive(Clone)]
    pub struct StripeGateway {
        http: reqwest::Client,
        api_base: String,
        secret_key: String,
    }

    impl StripeGateway {
        pub fn new(secret_key: impl Into<String>, api_base: Option<String>) -> Result<Self> {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;
            Ok(Self {
                http,
                api_base: api_base
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                secret_key: secret_key.into(),
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for StripeGateway {
        async fn retrieve_intent(
            &self,
            intent_id: &str,
        ) -> std::result::Result<GatewayIntent, GatewayError> {
            let url = format!("{}/v1/payment_intents/{}", self.api_base, intent_id);
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.secret_key)
                .send()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            match response.status() {
                s if s.is_success() => response
                    .json::<GatewayIntent>()
                    .await
                    .map_err(|e| GatewayError::Transport(format!("invalid intent payload: {}", e))),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(GatewayError::Auth(response.status().to_string()))
                }
                StatusCode::NOT_FOUND => Err(GatewayError::NotFound(intent_id.to_string())),
                other => Err(GatewayError::Transport(format!("unexpected status {}", other))),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn answering(status: u16, body: serde_json::Value) -> MockServer {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/payment_intents/pi_1"))
                .and(header("authorization", "Bearer sk_test_key"))
                .respond_with(ResponseTemplate::new(status).set_body_json(body))
                .mount(&server)
                .await;
            server
        }

        fn gateway(server: &MockServer) -> StripeGateway {
            StripeGateway::new("sk_test_key", Some(format!("{}/", server.uri()))).unwrap()
        }

        #[tokio::test]
        async fn test_stripe_parses_intent_with_metadata() {
            let server = answering(
                200,
                serde_json::json!({
                    "id": "pi_1",
                    "object": "payment_intent",
                    "amount": 36000,
                    "status": "succeeded",
                    "metadata": {"order_id": "7", "payment_type": "deposit"}
                }),
            )
            .await;

            let intent = gateway(&server).retrieve_intent("pi_1").await.unwrap();
            assert_eq!(intent.id, "pi_1");
            assert_eq!(intent.status, IntentStatus::Succeeded);
            assert_eq!(intent.order_id(), Some(crate::domain::order::OrderId(7)));
            assert_eq!(
                intent.payment_type(),
                Some(crate::domain::order::PaymentType::Deposit)
            );
        }

        #[tokio::test]
        async fn test_stripe_maps_error_statuses() {
            let body = serde_json::json!({"error": {"message": "nope"}});
            for status in [401, 403] {
                let server = answering(status, body.clone()).await;
                assert!(matches!(
                    gateway(&server).retrieve_intent("pi_1").await,
                    Err(GatewayError::Auth(_))
                ));
            }

            let server = answering(404, body.clone()).await;
            assert_eq!(
                gateway(&server).retrieve_intent("pi_1").await,
                Err(GatewayError::NotFound("pi_1".to_string()))
            );

            let server = answering(500, body).await;
            assert!(matches!(
                gateway(&server).retrieve_intent("pi_1").await,
                Err(GatewayError::Transport(_))
            ));
        }

        #[tokio::test]
        async fn test_stripe_rejects_malformed_payload() {
            let server = answering(200, serde_json::json!({"unexpected": true})).await;
            assert!(matches!(
                gateway(&server).retrieve_intent("pi_1").await,
                Err(GatewayError::Transport(_))
            ));
        }

        #[tokio::test]
        async fn test_stripe_unreachable_api_is_transport_error() {
            let gateway =
                StripeGateway::new("sk_test_key", Some("http://127.0.0.1:1".to_string())).unwrap();
            assert!(matches!(
                gateway.retrieve_intent("pi_1").await,
                Err(GatewayError::Transport(_))
            ));
        }
    }
}
