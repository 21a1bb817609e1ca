use crate::domain::gateway::{GatewayIntent, IntentRequest, IntentStatus};
use crate::domain::payment::IntentId;
use crate::domain::ports::PaymentGateway;
use crate::error::{MarketplaceError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: IntentStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Payment gateway adapter for the Stripe PaymentIntents API.
#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Result<Self> {
        Self::with_api_base(secret_key, DEFAULT_API_BASE)
    }

    pub fn with_api_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarketplaceError::PaymentGateway(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.api_base)
    }

    async fn read_intent(response: reqwest::Response) -> Result<IntentResponse> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| MarketplaceError::PaymentGateway(format!("reading response: {e}")))?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(MarketplaceError::PaymentGateway(message));
        }
        serde_json::from_slice(&body)
            .map_err(|e| MarketplaceError::PaymentGateway(format!("unexpected response: {e}")))
    }
}

/// Form fields for `POST /v1/payment_intents`.
fn intent_form(request: &IntentRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.amount_minor.to_string()),
        ("currency".to_string(), request.currency.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(amount = request.amount_minor))]
    async fn create_intent(&self, request: IntentRequest) -> Result<GatewayIntent> {
        let response = self
            .http
            .post(self.intents_url())
            .bearer_auth(&self.secret_key)
            .form(&intent_form(&request))
            .send()
            .await
            .map_err(|e| MarketplaceError::PaymentGateway(e.to_string()))?;
        let intent = Self::read_intent(response).await?;
        debug!(intent = %intent.id, status = %intent.status, "stripe intent created");

        let client_secret = intent.client_secret.ok_or_else(|| {
            MarketplaceError::PaymentGateway(format!("intent {} has no client secret", intent.id))
        })?;
        Ok(GatewayIntent {
            id: IntentId(intent.id),
            client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, id: &IntentId) -> Result<IntentStatus> {
        let response = self
            .http
            .get(format!("{}/{}", self.intents_url(), id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| MarketplaceError::PaymentGateway(e.to_string()))?;
        Ok(Self::read_intent(response).await?.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_intent_form_encodes_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("course_id".to_string(), "7".to_string());
        metadata.insert("user_id".to_string(), "1".to_string());
        let form = intent_form(&IntentRequest {
            amount_minor: 8000,
            currency: "usd".to_string(),
            metadata,
        });

        assert!(form.contains(&("amount".to_string(), "8000".to_string())));
        assert!(form.contains(&("currency".to_string(), "usd".to_string())));
        assert!(form.contains(&("metadata[course_id]".to_string(), "7".to_string())));
        assert!(form.contains(&("metadata[user_id]".to_string(), "1".to_string())));
    }

    #[test]
    fn test_intent_response_parsing() {
        let body = r#"{"id":"pi_3","object":"payment_intent","client_secret":"pi_3_secret_x","status":"requires_payment_method","amount":8000}"#;
        let intent: IntentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(intent.id, "pi_3");
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.client_secret.as_deref(), Some("pi_3_secret_x"));
    }

    fn request() -> IntentRequest {
        IntentRequest {
            amount_minor: 8000,
            currency: "usd".to_string(),
            metadata: BTreeMap::from([("course_id".to_string(), "7".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_create_intent_posts_form_with_bearer_auth() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", "Bearer sk_test"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("amount=8000"))
            .and(body_string_contains("metadata%5Bcourse_id%5D=7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_1",
                "client_secret": "pi_1_secret_abc",
                "status": "requires_payment_method"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let gateway = StripeGateway::with_api_base("sk_test", mock_server.uri()).unwrap();
        let intent = gateway.create_intent(request()).await.unwrap();

        assert_eq!(intent.id, IntentId::from("pi_1"));
        assert_eq!(intent.client_secret, "pi_1_secret_abc");
    }

    #[tokio::test]
    async fn test_retrieve_intent_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_1"))
            .and(header("authorization", "Bearer sk_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_1",
                "status": "succeeded"
            })))
            .mount(&mock_server)
            .await;

        let gateway = StripeGateway::with_api_base("sk_test", mock_server.uri()).unwrap();
        let status = gateway.retrieve_intent(&IntentId::from("pi_1")).await.unwrap();

        assert_eq!(status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_error_envelope_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_bad"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"message": "No such payment_intent: 'pi_bad'", "type": "invalid_request_error"}
            })))
            .mount(&mock_server)
            .await;

        let gateway = StripeGateway::with_api_base("sk_test", mock_server.uri()).unwrap();
        let result = gateway.retrieve_intent(&IntentId::from("pi_bad")).await;

        match result {
            Err(MarketplaceError::PaymentGateway(message)) => {
                assert_eq!(message, "No such payment_intent: 'pi_bad'")
            }
            other => panic!("expected a gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_without_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&mock_server)
            .await;

        let gateway = StripeGateway::with_api_base("sk_test", mock_server.uri()).unwrap();
        let result = gateway.create_intent(request()).await;

        match result {
            Err(MarketplaceError::PaymentGateway(message)) => assert!(message.contains("503")),
            other => panic!("expected a gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_without_client_secret() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_2",
                "status": "requires_payment_method"
            })))
            .mount(&mock_server)
            .await;

        let gateway = StripeGateway::with_api_base("sk_test", mock_server.uri()).unwrap();
        let result = gateway.create_intent(request()).await;

        assert!(matches!(result, Err(MarketplaceError::PaymentGateway(_))));
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        // Nothing listens on the discard port.
        let gateway = StripeGateway::with_api_base("sk_test", "http://127.0.0.1:9").unwrap();
        let result = gateway.retrieve_intent(&IntentId::from("pi_1")).await;

        assert!(matches!(result, Err(MarketplaceError::PaymentGateway(_))));
    }

    #[test]
    fn test_api_base_trailing_slash() {
        let gateway = StripeGateway::with_api_base("sk_test", "http://localhost:12111/").unwrap();
        assert_eq!(gateway.intents_url(), "http://localhost:12111/v1/payment_intents");
    }
}
