//! Contract types exchanged with the external payment gateway.

use super::payment::IntentId;
use crate::error::{MarketplaceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A charge reservation request. `amount_minor` is already in minor units (cents).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

/// The gateway's answer to a reservation: the intent id and the secret the client
/// needs to finish the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub id: IntentId,
    pub client_secret: String,
}

/// Authoritative intent status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
        };
        f.write_str(name)
    }
}

pub const EVENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    IntentSucceeded,
    IntentFailed,
    Other(String),
}

/// A webhook notification about a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    pub intent_id: IntentId,
    pub failure_message: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Serialize, Deserialize)]
struct RawEventData {
    object: RawIntent,
}

#[derive(Serialize, Deserialize)]
struct RawIntent {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_payment_error: Option<RawPaymentError>,
}

#[derive(Serialize, Deserialize)]
struct RawPaymentError {
    #[serde(default)]
    message: Option<String>,
}

impl GatewayEvent {
    pub fn succeeded(intent_id: IntentId) -> Self {
        Self {
            kind: GatewayEventKind::IntentSucceeded,
            intent_id,
            failure_message: None,
        }
    }

    pub fn failed(intent_id: IntentId, message: impl Into<String>) -> Self {
        Self {
            kind: GatewayEventKind::IntentFailed,
            intent_id,
            failure_message: Some(message.into()),
        }
    }

    pub fn event_type(&self) -> &str {
        match &self.kind {
            GatewayEventKind::IntentSucceeded => EVENT_INTENT_SUCCEEDED,
            GatewayEventKind::IntentFailed => EVENT_INTENT_FAILED,
            GatewayEventKind::Other(kind) => kind,
        }
    }

    /// Parses a webhook body in the gateway's `{type, data: {object}}` envelope.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload).map_err(|e| {
            MarketplaceError::Validation(format!("malformed webhook payload: {e}"))
        })?;
        let kind = match raw.kind.as_str() {
            EVENT_INTENT_SUCCEEDED => GatewayEventKind::IntentSucceeded,
            EVENT_INTENT_FAILED => GatewayEventKind::IntentFailed,
            _ => GatewayEventKind::Other(raw.kind),
        };
        Ok(Self {
            kind,
            intent_id: IntentId(raw.data.object.id),
            failure_message: raw.data.object.last_payment_error.and_then(|e| e.message),
        })
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let raw = RawEvent {
            kind: self.event_type().to_string(),
            data: RawEventData {
                object: RawIntent {
                    id: self.intent_id.0.clone(),
                    last_payment_error: self.failure_message.clone().map(|message| {
                        RawPaymentError {
                            message: Some(message),
                        }
                    }),
                },
            },
        };
        Ok(serde_json::to_vec(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_succeeded_event() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_123","status":"succeeded"}}}"#;
        let event = GatewayEvent::from_json(payload).unwrap();
        assert_eq!(event.kind, GatewayEventKind::IntentSucceeded);
        assert_eq!(event.intent_id, IntentId::from("pi_123"));
        assert!(event.failure_message.is_none());
    }

    #[test]
    fn test_parse_failed_event_keeps_message() {
        let payload = br#"{"type":"payment_intent.payment_failed","data":{"object":{"id":"pi_9","last_payment_error":{"message":"Your card was declined."}}}}"#;
        let event = GatewayEvent::from_json(payload).unwrap();
        assert_eq!(event.kind, GatewayEventKind::IntentFailed);
        assert_eq!(event.failure_message.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn test_unknown_event_type_is_preserved() {
        let payload = br#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;
        let event = GatewayEvent::from_json(payload).unwrap();
        assert_eq!(event.kind, GatewayEventKind::Other("charge.refunded".to_string()));
        assert_eq!(event.event_type(), "charge.refunded");
    }

    #[test]
    fn test_malformed_payload_is_a_validation_error() {
        assert!(matches!(
            GatewayEvent::from_json(b"not json"),
            Err(MarketplaceError::Validation(_))
        ));
    }

    #[test]
    fn test_to_json_is_parseable() {
        let event = GatewayEvent::failed(IntentId::from("pi_2"), "insufficient funds");
        let parsed = GatewayEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_intent_status_wire_names() {
        let status: IntentStatus = serde_json::from_str("\"requires_payment_method\"").unwrap();
        assert_eq!(status, IntentStatus::RequiresPaymentMethod);
        assert_eq!(IntentStatus::Succeeded.to_string(), "succeeded");
    }
}
