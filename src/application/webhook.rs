use super::committer::EnrollmentCommitter;
use super::common::ConfirmedPurchase;
use crate::domain::gateway::{GatewayEvent, GatewayEventKind};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::PaymentStoreRef;
use crate::domain::webhook_signature;
use crate::error::{MarketplaceError, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub enum WebhookOutcome {
    /// The payment was completed and its buyer enrolled by this delivery.
    Enrolled(ConfirmedPurchase),
    /// The purchase had already been committed, by the client or an earlier delivery.
    AlreadyProcessed,
    PaymentFailed(Payment),
    /// Acknowledged without effect; the reason is also logged.
    Ignored(String),
}

/// Applies gateway notifications.
///
/// A succeeded intent goes through the same atomic commit as a client confirmation,
/// so completing the payment and creating the enrollment cannot come apart.
pub struct WebhookProcessor {
    payments: PaymentStoreRef,
    committer: EnrollmentCommitter,
    secret: Option<String>,
    tolerance: Duration,
}

impl WebhookProcessor {
    pub fn new(
        payments: PaymentStoreRef,
        committer: EnrollmentCommitter,
        secret: Option<String>,
        tolerance: Duration,
    ) -> Self {
        Self {
            payments,
            committer,
            secret,
            tolerance,
        }
    }

    /// Authenticates and applies a raw webhook delivery.
    #[instrument(skip(self, payload, signature_header), fields(size = payload.len()))]
    pub async fn handle(&self, payload: &[u8], signature_header: &str) -> Result<WebhookOutcome> {
        let secret = self.secret.as_deref().ok_or_else(|| {
            MarketplaceError::Forbidden("no webhook signing secret is configured".to_string())
        })?;
        webhook_signature::verify(payload, signature_header, secret, self.tolerance, Utc::now())?;
        let event = GatewayEvent::from_json(payload)?;
        self.apply(event).await
    }

    /// Applies an already authenticated event.
    #[instrument(skip(self, event), fields(kind = event.event_type(), intent = %event.intent_id))]
    pub async fn apply(&self, event: GatewayEvent) -> Result<WebhookOutcome> {
        if let GatewayEventKind::Other(kind) = &event.kind {
            warn!("ignoring unhandled webhook event");
            return Ok(WebhookOutcome::Ignored(format!("unhandled event type {kind}")));
        }

        let Some(payment) = self.payments.payment(&event.intent_id).await? else {
            warn!("webhook for an unknown payment");
            return Ok(WebhookOutcome::Ignored(format!(
                "no payment for intent {}",
                event.intent_id
            )));
        };

        match event.kind {
            GatewayEventKind::IntentSucceeded => self.on_succeeded(payment).await,
            GatewayEventKind::IntentFailed => {
                let reason = event
                    .failure_message
                    .unwrap_or_else(|| "payment failed".to_string());
                self.on_failed(payment, &reason).await
            }
            GatewayEventKind::Other(_) => Ok(WebhookOutcome::Ignored("unhandled".to_string())),
        }
    }

    async fn on_succeeded(&self, payment: Payment) -> Result<WebhookOutcome> {
        match payment.status {
            PaymentStatus::Pending => match self.committer.commit_purchase(&payment.id).await {
                Ok(confirmed) => Ok(WebhookOutcome::Enrolled(confirmed)),
                Err(e) if e.is_conflict() => {
                    info!(error = %e, "purchase already committed");
                    Ok(WebhookOutcome::AlreadyProcessed)
                }
                Err(e) => Err(e),
            },
            PaymentStatus::Completed => Ok(WebhookOutcome::AlreadyProcessed),
            status => {
                warn!(%status, "success notification for a settled payment");
                Ok(WebhookOutcome::Ignored(format!(
                    "payment {} is {status}",
                    payment.id
                )))
            }
        }
    }

    async fn on_failed(&self, payment: Payment, reason: &str) -> Result<WebhookOutcome> {
        match self.payments.fail_payment(&payment.id, reason, Utc::now()).await {
            Ok(failed) => {
                info!(%reason, "payment marked failed");
                Ok(WebhookOutcome::PaymentFailed(failed))
            }
            Err(MarketplaceError::InvalidState(message)) => {
                warn!(%message, "failure notification for a settled payment");
                Ok(WebhookOutcome::Ignored(message))
            }
            Err(e) => Err(e),
        }
    }
}
