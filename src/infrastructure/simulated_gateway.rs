use crate::domain::gateway::{GatewayIntent, IntentRequest, IntentStatus};
use crate::domain::payment::IntentId;
use crate::domain::ports::PaymentGateway;
use crate::error::{MarketplaceError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SimulatedIntent {
    pub request: IntentRequest,
    pub status: IntentStatus,
}

/// An in-process stand-in for the payment gateway.
///
/// Intents start in `requires_payment_method`; `settle` and `decline` play the part of
/// the buyer finishing (or failing) the payment on the client.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    intents: Arc<RwLock<HashMap<IntentId, SimulatedIntent>>>,
    fail_next_create: Arc<AtomicBool>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next reservation fail as if the gateway were unreachable.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub async fn settle(&self, id: &IntentId) -> Result<()> {
        self.set_status(id, IntentStatus::Succeeded).await
    }

    /// Declines the card on file. Like Stripe, the intent goes back to
    /// `requires_payment_method`, but once the failure webhook lands the marketplace
    /// payment is `Failed` for good: paying the same intent afterwards cannot enroll, and
    /// the buyer starts a new purchase instead.
    pub async fn decline(&self, id: &IntentId) -> Result<()> {
        self.set_status(id, IntentStatus::RequiresPaymentMethod).await
    }

    pub async fn set_status(&self, id: &IntentId, status: IntentStatus) -> Result<()> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| MarketplaceError::PaymentGateway(format!("no such intent: {id}")))?;
        intent.status = status;
        Ok(())
    }

    pub async fn intent(&self, id: &IntentId) -> Option<SimulatedIntent> {
        self.intents.read().await.get(id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<GatewayIntent> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(MarketplaceError::PaymentGateway(
                "simulated gateway outage".to_string(),
            ));
        }
        if request.amount_minor <= 0 {
            return Err(MarketplaceError::PaymentGateway(
                "amount must be greater than zero".to_string(),
            ));
        }

        let id = IntentId(format!("pi_sim_{}", Uuid::new_v4().simple()));
        let client_secret = format!("{id}_secret_{}", Uuid::new_v4().simple());
        debug!(intent = %id, amount = request.amount_minor, "simulated intent created");

        self.intents.write().await.insert(
            id.clone(),
            SimulatedIntent {
                request,
                status: IntentStatus::RequiresPaymentMethod,
            },
        );
        Ok(GatewayIntent { id, client_secret })
    }

    async fn retrieve_intent(&self, id: &IntentId) -> Result<IntentStatus> {
        self.intents
            .read()
            .await
            .get(id)
            .map(|intent| intent.status)
            .ok_or_else(|| MarketplaceError::PaymentGateway(format!("no such intent: {id}")))
    }
}
