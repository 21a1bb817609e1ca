use super::course::CourseId;
use super::money::Money;
use super::pricing::PriceQuote;
use super::user::UserId;
use crate::error::{MarketplaceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The gateway's payment-intent identifier. Doubles as the payment's primary key and
/// as the idempotency key of every later operation on the purchase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub String);

impl IntentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IntentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

/// A purchase attempt. Payments are never deleted; they only move forward through
/// `Pending -> Completed -> Refunded` or `Pending -> Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: IntentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub amount: Money,
    pub platform_fee: Money,
    pub instructor_amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub stripe_payment_intent_id: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn pending(
        id: IntentId,
        user_id: UserId,
        course_id: CourseId,
        quote: &PriceQuote,
        currency: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stripe_payment_intent_id: id.0.clone(),
            id,
            user_id,
            course_id,
            amount: quote.charge_amount,
            platform_fee: quote.platform_fee,
            instructor_amount: quote.instructor_amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            failure_reason: None,
            created_at,
            completed_at: None,
            failed_at: None,
            refunded_at: None,
        }
    }

    /// `Pending -> Completed`. A second completion is a conflict, not a no-op.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<()> {
        match self.status {
            PaymentStatus::Pending => {
                self.status = PaymentStatus::Completed;
                self.completed_at = Some(at);
                Ok(())
            }
            PaymentStatus::Completed => Err(MarketplaceError::Conflict(format!(
                "payment {} has already been processed",
                self.id
            ))),
            other => Err(MarketplaceError::InvalidState(format!(
                "payment {} is {other} and cannot be completed",
                self.id
            ))),
        }
    }

    /// `Pending -> Failed`. Repeating the transition is accepted so webhook redelivery is harmless.
    pub fn fail(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        match self.status {
            PaymentStatus::Pending => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(reason.into());
                self.failed_at = Some(at);
                Ok(())
            }
            PaymentStatus::Failed => Ok(()),
            other => Err(MarketplaceError::InvalidState(format!(
                "payment {} is {other} and cannot fail",
                self.id
            ))),
        }
    }

    /// `Completed -> Refunded`.
    pub fn refund(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status != PaymentStatus::Completed {
            return Err(MarketplaceError::InvalidState(format!(
                "payment {} is {} and cannot be refunded",
                self.id, self.status
            )));
        }
        self.status = PaymentStatus::Refunded;
        self.refunded_at = Some(at);
        Ok(())
    }
}
