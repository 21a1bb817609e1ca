use super::common::{CourseSummary, require_purchasable, require_user, summarize};
use crate::domain::course::CourseId;
use crate::domain::gateway::IntentRequest;
use crate::domain::money::Money;
use crate::domain::payment::{IntentId, Payment};
use crate::domain::ports::{
    CourseCatalogRef, EnrollmentStoreRef, PaymentGatewayRef, PaymentStoreRef, UserDirectoryRef,
};
use crate::domain::pricing::PriceQuote;
use crate::domain::user::UserId;
use crate::error::{MarketplaceError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// What the client needs to finish paying: the gateway handle plus a summary to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseIntent {
    pub intent_id: IntentId,
    pub client_secret: String,
    pub amount: Money,
    pub currency: String,
    pub quote: PriceQuote,
    pub course: CourseSummary,
}

/// Reserves a charge with the gateway and records the pending payment.
pub struct PaymentIntentIssuer {
    courses: CourseCatalogRef,
    users: UserDirectoryRef,
    enrollments: EnrollmentStoreRef,
    payments: PaymentStoreRef,
    gateway: PaymentGatewayRef,
    fee_rate: Decimal,
    currency: String,
}

impl PaymentIntentIssuer {
    pub fn new(
        courses: CourseCatalogRef,
        users: UserDirectoryRef,
        enrollments: EnrollmentStoreRef,
        payments: PaymentStoreRef,
        gateway: PaymentGatewayRef,
        fee_rate: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            courses,
            users,
            enrollments,
            payments,
            gateway,
            fee_rate,
            currency: currency.into(),
        }
    }

    /// Issues a purchase intent for `course_id` on behalf of `buyer`.
    ///
    /// Gateway failures are surfaced as-is and never retried here; the client starts over.
    #[instrument(skip(self), fields(user = %buyer, course = %course_id))]
    pub async fn issue(&self, buyer: UserId, course_id: CourseId) -> Result<PurchaseIntent> {
        require_user(&self.users, buyer).await?;
        let course = require_purchasable(&self.courses, course_id, buyer).await?;

        if let Some(enrollment) = self.enrollments.enrollment(buyer, course_id).await?
            && enrollment.grants_access()
        {
            return Err(MarketplaceError::Conflict(format!(
                "user {buyer} is already enrolled in course {course_id}"
            )));
        }

        let quote = PriceQuote::resolve(&course, self.fee_rate)?;
        if quote.is_free() {
            return Err(MarketplaceError::InvalidState(format!(
                "course {course_id} is free; enroll without a payment"
            )));
        }

        let metadata = BTreeMap::from([
            ("course_id".to_string(), course_id.to_string()),
            ("course_title".to_string(), course.title.clone()),
            ("user_id".to_string(), buyer.to_string()),
        ]);
        let intent = self
            .gateway
            .create_intent(IntentRequest {
                amount_minor: quote.charge_amount.to_minor_units()?,
                currency: self.currency.clone(),
                metadata,
            })
            .await?;

        self.payments
            .insert_payment(Payment::pending(
                intent.id.clone(),
                buyer,
                course_id,
                &quote,
                self.currency.clone(),
                Utc::now(),
            ))
            .await?;
        info!(intent = %intent.id, amount = %quote.charge_amount, "purchase intent issued");

        Ok(PurchaseIntent {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: quote.charge_amount,
            currency: self.currency.clone(),
            course: summarize(&self.users, &course, quote.charge_amount).await?,
            quote,
        })
    }
}
