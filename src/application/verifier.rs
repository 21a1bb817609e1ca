use crate::domain::course::CourseId;
use crate::domain::gateway::IntentStatus;
use crate::domain::payment::{IntentId, Payment};
use crate::domain::ports::{EnrollmentStoreRef, PaymentGatewayRef, PaymentStoreRef};
use crate::domain::user::UserId;
use crate::error::{MarketplaceError, Result};
use tracing::{instrument, warn};

/// Gate in front of every purchase commit.
///
/// The caller's intent id and course id are untrusted; the gateway is asked directly for
/// the intent's status. Must run on every confirmation attempt, retries included.
pub struct ConfirmationVerifier {
    payments: PaymentStoreRef,
    enrollments: EnrollmentStoreRef,
    gateway: PaymentGatewayRef,
}

impl ConfirmationVerifier {
    pub fn new(
        payments: PaymentStoreRef,
        enrollments: EnrollmentStoreRef,
        gateway: PaymentGatewayRef,
    ) -> Self {
        Self {
            payments,
            enrollments,
            gateway,
        }
    }

    #[instrument(skip(self), fields(user = %requester, course = %course_id, intent = %intent_id))]
    pub async fn verify(
        &self,
        requester: UserId,
        course_id: CourseId,
        intent_id: &IntentId,
    ) -> Result<Payment> {
        let payment = self
            .payments
            .payment(intent_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("payment {intent_id}")))?;

        if payment.user_id != requester {
            warn!(owner = %payment.user_id, "confirmation attempted by another user");
            return Err(MarketplaceError::Forbidden(format!(
                "payment {intent_id} does not belong to user {requester}"
            )));
        }
        if payment.course_id != course_id {
            warn!(paid_course = %payment.course_id, "confirmation for a different course");
            return Err(MarketplaceError::Validation(format!(
                "payment {intent_id} is not for course {course_id}"
            )));
        }

        let status = self.gateway.retrieve_intent(intent_id).await?;
        if status != IntentStatus::Succeeded {
            return Err(MarketplaceError::PaymentNotCompleted(status.to_string()));
        }

        if let Some(enrollment) = self.enrollments.enrollment(requester, course_id).await?
            && enrollment.grants_access()
        {
            return Err(MarketplaceError::Conflict(format!(
                "user {requester} is already enrolled in course {course_id}"
            )));
        }
        Ok(payment)
    }
}
