use super::committer::EnrollmentCommitter;
use super::common::{ConfirmedPurchase, EnrollmentDetails, require_purchasable, require_user};
use super::issuer::{PaymentIntentIssuer, PurchaseIntent};
use super::verifier::ConfirmationVerifier;
use crate::domain::course::CourseId;
use crate::domain::enrollment::Enrollment;
use crate::domain::payment::IntentId;
use crate::domain::ports::{CourseCatalogRef, EnrollmentStoreRef, UserDirectoryRef};
use crate::domain::pricing::PriceQuote;
use crate::domain::user::UserId;
use crate::error::{MarketplaceError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

/// The purchase-to-enrollment flow as seen by callers.
pub struct PurchaseFlow {
    issuer: PaymentIntentIssuer,
    verifier: ConfirmationVerifier,
    committer: EnrollmentCommitter,
    courses: CourseCatalogRef,
    users: UserDirectoryRef,
    enrollments: EnrollmentStoreRef,
    fee_rate: Decimal,
}

impl PurchaseFlow {
    pub fn new(
        issuer: PaymentIntentIssuer,
        verifier: ConfirmationVerifier,
        committer: EnrollmentCommitter,
        courses: CourseCatalogRef,
        users: UserDirectoryRef,
        enrollments: EnrollmentStoreRef,
        fee_rate: Decimal,
    ) -> Self {
        Self {
            issuer,
            verifier,
            committer,
            courses,
            users,
            enrollments,
            fee_rate,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_purchase_intent(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<PurchaseIntent> {
        self.issuer.issue(user, course).await
    }

    /// Verifies the intent with the gateway and commits the enrollment.
    ///
    /// Safe to call again after a timeout: a repeat returns `Conflict` once the first
    /// call has committed.
    #[instrument(skip(self), fields(intent = %intent_id))]
    pub async fn confirm_purchase(
        &self,
        user: UserId,
        course: CourseId,
        intent_id: &IntentId,
    ) -> Result<ConfirmedPurchase> {
        let payment = self.verifier.verify(user, course, intent_id).await?;
        self.committer.commit_purchase(&payment.id).await
    }

    /// Enrolls `user` in a course whose chargeable amount is zero. No payment is recorded.
    #[instrument(skip(self))]
    pub async fn enroll_free(&self, user: UserId, course: CourseId) -> Result<EnrollmentDetails> {
        require_user(&self.users, user).await?;
        let stored = require_purchasable(&self.courses, course, user).await?;
        let quote = PriceQuote::resolve(&stored, self.fee_rate)?;
        if !quote.is_free() {
            return Err(MarketplaceError::InvalidState(format!(
                "course {course} costs {} and requires a payment",
                quote.charge_amount
            )));
        }
        self.committer.commit_free(user, course).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<EnrollmentDetails> {
        self.committer.cancel(user, course).await
    }

    #[instrument(skip(self))]
    pub async fn record_progress(
        &self,
        user: UserId,
        course: CourseId,
        percent: u8,
    ) -> Result<Enrollment> {
        self.enrollments
            .record_progress(user, course, percent, Utc::now())
            .await
    }

    #[instrument(skip(self))]
    pub async fn enrollment(&self, user: UserId, course: CourseId) -> Result<Option<Enrollment>> {
        self.enrollments.enrollment(user, course).await
    }

    /// Whether `user` may open the lessons of `course`.
    ///
    /// The course's instructor and admins always may; everyone else needs an enrollment
    /// that is active or completed.
    #[instrument(skip(self))]
    pub async fn has_access(&self, user: UserId, course: CourseId) -> Result<bool> {
        let Some(stored) = self.courses.course(course).await? else {
            return Ok(false);
        };
        if stored.instructor_id == user {
            return Ok(true);
        }
        if self.users.user(user).await?.is_some_and(|u| u.is_admin()) {
            return Ok(true);
        }
        Ok(self
            .enrollments
            .enrollment(user, course)
            .await?
            .is_some_and(|e| e.grants_access()))
    }
}
