use super::common::{ConfirmedPurchase, EnrollmentDetails, require_course, summarize};
use crate::domain::course::CourseId;
use crate::domain::money::Money;
use crate::domain::payment::IntentId;
use crate::domain::ports::{CourseCatalogRef, EnrollmentLedgerRef, UserDirectoryRef};
use crate::domain::user::UserId;
use crate::error::Result;
use chrono::Utc;
use tracing::{info, instrument};

/// Drives the atomic enrollment commits and joins the results with course details.
///
/// A `Conflict` from the ledger means another confirmation won the race; callers should
/// re-read the enrollment rather than retry.
pub struct EnrollmentCommitter {
    ledger: EnrollmentLedgerRef,
    courses: CourseCatalogRef,
    users: UserDirectoryRef,
}

impl EnrollmentCommitter {
    pub fn new(
        ledger: EnrollmentLedgerRef,
        courses: CourseCatalogRef,
        users: UserDirectoryRef,
    ) -> Self {
        Self {
            ledger,
            courses,
            users,
        }
    }

    #[instrument(skip(self), fields(intent = %intent_id))]
    pub async fn commit_purchase(&self, intent_id: &IntentId) -> Result<ConfirmedPurchase> {
        let (payment, enrollment) = self.ledger.commit_purchase(intent_id, Utc::now()).await?;
        info!(user = %payment.user_id, course = %payment.course_id, "purchase committed");

        let course = require_course(&self.courses, payment.course_id).await?;
        let summary = summarize(&self.users, &course, payment.amount).await?;
        Ok(ConfirmedPurchase {
            payment,
            enrollment: EnrollmentDetails {
                enrollment,
                course: summary,
            },
        })
    }

    #[instrument(skip(self))]
    pub async fn commit_free(&self, user: UserId, course_id: CourseId) -> Result<EnrollmentDetails> {
        let enrollment = self
            .ledger
            .commit_free_enrollment(user, course_id, Utc::now())
            .await?;
        info!(%user, course = %course_id, "free enrollment committed");

        let course = require_course(&self.courses, course_id).await?;
        Ok(EnrollmentDetails {
            enrollment,
            course: summarize(&self.users, &course, Money::ZERO).await?,
        })
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, user: UserId, course_id: CourseId) -> Result<EnrollmentDetails> {
        let enrollment = self
            .ledger
            .commit_cancellation(user, course_id, Utc::now())
            .await?;
        info!(%user, course = %course_id, "enrollment cancelled");

        let course = require_course(&self.courses, course_id).await?;
        Ok(EnrollmentDetails {
            enrollment,
            course: summarize(&self.users, &course, course.price).await?,
        })
    }
}
