use super::course::{Course, CourseId};
use super::enrollment::Enrollment;
use super::gateway::{GatewayIntent, IntentRequest, IntentStatus};
use super::payment::{IntentId, Payment};
use super::user::{User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn save_user(&self, user: User) -> Result<()>;
    async fn user(&self, id: UserId) -> Result<Option<User>>;
}

#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Inserts or replaces a course. An existing course keeps its stored enrollment counter.
    async fn save_course(&self, course: Course) -> Result<()>;
    async fn course(&self, id: CourseId) -> Result<Option<Course>>;
    async fn courses(&self) -> Result<Vec<Course>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new payment. Fails with `Conflict` if the intent id is already known.
    async fn insert_payment(&self, payment: Payment) -> Result<()>;
    async fn payment(&self, id: &IntentId) -> Result<Option<Payment>>;
    /// Moves a payment to `Failed`, returning the stored result.
    async fn fail_payment(&self, id: &IntentId, reason: &str, at: DateTime<Utc>)
    -> Result<Payment>;
    async fn payments(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn enrollment(&self, user: UserId, course: CourseId) -> Result<Option<Enrollment>>;
    async fn enrollments(&self) -> Result<Vec<Enrollment>>;
    async fn record_progress(
        &self,
        user: UserId,
        course: CourseId,
        percent: u8,
        at: DateTime<Utc>,
    ) -> Result<Enrollment>;
}

/// The only writer of enrollments and of `Course::enrollment_count`.
///
/// Every method is one atomic unit: readers observe all of its writes or none of them,
/// and the `(user, course)` uniqueness check happens inside that unit.
#[async_trait]
pub trait EnrollmentLedger: Send + Sync {
    /// Completes the pending payment, admits its buyer and bumps the course counter.
    async fn commit_purchase(
        &self,
        intent: &IntentId,
        at: DateTime<Utc>,
    ) -> Result<(Payment, Enrollment)>;

    /// Admits `user` without a payment and bumps the course counter.
    async fn commit_free_enrollment(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment>;

    /// Cancels the enrollment and decrements the course counter.
    async fn commit_cancellation(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<GatewayIntent>;
    async fn retrieve_intent(&self, id: &IntentId) -> Result<IntentStatus>;
}

/// A backend that provides every persistence port.
pub trait MarketplaceStore:
    UserDirectory + CourseCatalog + PaymentStore + EnrollmentStore + EnrollmentLedger
{
}

impl<T> MarketplaceStore for T where
    T: UserDirectory + CourseCatalog + PaymentStore + EnrollmentStore + EnrollmentLedger
{
}

pub type UserDirectoryRef = Arc<dyn UserDirectory>;
pub type CourseCatalogRef = Arc<dyn CourseCatalog>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type EnrollmentStoreRef = Arc<dyn EnrollmentStore>;
pub type EnrollmentLedgerRef = Arc<dyn EnrollmentLedger>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
