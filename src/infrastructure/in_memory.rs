use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::Enrollment;
use crate::domain::payment::{IntentId, Payment};
use crate::domain::ports::{
    CourseCatalog, EnrollmentLedger, EnrollmentStore, PaymentStore, UserDirectory,
};
use crate::domain::user::{User, UserId};
use crate::error::{MarketplaceError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct MarketplaceState {
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    payments: HashMap<IntentId, Payment>,
    enrollments: HashMap<(UserId, CourseId), Enrollment>,
}

impl MarketplaceState {
    fn course(&self, id: CourseId) -> Result<Course> {
        self.courses
            .get(&id)
            .cloned()
            .ok_or_else(|| MarketplaceError::NotFound(format!("course {id}")))
    }
}

/// A thread-safe in-memory backend implementing every persistence port.
///
/// All state sits behind a single `RwLock`. Ledger commits hold the write lock, stage
/// their changes on copies and publish them only once every step has succeeded, so a
/// failed commit leaves nothing behind and readers never see half of one.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<MarketplaceState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next purchase commit fail right after the payment has been staged as
    /// completed and before the enrollment is written. Used to exercise rollback.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn injected_fault(&self) -> Result<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(MarketplaceError::Storage(
                "injected fault during enrollment commit".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn save_user(&self, user: User) -> Result<()> {
        let mut state = self.state.write().await;
        state.users.insert(user.id, user);
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }
}

#[async_trait]
impl CourseCatalog for InMemoryStore {
    async fn save_course(&self, mut course: Course) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.courses.get(&course.id) {
            course.preserve_counter_from(stored);
        }
        state.courses.insert(course.id, course);
        Ok(())
    }

    async fn course(&self, id: CourseId) -> Result<Option<Course>> {
        let state = self.state.read().await;
        Ok(state.courses.get(&id).cloned())
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        let state = self.state.read().await;
        let mut courses: Vec<Course> = state.courses.values().cloned().collect();
        courses.sort_by_key(|c| c.id);
        Ok(courses)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if state.payments.contains_key(&payment.id) {
            return Err(MarketplaceError::Conflict(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        state.payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn payment(&self, id: &IntentId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.get(id).cloned())
    }

    async fn fail_payment(
        &self,
        id: &IntentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(id)
            .ok_or_else(|| MarketplaceError::NotFound(format!("payment {id}")))?;
        payment.fail(reason, at)?;
        Ok(payment.clone())
    }

    async fn payments(&self) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state.payments.values().cloned().collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn enrollment(&self, user: UserId, course: CourseId) -> Result<Option<Enrollment>> {
        let state = self.state.read().await;
        Ok(state.enrollments.get(&(user, course)).cloned())
    }

    async fn enrollments(&self) -> Result<Vec<Enrollment>> {
        let state = self.state.read().await;
        let mut enrollments: Vec<Enrollment> = state.enrollments.values().cloned().collect();
        enrollments.sort_by_key(|e| (e.user_id, e.course_id));
        Ok(enrollments)
    }

    async fn record_progress(
        &self,
        user: UserId,
        course: CourseId,
        percent: u8,
        at: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let mut state = self.state.write().await;
        let enrollment = state.enrollments.get_mut(&(user, course)).ok_or_else(|| {
            MarketplaceError::NotFound(format!("enrollment of user {user} in course {course}"))
        })?;
        enrollment.record_progress(percent, at)?;
        Ok(enrollment.clone())
    }
}

#[async_trait]
impl EnrollmentLedger for InMemoryStore {
    async fn commit_purchase(
        &self,
        intent: &IntentId,
        at: DateTime<Utc>,
    ) -> Result<(Payment, Enrollment)> {
        let mut state = self.state.write().await;

        let mut payment = state
            .payments
            .get(intent)
            .cloned()
            .ok_or_else(|| MarketplaceError::NotFound(format!("payment {intent}")))?;
        let key = (payment.user_id, payment.course_id);
        let existing = state.enrollments.get(&key).cloned();

        payment.complete(at)?;
        self.injected_fault()?;
        let enrollment = Enrollment::admit(existing, payment.user_id, payment.course_id, at)?;
        let mut course = state.course(payment.course_id)?;
        course.record_enrollment();

        state.payments.insert(payment.id.clone(), payment.clone());
        state.enrollments.insert(key, enrollment.clone());
        state.courses.insert(course.id, course);
        Ok((payment, enrollment))
    }

    async fn commit_free_enrollment(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let mut state = self.state.write().await;

        let existing = state.enrollments.get(&(user, course)).cloned();
        let enrollment = Enrollment::admit(existing, user, course, at)?;
        let mut stored_course = state.course(course)?;
        stored_course.record_enrollment();

        state.enrollments.insert((user, course), enrollment.clone());
        state.courses.insert(course, stored_course);
        Ok(enrollment)
    }

    async fn commit_cancellation(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let mut state = self.state.write().await;

        let mut enrollment = state.enrollments.get(&(user, course)).cloned().ok_or_else(|| {
            MarketplaceError::NotFound(format!("enrollment of user {user} in course {course}"))
        })?;
        enrollment.cancel(at)?;
        let mut stored_course = state.course(course)?;
        stored_course.record_cancellation();

        state.enrollments.insert((user, course), enrollment.clone());
        state.courses.insert(course, stored_course);
        Ok(enrollment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::EnrollmentStatus;
    use crate::domain::money::Money;
    use crate::domain::payment::PaymentStatus;
    use crate::domain::pricing::PriceQuote;
    use crate::domain::user::Role;
    use rust_decimal_macros::dec;

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let course = Course::new(
            CourseId(7),
            "Ownership Deep Dive",
            Money::new(dec!(50)).unwrap(),
            None,
            UserId(10),
        )
        .unwrap();
        store.save_course(course.clone()).await.unwrap();
        let quote = PriceQuote::resolve(&course, dec!(0.05)).unwrap();
        store
            .insert_payment(Payment::pending(
                IntentId::from("pi_1"),
                UserId(1),
                CourseId(7),
                &quote,
                "usd",
                Utc::now(),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_in_memory_user_directory() {
        let store = InMemoryStore::new();
        let user = User::new(UserId(1), "Ada", Role::Student);
        store.save_user(user.clone()).await.unwrap();
        assert_eq!(store.user(UserId(1)).await.unwrap(), Some(user));
        assert!(store.user(UserId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_payment_is_rejected() {
        let store = seeded_store().await;
        let payment = store.payment(&IntentId::from("pi_1")).await.unwrap().unwrap();
        assert!(matches!(
            store.insert_payment(payment).await,
            Err(MarketplaceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_purchase_applies_all_writes() {
        let store = seeded_store().await;
        let (payment, enrollment) = store
            .commit_purchase(&IntentId::from("pi_1"), Utc::now())
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        let course = store.course(CourseId(7)).await.unwrap().unwrap();
        assert_eq!(course.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_fault_rolls_back_everything() {
        let store = seeded_store().await;
        store.fail_next_commit();

        let result = store.commit_purchase(&IntentId::from("pi_1"), Utc::now()).await;
        assert!(matches!(result, Err(MarketplaceError::Storage(_))));

        let payment = store.payment(&IntentId::from("pi_1")).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(store.enrollment(UserId(1), CourseId(7)).await.unwrap().is_none());
        let course = store.course(CourseId(7)).await.unwrap().unwrap();
        assert_eq!(course.enrollment_count(), 0);

        // The fault is one-shot; the retried commit goes through.
        store
            .commit_purchase(&IntentId::from("pi_1"), Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_course_preserves_counter() {
        let store = seeded_store().await;
        store
            .commit_free_enrollment(UserId(2), CourseId(7), Utc::now())
            .await
            .unwrap();

        let mut edited = store.course(CourseId(7)).await.unwrap().unwrap();
        edited.title = "Ownership, Revisited".to_string();
        let fresh = Course::new(
            CourseId(7),
            edited.title.clone(),
            edited.price,
            None,
            UserId(10),
        )
        .unwrap();
        store.save_course(fresh).await.unwrap();

        let stored = store.course(CourseId(7)).await.unwrap().unwrap();
        assert_eq!(stored.title, "Ownership, Revisited");
        assert_eq!(stored.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_decrements_counter() {
        let store = seeded_store().await;
        store
            .commit_free_enrollment(UserId(2), CourseId(7), Utc::now())
            .await
            .unwrap();
        let cancelled = store
            .commit_cancellation(UserId(2), CourseId(7), Utc::now())
            .await
            .unwrap();

        assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
        let course = store.course(CourseId(7)).await.unwrap().unwrap();
        assert_eq!(course.enrollment_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_payment_unknown_intent() {
        let store = InMemoryStore::new();
        let result = store
            .fail_payment(&IntentId::from("pi_missing"), "declined", Utc::now())
            .await;
        assert!(matches!(result, Err(MarketplaceError::NotFound(_))));
    }
}
