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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for registered users.
pub const CF_USERS: &str = "users";
/// Column Family for the course catalog.
pub const CF_COURSES: &str = "courses";
/// Column Family for payments, keyed by intent id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for enrollments, keyed by the `(user, course)` pair.
pub const CF_ENROLLMENTS: &str = "enrollments";

impl From<rocksdb::Error> for MarketplaceError {
    fn from(e: rocksdb::Error) -> Self {
        MarketplaceError::Storage(e.to_string())
    }
}

fn enrollment_key(user: UserId, course: CourseId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&user.0.to_be_bytes());
    key[8..].copy_from_slice(&course.0.to_be_bytes());
    key
}

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family. Enrollments are keyed by the big-endian
/// `(user, course)` pair, so the key itself enforces one enrollment per pair. Writes
/// are serialised by `commit_lock` and ledger commits land as a single `WriteBatch`,
/// which makes the read-check-write sequence atomic for this process.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_USERS, CF_COURSES, CF_PAYMENTS, CF_ENROLLMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| MarketplaceError::Storage(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        family: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(family)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn load_course(&self, id: CourseId) -> Result<Course> {
        self.get_json(CF_COURSES, &id.0.to_be_bytes())?
            .ok_or_else(|| MarketplaceError::NotFound(format!("course {id}")))
    }
}

#[async_trait]
impl UserDirectory for RocksDBStore {
    async fn save_user(&self, user: User) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_USERS, &user.id.0.to_be_bytes(), &user)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, &id.0.to_be_bytes())
    }
}

#[async_trait]
impl CourseCatalog for RocksDBStore {
    async fn save_course(&self, mut course: Course) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let key = course.id.0.to_be_bytes();
        if let Some(stored) = self.get_json::<Course>(CF_COURSES, &key)? {
            course.preserve_counter_from(&stored);
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_COURSES, &key, &course)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn course(&self, id: CourseId) -> Result<Option<Course>> {
        self.get_json(CF_COURSES, &id.0.to_be_bytes())
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        self.scan(CF_COURSES)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert_payment(&self, payment: Payment) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let key = payment.id.as_str().as_bytes();
        if self.get_json::<Payment>(CF_PAYMENTS, key)?.is_some() {
            return Err(MarketplaceError::Conflict(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, key, &payment)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn payment(&self, id: &IntentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, id.as_str().as_bytes())
    }

    async fn fail_payment(
        &self,
        id: &IntentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Payment> {
        let _guard = self.commit_lock.lock().await;
        let key = id.as_str().as_bytes();
        let mut payment: Payment = self
            .get_json(CF_PAYMENTS, key)?
            .ok_or_else(|| MarketplaceError::NotFound(format!("payment {id}")))?;
        payment.fail(reason, at)?;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, key, &payment)?;
        self.db.write(batch)?;
        Ok(payment)
    }

    async fn payments(&self) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

#[async_trait]
impl EnrollmentStore for RocksDBStore {
    async fn enrollment(&self, user: UserId, course: CourseId) -> Result<Option<Enrollment>> {
        self.get_json(CF_ENROLLMENTS, &enrollment_key(user, course))
    }

    async fn enrollments(&self) -> Result<Vec<Enrollment>> {
        self.scan(CF_ENROLLMENTS)
    }

    async fn record_progress(
        &self,
        user: UserId,
        course: CourseId,
        percent: u8,
        at: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let _guard = self.commit_lock.lock().await;
        let key = enrollment_key(user, course);
        let mut enrollment: Enrollment = self.get_json(CF_ENROLLMENTS, &key)?.ok_or_else(|| {
            MarketplaceError::NotFound(format!("enrollment of user {user} in course {course}"))
        })?;
        enrollment.record_progress(percent, at)?;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ENROLLMENTS, &key, &enrollment)?;
        self.db.write(batch)?;
        Ok(enrollment)
    }
}

#[async_trait]
impl EnrollmentLedger for RocksDBStore {
    async fn commit_purchase(
        &self,
        intent: &IntentId,
        at: DateTime<Utc>,
    ) -> Result<(Payment, Enrollment)> {
        let _guard = self.commit_lock.lock().await;

        let payment_key = intent.as_str().as_bytes();
        let mut payment: Payment = self
            .get_json(CF_PAYMENTS, payment_key)?
            .ok_or_else(|| MarketplaceError::NotFound(format!("payment {intent}")))?;
        let key = enrollment_key(payment.user_id, payment.course_id);
        let existing = self.get_json(CF_ENROLLMENTS, &key)?;

        payment.complete(at)?;
        let enrollment = Enrollment::admit(existing, payment.user_id, payment.course_id, at)?;
        let mut course = self.load_course(payment.course_id)?;
        course.record_enrollment();

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, payment_key, &payment)?;
        self.put_json(&mut batch, CF_ENROLLMENTS, &key, &enrollment)?;
        self.put_json(&mut batch, CF_COURSES, &course.id.0.to_be_bytes(), &course)?;
        self.db.write(batch)?;
        Ok((payment, enrollment))
    }

    async fn commit_free_enrollment(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let _guard = self.commit_lock.lock().await;

        let key = enrollment_key(user, course);
        let existing = self.get_json(CF_ENROLLMENTS, &key)?;
        let enrollment = Enrollment::admit(existing, user, course, at)?;
        let mut stored_course = self.load_course(course)?;
        stored_course.record_enrollment();

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ENROLLMENTS, &key, &enrollment)?;
        self.put_json(&mut batch, CF_COURSES, &course.0.to_be_bytes(), &stored_course)?;
        self.db.write(batch)?;
        Ok(enrollment)
    }

    async fn commit_cancellation(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment> {
        let _guard = self.commit_lock.lock().await;

        let key = enrollment_key(user, course);
        let mut enrollment: Enrollment = self.get_json(CF_ENROLLMENTS, &key)?.ok_or_else(|| {
            MarketplaceError::NotFound(format!("enrollment of user {user} in course {course}"))
        })?;
        enrollment.cancel(at)?;
        let mut stored_course = self.load_course(course)?;
        stored_course.record_cancellation();

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ENROLLMENTS, &key, &enrollment)?;
        self.put_json(&mut batch, CF_COURSES, &course.0.to_be_bytes(), &stored_course)?;
        self.db.write(batch)?;
        Ok(enrollment)
    }
}
