use super::common::require_user;
use crate::domain::money::Money;
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{CourseCatalogRef, PaymentStoreRef, UserDirectoryRef};
use crate::domain::user::UserId;
use crate::error::{MarketplaceError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{instrument, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstructorRevenue {
    pub instructor: UserId,
    pub sales: u32,
    pub gross: Money,
    pub platform_fee: Money,
    pub payout: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevenueReport {
    pub sales: u32,
    pub gross: Money,
    pub platform_fees: Money,
    pub instructor_payouts: Money,
    /// Ordered by instructor id.
    pub by_instructor: Vec<InstructorRevenue>,
}

/// Admin revenue analytics over completed payments.
pub struct RevenueAnalytics {
    payments: PaymentStoreRef,
    courses: CourseCatalogRef,
    users: UserDirectoryRef,
}

impl RevenueAnalytics {
    pub fn new(
        payments: PaymentStoreRef,
        courses: CourseCatalogRef,
        users: UserDirectoryRef,
    ) -> Self {
        Self {
            payments,
            courses,
            users,
        }
    }

    #[instrument(skip(self))]
    pub async fn report(&self, requester: UserId) -> Result<RevenueReport> {
        let user = require_user(&self.users, requester).await?;
        if !user.is_admin() {
            return Err(MarketplaceError::Forbidden(format!(
                "user {requester} may not view revenue"
            )));
        }

        let instructors: HashMap<_, _> = self
            .courses
            .courses()
            .await?
            .into_iter()
            .map(|course| (course.id, course.instructor_id))
            .collect();

        let mut report = RevenueReport::default();
        let mut by_instructor: BTreeMap<UserId, InstructorRevenue> = BTreeMap::new();
        for payment in self.payments.payments().await? {
            if payment.status != PaymentStatus::Completed {
                continue;
            }
            let Some(&instructor) = instructors.get(&payment.course_id) else {
                warn!(payment = %payment.id, course = %payment.course_id, "payment for unknown course");
                continue;
            };

            report.sales += 1;
            report.gross += payment.amount;
            report.platform_fees += payment.platform_fee;
            report.instructor_payouts += payment.instructor_amount;

            let entry = by_instructor
                .entry(instructor)
                .or_insert_with(|| InstructorRevenue {
                    instructor,
                    ..Default::default()
                });
            entry.sales += 1;
            entry.gross += payment.amount;
            entry.platform_fee += payment.platform_fee;
            entry.payout += payment.instructor_amount;
        }
        report.by_instructor = by_instructor.into_values().collect();
        Ok(report)
    }
}
