use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::Enrollment;
use crate::domain::money::Money;
use crate::domain::payment::Payment;
use crate::domain::ports::{CourseCatalogRef, UserDirectoryRef};
use crate::domain::user::{User, UserId};
use crate::error::{MarketplaceError, Result};
use serde::Serialize;

/// Human-readable description of what is being bought or was enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    pub course_id: CourseId,
    pub title: String,
    pub instructor_name: String,
    pub amount: Money,
}

/// An enrollment joined with its course summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentDetails {
    pub enrollment: Enrollment,
    pub course: CourseSummary,
}

/// The result of a successful purchase confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedPurchase {
    pub payment: Payment,
    pub enrollment: EnrollmentDetails,
}

pub(crate) async fn require_user(users: &UserDirectoryRef, id: UserId) -> Result<User> {
    users
        .user(id)
        .await?
        .ok_or_else(|| MarketplaceError::NotFound(format!("user {id}")))
}

pub(crate) async fn require_course(courses: &CourseCatalogRef, id: CourseId) -> Result<Course> {
    courses
        .course(id)
        .await?
        .ok_or_else(|| MarketplaceError::NotFound(format!("course {id}")))
}

/// Loads a course a student may buy or join: it must be published and not their own.
pub(crate) async fn require_purchasable(
    courses: &CourseCatalogRef,
    id: CourseId,
    buyer: UserId,
) -> Result<Course> {
    let course = require_course(courses, id).await?;
    if !course.is_published() {
        return Err(MarketplaceError::InvalidState(format!(
            "course {id} is {} and cannot be purchased",
            course.status
        )));
    }
    if course.instructor_id == buyer {
        return Err(MarketplaceError::Forbidden(format!(
            "user {buyer} is the instructor of course {id}"
        )));
    }
    Ok(course)
}

pub(crate) async fn summarize(
    users: &UserDirectoryRef,
    course: &Course,
    amount: Money,
) -> Result<CourseSummary> {
    let instructor_name = users
        .user(course.instructor_id)
        .await?
        .map(|u| u.name)
        .unwrap_or_else(|| format!("instructor {}", course.instructor_id));
    Ok(CourseSummary {
        course_id: course.id,
        title: course.title.clone(),
        instructor_name,
        amount,
    })
}
