use super::course::CourseId;
use super::user::UserId;
use crate::error::{MarketplaceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A student's right to access a course's lessons.
///
/// There is at most one enrollment per `(user_id, course_id)`; cancelling flips the
/// status and re-enrolling reactivates the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    /// Percentage of the course completed, 0 to 100.
    pub progress: u8,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// Admits `user_id` to `course_id` given whatever enrollment is already stored for the pair.
    pub fn admit(
        existing: Option<Self>,
        user_id: UserId,
        course_id: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        match existing {
            Some(enrollment) if enrollment.grants_access() => {
                Err(MarketplaceError::Conflict(format!(
                    "user {user_id} is already enrolled in course {course_id}"
                )))
            }
            Some(cancelled) => Ok(Self {
                status: EnrollmentStatus::Active,
                enrolled_at: at,
                progress: 0,
                completed_at: None,
                cancelled_at: None,
                ..cancelled
            }),
            None => Ok(Self {
                id: Uuid::new_v4(),
                user_id,
                course_id,
                status: EnrollmentStatus::Active,
                enrolled_at: at,
                progress: 0,
                completed_at: None,
                cancelled_at: None,
            }),
        }
    }

    pub fn grants_access(&self) -> bool {
        matches!(
            self.status,
            EnrollmentStatus::Active | EnrollmentStatus::Completed
        )
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status == EnrollmentStatus::Cancelled {
            return Err(MarketplaceError::InvalidState(format!(
                "enrollment of user {} in course {} is already cancelled",
                self.user_id, self.course_id
            )));
        }
        self.status = EnrollmentStatus::Cancelled;
        self.cancelled_at = Some(at);
        Ok(())
    }

    /// Records lesson progress. Progress never moves backwards; reaching 100 completes the course.
    pub fn record_progress(&mut self, percent: u8, at: DateTime<Utc>) -> Result<()> {
        if percent > 100 {
            return Err(MarketplaceError::Validation(format!(
                "progress must be between 0 and 100, got {percent}"
            )));
        }
        if self.status != EnrollmentStatus::Active {
            return Err(MarketplaceError::InvalidState(format!(
                "enrollment is {} and cannot record progress",
                self.status
            )));
        }
        self.progress = self.progress.max(percent);
        if self.progress == 100 {
            self.status = EnrollmentStatus::Completed;
            self.completed_at = Some(at);
        }
        Ok(())
    }
}
