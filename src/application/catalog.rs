use super::common::{require_course, require_user};
use crate::domain::course::{Course, CourseFilter, CourseId, CourseLevel, CourseStatus};
use crate::domain::money::Money;
use crate::domain::ports::{CourseCatalogRef, UserDirectoryRef};
use crate::domain::pricing::PriceQuote;
use crate::domain::user::{User, UserId};
use crate::error::{MarketplaceError, Result};
use rust_decimal::Decimal;
use tracing::{info, instrument};

/// Input for a new course listing.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub id: CourseId,
    pub title: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub category: Option<String>,
    pub level: CourseLevel,
}

/// A published course together with its current price quote.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub course: Course,
    pub quote: PriceQuote,
}

/// Course authoring, moderation and browsing.
pub struct CatalogService {
    courses: CourseCatalogRef,
    users: UserDirectoryRef,
    fee_rate: Decimal,
}

impl CatalogService {
    pub fn new(courses: CourseCatalogRef, users: UserDirectoryRef, fee_rate: Decimal) -> Self {
        Self {
            courses,
            users,
            fee_rate,
        }
    }

    #[instrument(skip(self, new_course), fields(course = %new_course.id))]
    pub async fn create_course(&self, author: UserId, new_course: NewCourse) -> Result<Course> {
        let user = require_user(&self.users, author).await?;
        if !user.can_author() {
            return Err(MarketplaceError::Forbidden(format!(
                "user {author} may not create courses"
            )));
        }
        if self.courses.course(new_course.id).await?.is_some() {
            return Err(MarketplaceError::Conflict(format!(
                "course {} already exists",
                new_course.id
            )));
        }

        let mut course = Course::new(
            new_course.id,
            new_course.title,
            new_course.price,
            new_course.discount_price,
            author,
        )?;
        course.category = new_course.category;
        course.level = new_course.level;
        self.courses.save_course(course.clone()).await?;
        info!(instructor = %author, "course created");
        Ok(course)
    }

    #[instrument(skip(self))]
    pub async fn publish_course(&self, actor: UserId, id: CourseId) -> Result<Course> {
        let (_, mut course) = self.authorize(actor, id).await?;
        if course.status != CourseStatus::Draft {
            return Err(MarketplaceError::InvalidState(format!(
                "course {id} is {} and cannot be published",
                course.status
            )));
        }
        course.status = CourseStatus::Published;
        self.courses.save_course(course.clone()).await?;
        info!(course = %id, "course published");
        Ok(course)
    }

    /// Takes a course off the catalog. Existing enrollments keep their access.
    #[instrument(skip(self))]
    pub async fn archive_course(&self, actor: UserId, id: CourseId) -> Result<Course> {
        let (user, mut course) = self.authorize(actor, id).await?;
        if course.status == CourseStatus::Archived {
            return Ok(course);
        }
        course.status = CourseStatus::Archived;
        self.courses.save_course(course.clone()).await?;
        info!(course = %id, moderator = user.is_admin(), "course archived");
        Ok(course)
    }

    /// Lists published courses matching `filter`, ordered by id.
    #[instrument(skip(self, filter))]
    pub async fn browse(&self, filter: &CourseFilter) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for course in self.courses.courses().await? {
            if !course.is_published() {
                continue;
            }
            let quote = PriceQuote::resolve(&course, self.fee_rate)?;
            if filter.matches(&course, quote.charge_amount) {
                entries.push(CatalogEntry { course, quote });
            }
        }
        entries.sort_by_key(|entry| entry.course.id);
        Ok(entries)
    }

    /// Only the owning instructor or an admin may change a course.
    async fn authorize(&self, actor: UserId, id: CourseId) -> Result<(User, Course)> {
        let user = require_user(&self.users, actor).await?;
        let course = require_course(&self.courses, id).await?;
        if course.instructor_id != actor && !user.is_admin() {
            return Err(MarketplaceError::Forbidden(format!(
                "user {actor} does not own course {id}"
            )));
        }
        Ok((user, course))
    }
}
