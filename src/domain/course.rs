use super::money::Money;
use super::user::UserId;
use crate::error::{MarketplaceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub u64);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    AllLevels,
}

/// A sellable course.
///
/// `enrollment_count` is a denormalized counter. It is private and only moves inside
/// the atomic enrollment commits of the persistence adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub status: CourseStatus,
    pub instructor_id: UserId,
    pub category: Option<String>,
    pub level: CourseLevel,
    enrollment_count: u32,
}

impl Course {
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        price: Money,
        discount_price: Option<Money>,
        instructor_id: UserId,
    ) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(MarketplaceError::Validation(
                "course title must not be empty".to_string(),
            ));
        }
        if let Some(discount) = discount_price
            && discount > price
        {
            return Err(MarketplaceError::Validation(format!(
                "discount price {discount} exceeds price {price}"
            )));
        }
        Ok(Self {
            id,
            title,
            price,
            discount_price,
            status: CourseStatus::Draft,
            instructor_id,
            category: None,
            level: CourseLevel::default(),
            enrollment_count: 0,
        })
    }

    pub fn enrollment_count(&self) -> u32 {
        self.enrollment_count
    }

    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }

    pub(crate) fn record_enrollment(&mut self) {
        self.enrollment_count = self.enrollment_count.saturating_add(1);
    }

    pub(crate) fn record_cancellation(&mut self) {
        self.enrollment_count = self.enrollment_count.saturating_sub(1);
    }

    /// Keeps the counter from `stored` when a catalog edit overwrites a course.
    pub(crate) fn preserve_counter_from(&mut self, stored: &Course) {
        self.enrollment_count = stored.enrollment_count;
    }
}

/// Inclusive bounds on the chargeable price of a course.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceRange {
    pub min: Option<Money>,
    pub max: Option<Money>,
}

impl PriceRange {
    pub fn contains(&self, amount: Money) -> bool {
        self.min.is_none_or(|min| amount >= min) && self.max.is_none_or(|max| amount <= max)
    }
}

/// Typed catalog query. Every criterion left as `None` matches all courses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseFilter {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub price_range: Option<PriceRange>,
    pub instructor: Option<UserId>,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course, effective_price: Money) -> bool {
        let search_ok = self.search.as_deref().is_none_or(|needle| {
            course
                .title
                .to_lowercase()
                .contains(&needle.trim().to_lowercase())
        });
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|wanted| course.category.as_deref() == Some(wanted));
        let level_ok = self.level.is_none_or(|level| course.level == level);
        let price_ok = self
            .price_range
            .is_none_or(|range| range.contains(effective_price));
        let instructor_ok = self
            .instructor
            .is_none_or(|instructor| course.instructor_id == instructor);

        search_ok && category_ok && level_ok && price_ok && instructor_ok
    }
}
