use crate::application::analytics::RevenueReport;
use crate::domain::course::Course;
use crate::domain::enrollment::Enrollment;
use crate::error::{MarketplaceError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct EnrollmentRow {
    user: u64,
    course: u64,
    status: String,
    progress: u8,
}

#[derive(Serialize)]
struct CourseRow<'a> {
    course: u64,
    title: &'a str,
    status: String,
    price: String,
    enrollments: u32,
}

#[derive(Serialize)]
struct RevenueRow {
    instructor: String,
    sales: u32,
    gross: String,
    platform_fee: String,
    payout: String,
}

/// Writes end-of-replay state as CSV. Amounts are printed with two decimals.
///
/// Headers are written explicitly so an empty report still has one.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
        }
    }

    /// One row per enrollment, ordered by user then course.
    pub fn write_enrollments(&mut self, mut enrollments: Vec<Enrollment>) -> Result<()> {
        enrollments.sort_by_key(|e| (e.user_id, e.course_id));
        self.writer
            .write_record(["user", "course", "status", "progress"])?;
        for enrollment in enrollments {
            self.writer.serialize(EnrollmentRow {
                user: enrollment.user_id.0,
                course: enrollment.course_id.0,
                status: enrollment.status.to_string(),
                progress: enrollment.progress,
            })?;
        }
        self.flush()
    }

    /// One row per course, ordered by id, with its list price.
    pub fn write_courses(&mut self, mut courses: Vec<Course>) -> Result<()> {
        courses.sort_by_key(|c| c.id);
        self.writer
            .write_record(["course", "title", "status", "price", "enrollments"])?;
        for course in &courses {
            self.writer.serialize(CourseRow {
                course: course.id.0,
                title: &course.title,
                status: course.status.to_string(),
                price: course.price.to_string(),
                enrollments: course.enrollment_count(),
            })?;
        }
        self.flush()
    }

    /// Per-instructor revenue followed by a `total` row.
    pub fn write_revenue(&mut self, report: &RevenueReport) -> Result<()> {
        self.writer
            .write_record(["instructor", "sales", "gross", "platform_fee", "payout"])?;
        for line in &report.by_instructor {
            self.writer.serialize(RevenueRow {
                instructor: line.instructor.to_string(),
                sales: line.sales,
                gross: line.gross.to_string(),
                platform_fee: line.platform_fee.to_string(),
                payout: line.payout.to_string(),
            })?;
        }
        self.writer.serialize(RevenueRow {
            instructor: "total".to_string(),
            sales: report.sales,
            gross: report.gross.to_string(),
            platform_fee: report.platform_fees.to_string(),
            payout: report.instructor_payouts.to_string(),
        })?;
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(MarketplaceError::from)
    }
}
