use crate::domain::course::CourseId;
use crate::domain::user::UserId;
use crate::error::{MarketplaceError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Student,
    Instructor,
    Admin,
    Course,
    DraftCourse,
    Publish,
    Archive,
    Purchase,
    Pay,
    Decline,
    Confirm,
    Webhook,
    EnrollFree,
    Cancel,
    Progress,
}

/// One row of a replay file: `op,user,course,amount,discount,note`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandRecord {
    pub op: Op,
    pub user: u64,
    #[serde(default)]
    pub course: Option<u64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
}

impl CommandRecord {
    pub fn user_id(&self) -> UserId {
        UserId(self.user)
    }

    pub fn course_id(&self) -> Result<CourseId> {
        self.course.map(CourseId).ok_or_else(|| {
            MarketplaceError::Validation(format!("{:?} requires a course column", self.op))
        })
    }

    /// The `note` column, ignoring blanks.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref().filter(|note| !note.is_empty())
    }

    /// Reads `amount` as a whole percentage for `progress` rows.
    pub fn percent(&self) -> Result<u8> {
        let amount = self.amount.ok_or_else(|| {
            MarketplaceError::Validation("progress requires an amount column".to_string())
        })?;
        if !amount.fract().is_zero() || amount.is_sign_negative() || amount > Decimal::ONE_HUNDRED
        {
            return Err(MarketplaceError::Validation(format!(
                "progress {amount} is not a whole percentage"
            )));
        }
        amount
            .to_u8()
            .ok_or_else(|| MarketplaceError::Validation(format!("progress {amount} is out of range")))
    }
}

/// Streams replay commands from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted, so trailing optional columns may be
/// left out.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands; a malformed row yields an error and reading goes on.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(MarketplaceError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, user, course, amount, discount, note\n\
                    instructor, 1, , , , Ada\n\
                    course, 1, 10, 100.00, 80.00, Rust for Everyone\n\
                    purchase, 2, 10, , ,";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<CommandRecord>> = reader.commands().collect();

        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.op, Op::Instructor);
        assert_eq!(first.course, None);
        assert_eq!(first.note(), Some("Ada"));

        let course = results[1].as_ref().unwrap();
        assert_eq!(course.op, Op::Course);
        assert_eq!(course.course_id().unwrap(), CourseId(10));
        assert_eq!(course.amount, Some(dec!(100.00)));
        assert_eq!(course.discount, Some(dec!(80.00)));

        let purchase = results[2].as_ref().unwrap();
        assert_eq!(purchase.op, Op::Purchase);
        assert_eq!(purchase.note(), None);
    }

    #[test]
    fn test_reader_short_rows() {
        let data = "op,user,course,amount,discount,note\nenroll_free,3,7";
        let reader = CommandReader::new(data.as_bytes());
        let record = reader.commands().next().unwrap().unwrap();

        assert_eq!(record.op, Op::EnrollFree);
        assert_eq!(record.course, Some(7));
        assert_eq!(record.amount, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op,user,course,amount,discount,note\nrefund,1,1,,,\npublish,1,1,,,";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<CommandRecord>> = reader.commands().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_missing_course_column() {
        let data = "op,user,course,amount,discount,note\npublish,1,,,,";
        let record = CommandReader::new(data.as_bytes())
            .commands()
            .next()
            .unwrap()
            .unwrap();

        assert!(matches!(
            record.course_id(),
            Err(MarketplaceError::Validation(_))
        ));
    }

    #[test]
    fn test_percent_parsing() {
        let mut record = CommandRecord {
            op: Op::Progress,
            user: 1,
            course: Some(1),
            amount: Some(dec!(40)),
            discount: None,
            note: None,
        };
        assert_eq!(record.percent().unwrap(), 40);

        record.amount = Some(dec!(100.0));
        assert_eq!(record.percent().unwrap(), 100);

        record.amount = Some(dec!(12.5));
        assert!(record.percent().is_err());

        record.amount = Some(dec!(101));
        assert!(record.percent().is_err());

        record.amount = None;
        assert!(record.percent().is_err());
    }
}
