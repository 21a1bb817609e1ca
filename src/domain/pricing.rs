use super::course::Course;
use super::money::Money;
use crate::error::{MarketplaceError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a buyer pays for a course and how the sale is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub charge_amount: Money,
    pub platform_fee: Money,
    pub instructor_amount: Money,
}

impl PriceQuote {
    /// Resolves the chargeable amount of `course` and splits it at `fee_rate`.
    ///
    /// A discount only applies when it is strictly below the list price.
    pub fn resolve(course: &Course, fee_rate: Decimal) -> Result<Self> {
        if course.price.value() < Decimal::ZERO {
            return Err(MarketplaceError::Validation(format!(
                "course {} has a negative price",
                course.id
            )));
        }
        let charge_amount = match course.discount_price {
            Some(discount) if discount < course.price => discount,
            _ => course.price,
        };
        let platform_fee = charge_amount.share(fee_rate);
        Ok(Self {
            charge_amount,
            platform_fee,
            instructor_amount: charge_amount - platform_fee,
        })
    }

    pub fn is_free(&self) -> bool {
        self.charge_amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::CourseId;
    use crate::domain::user::UserId;
    use rust_decimal_macros::dec;

    fn course(price: Decimal, discount: Option<Decimal>) -> Course {
        Course::new(
            CourseId(1),
            "Course",
            Money::new(price).unwrap(),
            discount.map(|d| Money::new(d).unwrap()),
            UserId(1),
        )
        .unwrap()
    }

    #[test]
    fn test_discount_price_is_charged() {
        let quote = PriceQuote::resolve(&course(dec!(100.00), Some(dec!(80.00))), dec!(0.05)).unwrap();
        assert_eq!(quote.charge_amount.value(), dec!(80.00));
        assert_eq!(quote.platform_fee.value(), dec!(4.00));
        assert_eq!(quote.instructor_amount.value(), dec!(76.00));
    }

    #[test]
    fn test_list_price_without_discount() {
        let quote = PriceQuote::resolve(&course(dec!(49.99), None), dec!(0.05)).unwrap();
        assert_eq!(quote.charge_amount.value(), dec!(49.99));
        assert_eq!(quote.platform_fee.value(), dec!(2.50));
        assert_eq!(quote.instructor_amount.value(), dec!(47.49));
    }

    #[test]
    fn test_discount_equal_to_price_is_ignored() {
        let quote = PriceQuote::resolve(&course(dec!(20), Some(dec!(20))), dec!(0.05)).unwrap();
        assert_eq!(quote.charge_amount.value(), dec!(20));
    }

    #[test]
    fn test_free_course() {
        let quote = PriceQuote::resolve(&course(dec!(0), None), dec!(0.05)).unwrap();
        assert!(quote.is_free());
        assert!(quote.platform_fee.is_zero());
        assert!(quote.instructor_amount.is_zero());
    }

    #[test]
    fn test_free_through_full_discount() {
        let quote = PriceQuote::resolve(&course(dec!(30), Some(dec!(0))), dec!(0.05)).unwrap();
        assert!(quote.is_free());
    }
}
