use crate::error::{MarketplaceError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Default marketplace cut of every sale (5%).
pub const DEFAULT_PLATFORM_FEE_RATE: Decimal = dec!(0.05);
/// How far a webhook timestamp may drift from the local clock.
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);

/// Runtime settings shared by the purchase flow and the webhook processor.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceConfig {
    /// Fraction of the charge kept by the platform, in `[0, 1)`.
    pub platform_fee_rate: Decimal,
    /// Lowercase ISO-4217 code sent to the payment gateway.
    pub currency: String,
    /// Shared secret used to authenticate gateway webhooks.
    pub webhook_secret: Option<String>,
    pub webhook_tolerance: Duration,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            platform_fee_rate: DEFAULT_PLATFORM_FEE_RATE,
            currency: "usd".to_string(),
            webhook_secret: None,
            webhook_tolerance: DEFAULT_WEBHOOK_TOLERANCE,
        }
    }
}

impl MarketplaceConfig {
    pub fn validate(self) -> Result<Self> {
        if self.platform_fee_rate < Decimal::ZERO || self.platform_fee_rate >= Decimal::ONE {
            return Err(MarketplaceError::Validation(format!(
                "platform fee rate must be in [0, 1), got {}",
                self.platform_fee_rate
            )));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MarketplaceError::Validation(format!(
                "currency must be a 3-letter code, got '{}'",
                self.currency
            )));
        }
        Ok(Self {
            currency: self.currency.to_ascii_lowercase(),
            ..self
        })
    }
}
