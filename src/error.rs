use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum MarketplaceError {
    #[error("Not found: {0}")]
    #[diagnostic(code(coursemart::not_found))]
    NotFound(String),

    #[error("Invalid state: {0}")]
    #[diagnostic(code(coursemart::invalid_state))]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    #[diagnostic(code(coursemart::forbidden))]
    Forbidden(String),

    #[error("Conflict: {0}")]
    #[diagnostic(
        code(coursemart::conflict),
        help("the user is already enrolled; re-fetch the enrollment instead of retrying")
    )]
    Conflict(String),

    #[error("Payment not completed: gateway reports status '{0}'")]
    #[diagnostic(code(coursemart::payment_not_completed))]
    PaymentNotCompleted(String),

    #[error("Payment gateway error: {0}")]
    #[diagnostic(
        code(coursemart::payment_gateway),
        help("the purchase was not reserved; start a new purchase intent")
    )]
    PaymentGateway(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(coursemart::validation))]
    Validation(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(coursemart::storage))]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketplaceError {
    /// True for the duplicate-enrollment / double-confirmation class of failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, MarketplaceError>;
