//! Application layer orchestrating the marketplace use cases.
//!
//! Each component receives only the ports it needs. `Marketplace` wires them all from a
//! single backend and a payment gateway.

pub mod analytics;
pub mod catalog;
pub mod committer;
pub mod common;
pub mod issuer;
pub mod purchase;
pub mod verifier;
pub mod webhook;

use crate::config::MarketplaceConfig;
use crate::domain::ports::{
    CourseCatalogRef, EnrollmentLedgerRef, EnrollmentStoreRef, MarketplaceStore,
    PaymentGatewayRef, PaymentStoreRef, UserDirectoryRef,
};
use crate::domain::user::User;
use crate::error::Result;
use analytics::RevenueAnalytics;
use catalog::CatalogService;
use committer::EnrollmentCommitter;
use issuer::PaymentIntentIssuer;
use purchase::PurchaseFlow;
use std::sync::Arc;
use verifier::ConfirmationVerifier;
use webhook::WebhookProcessor;

pub struct Marketplace {
    pub purchases: PurchaseFlow,
    pub webhooks: WebhookProcessor,
    pub catalog: CatalogService,
    pub analytics: RevenueAnalytics,
    users: UserDirectoryRef,
    courses: CourseCatalogRef,
    payments: PaymentStoreRef,
    enrollments: EnrollmentStoreRef,
}

impl Marketplace {
    pub fn new<S>(store: S, gateway: PaymentGatewayRef, config: &MarketplaceConfig) -> Self
    where
        S: MarketplaceStore + 'static,
    {
        let store = Arc::new(store);
        let users: UserDirectoryRef = store.clone();
        let courses: CourseCatalogRef = store.clone();
        let payments: PaymentStoreRef = store.clone();
        let enrollments: EnrollmentStoreRef = store.clone();
        let ledger: EnrollmentLedgerRef = store;

        let committer = || EnrollmentCommitter::new(ledger.clone(), courses.clone(), users.clone());
        let purchases = PurchaseFlow::new(
            PaymentIntentIssuer::new(
                courses.clone(),
                users.clone(),
                enrollments.clone(),
                payments.clone(),
                gateway.clone(),
                config.platform_fee_rate,
                config.currency.clone(),
            ),
            ConfirmationVerifier::new(payments.clone(), enrollments.clone(), gateway),
            committer(),
            courses.clone(),
            users.clone(),
            enrollments.clone(),
            config.platform_fee_rate,
        );
        let webhooks = WebhookProcessor::new(
            payments.clone(),
            committer(),
            config.webhook_secret.clone(),
            config.webhook_tolerance,
        );

        Self {
            purchases,
            webhooks,
            catalog: CatalogService::new(courses.clone(), users.clone(), config.platform_fee_rate),
            analytics: RevenueAnalytics::new(payments.clone(), courses.clone(), users.clone()),
            users,
            courses,
            payments,
            enrollments,
        }
    }

    pub async fn register_user(&self, user: User) -> Result<()> {
        self.users.save_user(user).await
    }

    pub fn users(&self) -> &UserDirectoryRef {
        &self.users
    }

    pub fn courses(&self) -> &CourseCatalogRef {
        &self.courses
    }

    pub fn payments(&self) -> &PaymentStoreRef {
        &self.payments
    }

    pub fn enrollments(&self) -> &EnrollmentStoreRef {
        &self.enrollments
    }
}
