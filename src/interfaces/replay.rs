use super::csv::command_reader::{CommandRecord, Op};
use crate::application::Marketplace;
use crate::application::analytics::RevenueReport;
use crate::application::catalog::NewCourse;
use crate::application::webhook::WebhookOutcome;
use crate::domain::course::CourseId;
use crate::domain::gateway::GatewayEvent;
use crate::domain::money::Money;
use crate::domain::payment::IntentId;
use crate::domain::user::{Role, User, UserId};
use crate::domain::webhook_signature;
use crate::error::{MarketplaceError, Result};
use crate::infrastructure::simulated_gateway::SimulatedGateway;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Drives a [`Marketplace`] from replay commands.
///
/// The runner plays every outside party: it remembers the intent handed out for each
/// `(user, course)` purchase, settles or declines it on the simulated gateway, and signs
/// webhook deliveries with the configured secret.
pub struct CommandRunner {
    marketplace: Marketplace,
    gateway: Option<SimulatedGateway>,
    webhook_secret: Option<String>,
    intents: HashMap<(UserId, CourseId), IntentId>,
    admin: Option<UserId>,
}

impl CommandRunner {
    /// `gateway` is the simulated gateway behind `marketplace`, if any. Without it `pay`
    /// and `decline` rows fail, since a real gateway settles on its own.
    pub fn new(
        marketplace: Marketplace,
        gateway: Option<SimulatedGateway>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            marketplace,
            gateway,
            webhook_secret,
            intents: HashMap::new(),
            admin: None,
        }
    }

    pub fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }

    #[instrument(skip(self, record), fields(op = ?record.op, user = record.user))]
    pub async fn apply(&mut self, record: CommandRecord) -> Result<()> {
        let user = record.user_id();
        match record.op {
            Op::Student => self.register(&record, Role::Student).await,
            Op::Instructor => self.register(&record, Role::Instructor).await,
            Op::Admin => {
                self.register(&record, Role::Admin).await?;
                self.admin.get_or_insert(user);
                Ok(())
            }
            Op::Course => {
                let course = self.create_course(&record).await?;
                self.marketplace.catalog.publish_course(user, course).await?;
                Ok(())
            }
            Op::DraftCourse => self.create_course(&record).await.map(|_| ()),
            Op::Publish => {
                let course = record.course_id()?;
                self.marketplace.catalog.publish_course(user, course).await?;
                Ok(())
            }
            Op::Archive => {
                let course = record.course_id()?;
                self.marketplace.catalog.archive_course(user, course).await?;
                Ok(())
            }
            Op::Purchase => {
                let course = record.course_id()?;
                let intent = self
                    .marketplace
                    .purchases
                    .create_purchase_intent(user, course)
                    .await?;
                debug!(intent = %intent.intent_id, amount = %intent.amount, "intent issued");
                self.intents.insert((user, course), intent.intent_id);
                Ok(())
            }
            Op::Pay => {
                let intent = self.intent_for(user, record.course_id()?)?;
                self.simulated_gateway()?.settle(&intent).await
            }
            Op::Decline => {
                let intent = self.intent_for(user, record.course_id()?)?;
                self.simulated_gateway()?.decline(&intent).await?;
                let reason = record.note().unwrap_or("Your card was declined.");
                let outcome = self.deliver(GatewayEvent::failed(intent, reason)).await?;
                log_outcome(&outcome);
                Ok(())
            }
            Op::Confirm => {
                let course = record.course_id()?;
                let intent = self.intent_for(user, course)?;
                let confirmed = self
                    .marketplace
                    .purchases
                    .confirm_purchase(user, course, &intent)
                    .await?;
                info!(payment = %confirmed.payment.id, "purchase confirmed");
                Ok(())
            }
            Op::Webhook => {
                let intent = self.intent_for(user, record.course_id()?)?;
                let outcome = self.deliver(GatewayEvent::succeeded(intent)).await?;
                log_outcome(&outcome);
                Ok(())
            }
            Op::EnrollFree => {
                let course = record.course_id()?;
                self.marketplace.purchases.enroll_free(user, course).await?;
                Ok(())
            }
            Op::Cancel => {
                let course = record.course_id()?;
                self.marketplace
                    .purchases
                    .cancel_enrollment(user, course)
                    .await?;
                Ok(())
            }
            Op::Progress => {
                let course = record.course_id()?;
                let percent = record.percent()?;
                self.marketplace
                    .purchases
                    .record_progress(user, course, percent)
                    .await?;
                Ok(())
            }
        }
    }

    /// Revenue as seen by the first admin registered during the replay.
    pub async fn revenue(&self) -> Result<RevenueReport> {
        let admin = self.admin.ok_or_else(|| {
            MarketplaceError::Forbidden("the revenue report needs an admin row".to_string())
        })?;
        self.marketplace.analytics.report(admin).await
    }

    async fn register(&self, record: &CommandRecord, role: Role) -> Result<()> {
        let name = record
            .note()
            .map(str::to_string)
            .unwrap_or_else(|| format!("user {}", record.user));
        self.marketplace
            .register_user(User::new(record.user_id(), name, role))
            .await
    }

    async fn create_course(&self, record: &CommandRecord) -> Result<CourseId> {
        let id = record.course_id()?;
        let title = record.note().ok_or_else(|| {
            MarketplaceError::Validation("a course row needs a title in the note column".to_string())
        })?;
        let price = Money::new(record.amount.unwrap_or_default())?;
        let discount_price = record.discount.map(Money::new).transpose()?;
        self.marketplace
            .catalog
            .create_course(
                record.user_id(),
                NewCourse {
                    id,
                    title: title.to_string(),
                    price,
                    discount_price,
                    category: None,
                    level: Default::default(),
                },
            )
            .await?;
        Ok(id)
    }

    fn intent_for(&self, user: UserId, course: CourseId) -> Result<IntentId> {
        self.intents.get(&(user, course)).cloned().ok_or_else(|| {
            MarketplaceError::NotFound(format!(
                "no purchase intent for user {user} and course {course}"
            ))
        })
    }

    fn simulated_gateway(&self) -> Result<&SimulatedGateway> {
        self.gateway.as_ref().ok_or_else(|| {
            MarketplaceError::InvalidState(
                "settling payments requires the simulated gateway".to_string(),
            )
        })
    }

    async fn deliver(&self, event: GatewayEvent) -> Result<WebhookOutcome> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            MarketplaceError::Forbidden("no webhook signing secret is configured".to_string())
        })?;
        let payload = event.to_json()?;
        let header = webhook_signature::sign(&payload, secret, Utc::now().timestamp())?;
        self.marketplace.webhooks.handle(&payload, &header).await
    }
}

fn log_outcome(outcome: &WebhookOutcome) {
    match outcome {
        WebhookOutcome::Enrolled(confirmed) => {
            info!(payment = %confirmed.payment.id, "webhook enrolled buyer")
        }
        WebhookOutcome::AlreadyProcessed => info!("webhook already processed"),
        WebhookOutcome::PaymentFailed(payment) => {
            info!(payment = %payment.id, "webhook recorded payment failure")
        }
        WebhookOutcome::Ignored(reason) => info!(%reason, "webhook ignored"),
    }
}
