#![allow(dead_code)]

use coursemart::application::Marketplace;
use coursemart::application::catalog::NewCourse;
use coursemart::config::MarketplaceConfig;
use coursemart::domain::course::{CourseId, CourseLevel};
use coursemart::domain::money::Money;
use coursemart::domain::user::{Role, User, UserId};
use coursemart::infrastructure::in_memory::InMemoryStore;
use coursemart::infrastructure::simulated_gateway::SimulatedGateway;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

pub const SECRET: &str = "whsec_integration";

pub const INSTRUCTOR: UserId = UserId(1);
pub const STUDENT: UserId = UserId(2);
pub const OTHER_STUDENT: UserId = UserId(3);
pub const ADMIN: UserId = UserId(9);

/// A marketplace over in-memory storage and the simulated gateway, with handles on both
/// so tests can settle payments and inject faults.
pub struct Harness {
    pub marketplace: Arc<Marketplace>,
    pub store: InMemoryStore,
    pub gateway: SimulatedGateway,
}

impl Harness {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = SimulatedGateway::new();
        let config = MarketplaceConfig {
            webhook_secret: Some(SECRET.to_string()),
            ..Default::default()
        };
        let marketplace = Marketplace::new(store.clone(), Arc::new(gateway.clone()), &config);

        for user in [
            User::new(INSTRUCTOR, "Ada", Role::Instructor),
            User::new(STUDENT, "Grace", Role::Student),
            User::new(OTHER_STUDENT, "Linus", Role::Student),
            User::new(ADMIN, "Root", Role::Admin),
        ] {
            marketplace.register_user(user).await.unwrap();
        }

        Self {
            marketplace: Arc::new(marketplace),
            store,
            gateway,
        }
    }

    /// Creates and publishes a course owned by `INSTRUCTOR`.
    pub async fn published_course(
        &self,
        id: u64,
        price: Decimal,
        discount: Option<Decimal>,
    ) -> CourseId {
        let id = CourseId(id);
        self.marketplace
            .catalog
            .create_course(
                INSTRUCTOR,
                NewCourse {
                    id,
                    title: format!("Course {id}"),
                    price: Money::new(price).unwrap(),
                    discount_price: discount.map(|d| Money::new(d).unwrap()),
                    category: Some("programming".to_string()),
                    level: CourseLevel::Beginner,
                },
            )
            .await
            .unwrap();
        self.marketplace
            .catalog
            .publish_course(INSTRUCTOR, id)
            .await
            .unwrap();
        id
    }

    pub async fn enrollment_count(&self, id: CourseId) -> u32 {
        self.marketplace
            .courses()
            .course(id)
            .await
            .unwrap()
            .unwrap()
            .enrollment_count()
    }
}

/// Writes a replay file. Each row is the comma-separated tail after the header.
pub fn write_commands(path: &Path, rows: &[&str]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record(["op", "user", "course", "amount", "discount", "note"])?;
    for row in rows {
        wtr.write_record(row.split(','))?;
    }

    wtr.flush()?;
    Ok(())
}
