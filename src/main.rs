use clap::{Parser, ValueEnum};
use coursemart::application::Marketplace;
use coursemart::config::{DEFAULT_PLATFORM_FEE_RATE, MarketplaceConfig};
use coursemart::domain::ports::{MarketplaceStore, PaymentGatewayRef};
use coursemart::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use coursemart::infrastructure::rocksdb::RocksDBStore;
use coursemart::infrastructure::simulated_gateway::SimulatedGateway;
use coursemart::infrastructure::stripe::StripeGateway;
use coursemart::interfaces::csv::command_reader::CommandReader;
use coursemart::interfaces::csv::report_writer::ReportWriter;
use coursemart::interfaces::replay::CommandRunner;
use coursemart::telemetry;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Enrollments,
    Courses,
    Revenue,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Which state to print once the replay is done
    #[arg(long, value_enum, default_value_t = Report::Enrollments)]
    report: Report,

    /// Fraction of every sale kept by the platform
    #[arg(long, env = "COURSEMART_PLATFORM_FEE_RATE", default_value_t = DEFAULT_PLATFORM_FEE_RATE)]
    platform_fee_rate: Decimal,

    /// ISO-4217 currency code for payment intents
    #[arg(long, env = "COURSEMART_CURRENCY", default_value = "usd")]
    currency: String,

    /// Webhook signing secret. A throwaway one is generated when omitted.
    #[arg(long, env = "COURSEMART_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,

    /// Talk to Stripe instead of the simulated gateway
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    stripe_secret_key: Option<String>,
}

fn build_runner<S>(store: S, cli: &Cli, config: &MarketplaceConfig) -> Result<CommandRunner>
where
    S: MarketplaceStore + 'static,
{
    let simulated = SimulatedGateway::new();
    let gateway: PaymentGatewayRef = match &cli.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(key.clone())?),
        None => Arc::new(simulated.clone()),
    };
    let simulated = cli.stripe_secret_key.is_none().then_some(simulated);
    let marketplace = Marketplace::new(store, gateway, config);
    Ok(CommandRunner::new(
        marketplace,
        simulated,
        config.webhook_secret.clone(),
    ))
}

/// Use persistent storage (RocksDB)
#[cfg(feature = "storage-rocksdb")]
fn open_persistent(db_path: &Path, cli: &Cli, config: &MarketplaceConfig) -> Result<CommandRunner> {
    build_runner(RocksDBStore::open(db_path)?, cli, config)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(_db_path: &Path, cli: &Cli, config: &MarketplaceConfig) -> Result<CommandRunner> {
    eprintln!(
        "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
    );
    build_runner(InMemoryStore::new(), cli, config)
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    let webhook_secret = cli.webhook_secret.clone().unwrap_or_else(|| {
        debug!("no webhook secret given, generating one for this run");
        format!("whsec_{}", Uuid::new_v4().simple())
    });
    let config = MarketplaceConfig {
        platform_fee_rate: cli.platform_fee_rate,
        currency: cli.currency.clone(),
        webhook_secret: Some(webhook_secret),
        ..Default::default()
    }
    .validate()?;

    let mut runner = match &cli.db_path {
        Some(db_path) => open_persistent(db_path, &cli, &config)?,
        None => build_runner(InMemoryStore::new(), &cli, &config)?,
    };

    // Replay commands
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for record in reader.commands() {
        match record {
            Ok(record) => {
                if let Err(e) = runner.apply(record).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Output final state
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    let marketplace = runner.marketplace();
    match cli.report {
        Report::Enrollments => {
            writer.write_enrollments(marketplace.enrollments().enrollments().await?)?
        }
        Report::Courses => writer.write_courses(marketplace.courses().courses().await?)?,
        Report::Revenue => writer.write_revenue(&runner.revenue().await?)?,
    }

    Ok(())
}
