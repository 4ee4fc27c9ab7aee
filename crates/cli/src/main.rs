//! Order Edit CLI - operator front end for the order edit engine
//! Connect, load an order, edit it (optionally pausing before commit), inspect the audit trail

mod display;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use order_edit_core::application::{commit_gate, EditSettings, OrderEditService};
use order_edit_core::domain::{EditRequest, LineEdit, OrderId};
use order_edit_core::port::id_provider::UuidProvider;
use order_edit_core::port::time_provider::SystemTimeProvider;
use order_edit_core::port::Session;
use order_edit_core::AppError;
use order_edit_infra_sqlite::{
    run_migrations, seed_demo_order, SqliteSessionFactory, SqliteSessionOptions,
};
use settings::{Overrides, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "order-edit")]
#[command(about = "Transactional order edits with audit logging", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory relative database paths are resolved against
    #[arg(long, global = true)]
    server: Option<String>,

    /// Database file or sqlite: URL
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Isolation level (e.g. "READ COMMITTED", serializable)
    #[arg(short, long, global = true)]
    isolation: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an order header and its lines
    Fetch {
        #[arg(value_parser = parse_order_id)]
        order_id: OrderId,
    },

    /// Update the address and line quantities of an order in one transaction
    Edit {
        #[arg(value_parser = parse_order_id)]
        order_id: OrderId,

        /// New delivery address (always written, even when unchanged)
        #[arg(short, long)]
        address: String,

        /// New quantity for a product, as PRODUCT=QTY (repeatable)
        #[arg(short, long = "line", value_name = "PRODUCT=QTY")]
        lines: Vec<LineEdit>,

        /// Hold the transaction open before commit until Enter is pressed
        #[arg(long)]
        pause: bool,
    },

    /// List edit attempts recorded in the audit log
    Audit {
        #[arg(value_parser = parse_order_id)]
        order_id: OrderId,
    },

    /// Create the schema (demo and test databases)
    Bootstrap {
        /// Also reset demo order 42
        #[arg(long)]
        seed: bool,
    },
}

fn parse_order_id(s: &str) -> std::result::Result<OrderId, String> {
    let id: i64 = s.parse().map_err(|_| format!("not a number: {}", s))?;
    OrderId::new(id).map_err(|e| e.to_string())
}

fn init_logging() {
    let log_format =
        std::env::var("ORDER_EDIT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("order_edit=info"));

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .apply(Overrides {
            server: cli.server,
            database: cli.database,
            username: cli.username,
            password: cli.password,
            isolation_level: cli.isolation,
        });

    let level = settings
        .isolation_level()
        .context("Invalid isolation level")?;
    let credentials = settings.credentials();

    info!(
        version = order_edit_core::VERSION,
        database = %credentials.database,
        isolation = %level,
        "order-edit starting"
    );

    if let Commands::Bootstrap { seed } = cli.command {
        return bootstrap(&settings, seed).await;
    }

    let factory = SqliteSessionFactory::new(SqliteSessionOptions {
        busy_timeout: settings.busy_timeout(),
        ..Default::default()
    });
    let service = OrderEditService::new(Arc::new(UuidProvider), Arc::new(SystemTimeProvider))
        .with_settings(EditSettings {
            reference_prefix: settings.engine.reference_prefix.clone(),
        });

    let mut session = service
        .connect(&factory, &credentials, level)
        .await
        .context("Failed to open session")?;

    let result = run(&service, session.as_mut(), cli.command).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session");
    }

    result
}

async fn run(service: &OrderEditService, session: &mut dyn Session, command: Commands) -> Result<()> {
    match command {
        Commands::Fetch { order_id } => {
            let order = service.fetch_order(session, order_id).await?;
            display::print_order(&order);
        }

        Commands::Edit {
            order_id,
            address,
            lines,
            pause,
        } => {
            let mut request = EditRequest::new(order_id, address);
            for line in lines {
                request.set_quantity(line.product_id, line.quantity);
            }

            if request.is_blank() {
                println!(
                    "{}",
                    "⚠ No address and no line changes given; the address will be cleared".yellow()
                );
            }

            let result = if pause {
                edit_with_pause(service, session, &request, BufReader::new(tokio::io::stdin())).await
            } else {
                service.edit_order(session, &request, None).await
            };

            match result {
                Ok(outcome) => display::print_outcome(&outcome),
                Err(e @ AppError::AuditLog { .. }) => {
                    println!(
                        "{}",
                        "⚠ Order changes are committed but the audit log is incomplete".yellow()
                    );
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Audit { order_id } => {
            let trails = service.audit_trail(session, order_id).await?;
            println!(
                "{}",
                format!("Audit trail for order {}", order_id).cyan().bold()
            );
            display::print_trails(&trails);
        }

        Commands::Bootstrap { .. } => unreachable!("bootstrap runs without a session"),
    }

    Ok(())
}

/// Run the edit, stopping before commit until the operator presses Enter
///
/// End of input (non-interactive stdin) or a read error abandons the pause,
/// which rolls the edit back.
async fn edit_with_pause<R>(
    service: &OrderEditService,
    session: &mut dyn Session,
    request: &EditRequest,
    input: R,
) -> order_edit_core::Result<order_edit_core::application::EditOutcome>
where
    R: AsyncBufRead + Unpin,
{
    let (gate, mut handle) = commit_gate();

    let edit = service.edit_order(session, request, Some(gate));
    let confirm = async move {
        if !handle.paused().await {
            return;
        }

        println!(
            "{}",
            "Transaction is open and paused before commit. Press Enter to commit...".cyan()
        );

        let mut input = input;
        let mut line = String::new();
        match input.read_line(&mut line).await {
            Ok(0) => warn!("Confirmation input closed; rolling back"),
            Ok(_) => handle.resume(),
            Err(e) => warn!(error = %e, "Failed to read confirmation; rolling back"),
        }
    };

    let (result, ()) = tokio::join!(edit, confirm);
    result
}

async fn bootstrap(settings: &Settings, seed: bool) -> Result<()> {
    let factory = SqliteSessionFactory::new(SqliteSessionOptions {
        busy_timeout: settings.busy_timeout(),
        create_if_missing: true,
        ..Default::default()
    });

    let credentials = settings.credentials();
    let mut conn = factory
        .open_connection(&credentials)
        .await
        .context("Failed to open database")?;

    run_migrations(&mut conn)
        .await
        .context("Migration failed")?;
    println!("{}", "✓ Schema ready".green().bold());

    if seed {
        seed_demo_order(&mut conn)
            .await
            .context("Seeding demo order failed")?;
        println!("{}", "✓ Demo order 42 seeded".green().bold());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_edit_core::domain::OrderHeader;
    use order_edit_core::port::session::mocks::{MemoryDb, MemorySession};

    #[test]
    fn test_parse_edit_command() {
        let cli = Cli::try_parse_from([
            "order-edit",
            "edit",
            "42",
            "--address",
            "B",
            "--line",
            "1=9",
            "-l",
            "2=3",
            "--pause",
            "--isolation",
            "serializable",
        ])
        .unwrap();

        assert_eq!(cli.isolation.as_deref(), Some("serializable"));
        match cli.command {
            Commands::Edit {
                order_id,
                address,
                lines,
                pause,
            } => {
                assert_eq!(order_id.get(), 42);
                assert_eq!(address, "B");
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].product_id, 1);
                assert_eq!(lines[0].quantity, 9);
                assert!(pause);
            }
            _ => panic!("expected edit command"),
        }
    }

    #[test]
    fn test_rejects_non_positive_order_id() {
        assert!(Cli::try_parse_from(["order-edit", "fetch", "0"]).is_err());
        assert!(Cli::try_parse_from(["order-edit", "fetch", "abc"]).is_err());
    }

    #[test]
    fn test_rejects_malformed_line() {
        let result = Cli::try_parse_from([
            "order-edit",
            "edit",
            "42",
            "--address",
            "B",
            "--line",
            "1:9",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_edit_requires_address() {
        assert!(Cli::try_parse_from(["order-edit", "edit", "42", "--line", "1=9"]).is_err());
    }

    fn demo_session() -> (
        std::sync::Arc<std::sync::Mutex<MemoryDb>>,
        MemorySession,
    ) {
        let id = OrderId::new(42).unwrap();
        let db = MemoryDb::default()
            .with_order(
                OrderHeader {
                    order_id: id,
                    customer_name: "Ana".to_string(),
                    address: "A".to_string(),
                },
                Vec::new(),
            )
            .shared();
        let session = MemorySession::new(db.clone());
        (db, session)
    }

    fn demo_service() -> OrderEditService {
        OrderEditService::new(Arc::new(UuidProvider), Arc::new(SystemTimeProvider))
    }

    fn address(db: &std::sync::Arc<std::sync::Mutex<MemoryDb>>) -> String {
        let id = OrderId::new(42).unwrap();
        db.lock().unwrap().headers[&id].address.clone()
    }

    #[tokio::test]
    async fn test_pause_commits_on_enter() {
        let (db, mut session) = demo_session();
        let request = EditRequest::new(OrderId::new(42).unwrap(), "B");

        let outcome =
            edit_with_pause(&demo_service(), &mut session, &request, &b"\n"[..]).await;

        assert!(outcome.is_ok());
        assert_eq!(address(&db), "B");
    }

    #[tokio::test]
    async fn test_pause_rolls_back_on_closed_input() {
        let (db, mut session) = demo_session();
        let request = EditRequest::new(OrderId::new(42).unwrap(), "B");

        let err = edit_with_pause(&demo_service(), &mut session, &request, &b""[..])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Transaction { .. }));
        assert_eq!(address(&db), "A");
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_bootstrap_with_seed() {
        let cli =
            Cli::try_parse_from(["order-edit", "bootstrap", "--seed", "-d", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.database.as_deref(), Some("/tmp/x.db"));
        assert!(matches!(cli.command, Commands::Bootstrap { seed: true }));
    }
}
