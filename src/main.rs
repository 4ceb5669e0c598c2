use anyhow::{anyhow, Context, Result};
use campus_gym::api::{create_routes, AppState};
use campus_gym::auth::Role;
use campus_gym::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder, DocumentStoreConfig};
use campus_gym::documents::{DocumentStore, Outbox, OutboxRelay};
use campus_gym::models::MonthBounds;
use campus_gym::scheduler::BackgroundJobs;
use campus_gym::services::{IdentityService, StatsService};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "campus-gym")]
#[command(about = "University gym management service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and background jobs (default)
    Serve,

    /// Apply pending database migrations
    Migrate,

    /// Load the exercise catalog and default spaces
    SeedExercises,

    /// Create a local administrator account
    CreateAdmin {
        #[arg(long)]
        username: String,

        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,

        /// Defaults to <username>@<INSTITUTIONAL_EMAIL_DOMAIN>
        #[arg(long)]
        email: Option<String>,
    },

    /// Recompute monthly statistics for every account
    RecalcStats {
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        month: Option<u32>,
    },

    /// Check the relational, institutional and document stores
    CheckConnections,

    /// Deliver pending outbox entries to the document store and exit
    RelayOutbox {
        /// Move parked entries back to pending first
        #[arg(long)]
        requeue_failed: bool,

        /// Delete delivered entries older than OUTBOX_RETENTION_DAYS afterwards
        #[arg(long)]
        purge: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let cli = Cli::parse();
    let database = DatabaseConfig::from_env()?;
    let documents = DocumentStoreConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, database, documents).await,
        Commands::Migrate => {
            let db = database.create_pool().await?;
            run_migrations(&db).await?;
            info!("migrations applied");
            Ok(())
        }
        Commands::SeedExercises => {
            let db = database.create_pool().await?;
            DatabaseSeeder::new(db).seed_all().await
        }
        Commands::CreateAdmin {
            username,
            password,
            email,
        } => {
            let state = build_state(&config, &database, &documents).await?;
            let email =
                email.unwrap_or_else(|| format!("{}@{}", username.trim(), config.institutional_email_domain));
            let account = state
                .auth
                .create_local_account(&username, &email, &password, Role::Admin)
                .await?;
            println!("Created admin {} ({})", account.username, account.id);
            Ok(())
        }
        Commands::RecalcStats { year, month } => {
            let bounds = MonthBounds::from_parts(year, month).map_err(|e| anyhow!(e))?;
            let db = database.create_pool().await?;
            let report = StatsService::new(db).recompute_month_for_all(bounds).await?;
            println!(
                "Recalculated {}-{:02}: {} users, {} trainers",
                report.year, report.month, report.users, report.trainers
            );
            Ok(())
        }
        Commands::CheckConnections => check_connections(&database, &documents).await,
        Commands::RelayOutbox { requeue_failed, purge } => {
            let db = database.create_pool().await?;
            let store = DocumentStore::connect(&documents).await?;
            if !store.is_enabled() {
                return Err(anyhow!("document store is disabled; set DOCUMENT_STORE_URL"));
            }
            let relay = OutboxRelay::new(db, store, Outbox::new(), &documents);

            if requeue_failed {
                let requeued = relay.requeue_failed().await?;
                println!("Requeued {} parked entries", requeued);
            }
            let report = relay.drain_all().await?;
            println!(
                "Delivered {}, retried {}, parked {}",
                report.delivered, report.retried, report.parked
            );
            if purge {
                let purged = relay.purge_delivered().await?;
                println!("Purged {} delivered entries", purged);
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, database: DatabaseConfig, documents: DocumentStoreConfig) -> Result<()> {
    let state = build_state(&config, &database, &documents).await?;
    run_migrations(&state.db).await.context("failed to apply migrations")?;

    let listener_task = state.relay.spawn_listener();
    let jobs = BackgroundJobs::start(
        state.relay.clone(),
        state.stats.clone(),
        documents.poll_interval,
        &config.stats_reconcile_cron,
    )
    .await?;

    let app = create_routes(state);
    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Campus gym server starting on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    listener_task.abort();
    jobs.shutdown().await?;
    Ok(())
}

async fn build_state(
    config: &AppConfig,
    database: &DatabaseConfig,
    documents: &DocumentStoreConfig,
) -> Result<AppState> {
    let db = database.create_pool().await.context("failed to connect to DATABASE_URL")?;
    let institutional = database
        .create_institutional_pool()
        .await
        .context("failed to connect to INSTITUTIONAL_DATABASE_URL")?;

    // Writes are queued in the outbox, so an unreachable store only delays
    // delivery.
    let store = match DocumentStore::connect(documents).await {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "document store unavailable, mirror delivery paused");
            DocumentStore::Disabled
        }
    };

    let state = AppState::new(
        db,
        institutional,
        &database.institutional_schema,
        store,
        config,
        documents,
    )?;
    Ok(state)
}

async fn check_connections(database: &DatabaseConfig, documents: &DocumentStoreConfig) -> Result<()> {
    let mut healthy = true;

    match database.create_pool().await {
        Ok(db) => {
            report("database", ping(&db).await.map_err(|e| e.to_string()), &mut healthy);
        }
        Err(e) => report("database", Err(e.to_string()), &mut healthy),
    }

    match database.create_institutional_pool().await {
        Ok(pool) => match IdentityService::new(pool, &database.institutional_schema) {
            Ok(identity) => report(
                "institutional",
                identity.ping().await.map_err(|e| e.to_string()),
                &mut healthy,
            ),
            Err(e) => report("institutional", Err(e.to_string()), &mut healthy),
        },
        Err(e) => report("institutional", Err(e.to_string()), &mut healthy),
    }

    match DocumentStore::connect(documents).await {
        Ok(store) if !store.is_enabled() => println!("document store: disabled"),
        Ok(store) => report(
            &format!("document store ({})", store.backend_name()),
            store.ping().await.map_err(|e| e.to_string()),
            &mut healthy,
        ),
        Err(e) => report("document store", Err(e.to_string()), &mut healthy),
    }

    if healthy {
        Ok(())
    } else {
        Err(anyhow!("one or more connections failed"))
    }
}

async fn ping(db: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(db).await.map(|_| ())
}

fn report(name: &str, result: Result<(), String>, healthy: &mut bool) {
    match result {
        Ok(()) => println!("{}: ok", name),
        Err(e) => {
            error!(component = name, error = %e, "connection check failed");
            println!("{}: FAILED ({})", name, e);
            *healthy = false;
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
