//! Operational commands for the Meridian import service.
//!
//! `meridian-cli cleanup` runs the same reclamation sweep the API server
//! schedules hourly, for cron jobs and one-off reclaims. `meridian-cli
//! seed` provisions the demo workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use meridian_db::DbPool;
use meridian_engine::cleanup::{CleanupOptions, CleanupSweep};
use meridian_engine::seed;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "meridian-cli")]
#[command(about = "Operational commands for the Meridian import service")]
#[command(version)]
struct Cli {
    /// Spool root directory (falls back to the SPOOL_DIR env var)
    #[arg(long)]
    spool_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reclaim abandoned sessions, expired spool directories, and aged
    /// quarantine rows
    Cleanup {
        /// Age in hours before an idle session becomes reclaimable
        #[arg(long, default_value = "24")]
        hours: i64,

        /// Heartbeat silence in minutes before an aged session counts as dead
        #[arg(long, default_value = "30")]
        heartbeat_minutes: i64,

        /// Days quarantined failed rows are kept
        #[arg(long, default_value = "30")]
        retention_days: i64,

        /// Report what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Create the demo workspace: team members, companies, custom fields
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = meridian_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Cleanup {
            hours,
            heartbeat_minutes,
            retention_days,
            dry_run,
        } => {
            let options = CleanupOptions {
                max_age: chrono::Duration::hours(hours),
                heartbeat_stale: chrono::Duration::minutes(heartbeat_minutes),
                failed_row_retention: chrono::Duration::days(retention_days),
                dry_run,
            };
            cleanup(pool, resolve_spool_dir(cli.spool_dir), options).await
        }
        Commands::Seed => seed_demo(pool).await,
    }
}

/// Spool root: `--spool-dir` beats `SPOOL_DIR`, which beats the dev
/// default the API server also uses.
fn resolve_spool_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        std::env::var("SPOOL_DIR")
            .unwrap_or_else(|_| "./data/spool".into())
            .into()
    })
}

async fn cleanup(pool: DbPool, spool_dir: PathBuf, options: CleanupOptions) -> Result<()> {
    info!(
        spool_dir = %spool_dir.display(),
        max_age_hours = options.max_age.num_hours(),
        dry_run = options.dry_run,
        "Running cleanup sweep"
    );

    let sweep = CleanupSweep::new(pool, &spool_dir);
    let report = sweep.run(&options).await?;

    let verb = if options.dry_run { "Would reclaim" } else { "Reclaimed" };
    println!("\nCleanup sweep {}", if options.dry_run { "(dry run)" } else { "complete" });
    println!("==============================");
    println!("{verb}:");
    println!("  Abandoned sessions failed: {}", report.sessions_failed);
    println!("  Spool directories removed: {}", report.spools_removed);
    println!("  Orphaned spools removed:   {}", report.orphan_spools_removed);
    println!("  Quarantined rows pruned:   {}", report.failed_rows_pruned);

    Ok(())
}

async fn seed_demo(pool: DbPool) -> Result<()> {
    meridian_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let tenant = seed::seed_demo_data(&pool).await?;

    println!("\nDemo workspace ready");
    println!("====================");
    println!("Tenant id:   {}", tenant.id);
    println!("Tenant slug: {}", tenant.slug);
    println!("\nUpload a spreadsheet with:");
    println!(
        "  curl -X POST http://localhost:3000/api/v1/import/sessions \\\n       \
         -H 'X-Tenant-Id: {}' \\\n       \
         -F entity_type=person -F file=@people.csv",
        tenant.id
    );

    Ok(())
}
