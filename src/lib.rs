use tracing::{error, info, warn};

pub mod backfill;
pub mod config;
pub mod constraints;
pub mod db;
pub mod error;
pub mod introspect;
pub mod logging;
pub mod owner;
pub mod runner;
pub mod schema;
pub mod time;
pub mod verify;

pub use config::Config;
pub use error::MigrationError;
pub use runner::{run_ownership_migration, MigrationReport, StepOutcome};

/// Outcome of the boot-time migration attempt. None of the variants abort
/// the process; the boot sequence decides how much failure it tolerates.
#[derive(Debug)]
pub enum StartupMigration {
    Completed(MigrationReport),
    /// No store configured; the app may serve from its in-memory fallback.
    SkippedUnconfigured,
    Failed,
}

impl StartupMigration {
    pub fn succeeded(&self) -> bool {
        matches!(self, StartupMigration::Completed(_))
    }
}

/// Run the ownership migration as part of application boot. Every outcome is
/// logged distinguishably; the caller only branches on the returned value.
pub async fn migrate_at_startup(config: &Config) -> StartupMigration {
    let pool = match db::connect(config).await {
        Ok(Some(pool)) => pool,
        Ok(None) => {
            warn!(
                target: "pennybook",
                event = "startup_migration_unconfigured",
                env = config::DB_ENV
            );
            return StartupMigration::SkippedUnconfigured;
        }
        Err(err) => {
            error!(
                target: "pennybook",
                event = "startup_migration_connect_failed",
                error = %format!("{err:#}")
            );
            return StartupMigration::Failed;
        }
    };

    match runner::run_ownership_migration(&pool).await {
        Ok(report) => {
            info!(
                target: "pennybook",
                event = "startup_migration_complete",
                applied = report.applied(),
                skipped = report.skipped()
            );
            StartupMigration::Completed(report)
        }
        Err(err) => {
            error!(
                target: "pennybook",
                event = "startup_migration_failed",
                error = %err
            );
            StartupMigration::Failed
        }
    }
}
