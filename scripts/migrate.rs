#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pennybook::{db, logging, runner};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Parser)]
#[command(name = "migrate", about = "Pennybook ownership migration helper")]
struct Cli {
    /// Optional explicit DB path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Print pending steps without executing for up
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show every retrofit step and whether its guard reports it applied
    #[command(about, long_about = None)]
    Status,
    /// Apply pending retrofit steps
    #[command(about, long_about = None)]
    Up,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or(default_db_path()?);

    match cli.cmd {
        Cmd::Status => status(&db_path).await,
        Cmd::Up => up(&db_path, cli.dry_run).await,
    }
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().unwrap_or(std::env::current_dir()?);
    Ok(base.join("com.pennybook.app").join("pennybook.sqlite3"))
}

async fn status(db: &Path) -> Result<()> {
    println!("DB: {}", db.display());
    let plan = runner::ownership_plan();
    if !db.exists() {
        for step in &plan {
            println!("{:<28}  pending", step.id);
        }
        return Ok(());
    }
    let pool = db::open_file_pool(db, false).await?;
    for step in &plan {
        let state = if step
            .action
            .satisfied(&pool)
            .await
            .with_context(|| format!("evaluate guard for {}", step.id))?
        {
            "applied"
        } else {
            "pending"
        };
        println!("{:<28}  {}", step.id, state);
    }
    Ok(())
}

async fn up(db: &Path, dry: bool) -> Result<()> {
    let plan = runner::ownership_plan();

    if dry {
        if !db.exists() {
            println!("Plan (up):");
            for step in &plan {
                println!("  {}", step.id);
            }
            return Ok(());
        }
        let pool = db::open_file_pool(db, false).await?;
        let mut pending = Vec::new();
        for step in &plan {
            if !step.action.satisfied(&pool).await? {
                pending.push(step.id.as_str());
            }
        }
        if pending.is_empty() {
            println!("Nothing to apply.");
        } else {
            println!("Plan (up):");
            for id in pending {
                println!("  {id}");
            }
        }
        return Ok(());
    }

    let pool = db::open_file_pool(db, true).await?;
    let start = Instant::now();
    log::info!("ownership migration start");
    match runner::run_ownership_migration(&pool).await {
        Ok(report) => {
            log::info!("ownership migration success in {:?}", start.elapsed());
            println!(
                "Applied {} step(s), skipped {}.",
                report.applied(),
                report.skipped()
            );
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                target: "pennybook",
                event = "migration_failed",
                error = %err
            );
            Err(err).context("ownership migration")
        }
    }
}
