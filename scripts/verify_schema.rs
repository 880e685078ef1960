#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pennybook::{logging, verify};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

#[derive(Parser)]
#[command(name = "verify_schema", about = "Audit the ownership schema")]
struct Args {
    #[arg(long)]
    db: PathBuf,
    /// Emit findings as JSON instead of the human-readable report
    #[arg(long)]
    json: bool,
    #[arg(long = "readonly-only")]
    readonly_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let pool = open_pool(&args.db, args.readonly_only).await?;

    let findings = verify::audit_ownership_schema(&pool)
        .await
        .context("audit ownership schema")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    } else {
        print!("{}", verify::render_report(&findings));
    }

    let missing = verify::discrepancies(&findings).len();
    if missing == 0 {
        return Ok(());
    }
    Err(anyhow!("{missing} expected schema object(s) missing"))
}

async fn open_pool(path: &Path, ro_only: bool) -> Result<SqlitePool> {
    if !path.exists() {
        return Err(anyhow!(
            "database not found at {} (run migrations first)",
            path.display()
        ));
    }
    let abs = path.canonicalize().context("canonicalize db path")?;
    let ro_opts = SqliteConnectOptions::new().filename(&abs).read_only(true);
    match SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(ro_opts)
        .await
    {
        Ok(pool) => Ok(pool),
        Err(e) if !ro_only => {
            eprintln!("read-only connection failed, retrying with rw: {e}");
            let rw_opts = SqliteConnectOptions::new().filename(&abs).read_only(false);
            Ok(SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(rw_opts)
                .await?)
        }
        Err(e) => Err(e.into()),
    }
}
