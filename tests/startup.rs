#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use pennybook::{migrate_at_startup, Config, StartupMigration};
use tempfile::tempdir;

#[tokio::test]
async fn unconfigured_store_skips_migration() {
    let outcome = migrate_at_startup(&Config::default()).await;
    assert!(matches!(outcome, StartupMigration::SkippedUnconfigured));
    assert!(!outcome.succeeded());
}

#[tokio::test]
async fn configured_store_migrates_then_reruns_cleanly() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("boot.sqlite");
    let config = Config::with_database_url(db.to_str().unwrap());

    let outcome = migrate_at_startup(&config).await;
    assert!(outcome.succeeded());

    match migrate_at_startup(&config).await {
        StartupMigration::Completed(report) => {
            assert_eq!(report.applied(), 0, "second boot must not mutate anything");
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    Ok(())
}
