//! The migration runner: a declarative, ordered list of guarded steps.
//!
//! There is no applied-migrations ledger. Each step's guard re-derives
//! "already applied" from catalog introspection alone, which stays correct
//! whatever historical path produced the current schema, and makes a rerun
//! after a mid-sequence crash resume cleanly.

use sqlx::SqlitePool;
use tracing::{error, info};

use crate::backfill;
use crate::constraints;
use crate::error::{classify_store_error, MigrationError};
use crate::introspect;
use crate::owner;
use crate::schema::{
    self, BusinessTable, BUSINESS_TABLES, CREATE_USERS_SQL, OWNER_COLUMN, OWNER_COLUMN_TYPE,
    USERS_TABLE,
};

#[derive(Debug, Clone, Copy)]
pub enum StepAction {
    CreateOwnerTable,
    SeedDefaultOwner,
    AddOwnerColumn { table: &'static BusinessTable },
    BackfillOwner { table: &'static BusinessTable },
    RequireOwner { table: &'static BusinessTable },
    LinkOwner { table: &'static BusinessTable },
}

#[derive(Debug)]
pub struct MigrationStep {
    pub id: String,
    pub description: String,
    pub action: StepAction,
}

impl MigrationStep {
    fn new(seq: usize, name: String, description: String, action: StepAction) -> Self {
        MigrationStep {
            id: format!("{seq:04}_{name}"),
            description,
            action,
        }
    }
}

impl StepAction {
    /// Guard predicate: is this step's effect already present?
    ///
    /// Guards are tolerant of a store that has not reached the step's
    /// prerequisites yet (missing table, missing column): that reads as
    /// "not satisfied", never as an error. An irreconcilable state, such as
    /// an owner column with the wrong declared type, is a `SchemaMismatch`.
    pub async fn satisfied(&self, pool: &SqlitePool) -> Result<bool, MigrationError> {
        match self {
            StepAction::CreateOwnerTable => introspect::table_exists(pool, USERS_TABLE).await,
            StepAction::SeedDefaultOwner => {
                if !introspect::table_exists(pool, USERS_TABLE).await? {
                    return Ok(false);
                }
                Ok(owner::default_owner_id(pool).await?.is_some())
            }
            StepAction::AddOwnerColumn { table } => {
                match introspect::column_decl_type(pool, table.name, OWNER_COLUMN).await? {
                    None => Ok(false),
                    Some(decl) if decl.eq_ignore_ascii_case(OWNER_COLUMN_TYPE) => Ok(true),
                    Some(decl) => Err(MigrationError::SchemaMismatch {
                        table: table.name.to_string(),
                        column: OWNER_COLUMN.to_string(),
                        detail: format!("declared type is {decl}, expected {OWNER_COLUMN_TYPE}"),
                    }),
                }
            }
            StepAction::BackfillOwner { table } => {
                if !introspect::column_exists(pool, table.name, OWNER_COLUMN).await? {
                    return Ok(false);
                }
                Ok(backfill::remaining_unowned(pool, table).await? == 0)
            }
            StepAction::RequireOwner { table } => {
                introspect::column_is_not_null(pool, table.name, OWNER_COLUMN).await
            }
            StepAction::LinkOwner { table } => {
                introspect::foreign_key_exists(pool, table.name, OWNER_COLUMN, USERS_TABLE).await
            }
        }
    }

    pub async fn apply(&self, pool: &SqlitePool) -> Result<(), MigrationError> {
        match self {
            StepAction::CreateOwnerTable => {
                sqlx::query(CREATE_USERS_SQL)
                    .execute(pool)
                    .await
                    .map_err(|e| classify_store_error(e, USERS_TABLE))?;
                Ok(())
            }
            StepAction::SeedDefaultOwner => {
                owner::ensure_default_owner(
                    pool,
                    owner::DEFAULT_OWNER_EMAIL,
                    &owner::seeded_credential(),
                )
                .await?;
                Ok(())
            }
            StepAction::AddOwnerColumn { table } => {
                let sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table.name, OWNER_COLUMN, OWNER_COLUMN_TYPE
                );
                sqlx::query(&sql)
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        classify_store_error(e, &format!("{}.{}", table.name, OWNER_COLUMN))
                    })?;
                Ok(())
            }
            StepAction::BackfillOwner { table } => {
                let owner_id = owner::default_owner_id(pool).await?.ok_or_else(|| {
                    MigrationError::DataIntegrity {
                        table: USERS_TABLE.to_string(),
                        detail: "default owner missing before backfill".to_string(),
                    }
                })?;
                backfill::backfill_owner(pool, table, owner_id).await?;
                Ok(())
            }
            StepAction::RequireOwner { table } => {
                constraints::enforce_not_null(pool, table).await?;
                Ok(())
            }
            StepAction::LinkOwner { table } => {
                constraints::add_foreign_key(pool, table, USERS_TABLE, "id").await?;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped,
    Applied,
    /// The guard said pending but a concurrent run applied the step between
    /// the check and our mutation; the provider's duplicate-object error was
    /// reclassified to success.
    RaceTolerated,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub outcomes: Vec<(String, StepOutcome)>,
}

impl MigrationReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, StepOutcome::Skipped))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Skipped))
            .count()
    }
}

/// The fixed retrofit order: owner table, default owner, then for each
/// business table in declared order: nullable column, backfill, NOT NULL,
/// foreign key. The declared table order also fixes lock order when two
/// runs race.
pub fn ownership_plan() -> Vec<MigrationStep> {
    let mut steps = vec![
        MigrationStep::new(
            1,
            "create_users".into(),
            "create the users table".into(),
            StepAction::CreateOwnerTable,
        ),
        MigrationStep::new(
            2,
            "seed_default_owner".into(),
            "upsert the default system owner".into(),
            StepAction::SeedDefaultOwner,
        ),
    ];
    let mut seq = steps.len() + 1;
    for table in BUSINESS_TABLES {
        steps.push(MigrationStep::new(
            seq,
            format!("{}_add_user_id", table.name),
            format!("add nullable {} to {}", OWNER_COLUMN, table.name),
            StepAction::AddOwnerColumn { table },
        ));
        steps.push(MigrationStep::new(
            seq + 1,
            format!("{}_backfill_user_id", table.name),
            format!("assign the default owner to unowned {} rows", table.name),
            StepAction::BackfillOwner { table },
        ));
        steps.push(MigrationStep::new(
            seq + 2,
            format!("{}_require_user_id", table.name),
            format!("make {}.{} NOT NULL", table.name, OWNER_COLUMN),
            StepAction::RequireOwner { table },
        ));
        steps.push(MigrationStep::new(
            seq + 3,
            format!("{}_link_user_id", table.name),
            format!("add the {}.{} foreign key", table.name, OWNER_COLUMN),
            StepAction::LinkOwner { table },
        ));
        seq += 4;
    }
    steps
}

/// Execute steps in order: evaluate guard, skip or apply, classify errors.
/// Aborts the remaining sequence on the first unrecoverable error; steps
/// already committed stay committed (there is no cross-step transaction).
pub async fn run_plan(
    pool: &SqlitePool,
    plan: &[MigrationStep],
) -> Result<MigrationReport, MigrationError> {
    let mut report = MigrationReport::default();
    for step in plan {
        if step.action.satisfied(pool).await? {
            info!(target: "pennybook", event = "step_skip", step = %step.id);
            report.outcomes.push((step.id.clone(), StepOutcome::Skipped));
            continue;
        }
        match step.action.apply(pool).await {
            Ok(()) => {
                info!(target: "pennybook", event = "step_applied", step = %step.id);
                report.outcomes.push((step.id.clone(), StepOutcome::Applied));
            }
            Err(MigrationError::AlreadyApplied { object }) => {
                info!(
                    target: "pennybook",
                    event = "step_race_tolerated",
                    step = %step.id,
                    object = %object
                );
                report
                    .outcomes
                    .push((step.id.clone(), StepOutcome::RaceTolerated));
            }
            Err(err) => {
                error!(
                    target: "pennybook",
                    event = "step_failed",
                    step = %step.id,
                    error = %err
                );
                return Err(err);
            }
        }
    }
    Ok(report)
}

/// The migration entry point: bootstrap the legacy baseline if this is a
/// fresh store, run the ownership plan, then recreate the guarded index
/// shims the rebuilds dropped.
pub async fn run_ownership_migration(pool: &SqlitePool) -> Result<MigrationReport, MigrationError> {
    schema::ensure_baseline_schema(pool).await?;
    let report = run_plan(pool, &ownership_plan()).await?;
    schema::ensure_owner_indexes(pool).await?;
    info!(
        target: "pennybook",
        event = "migration_complete",
        applied = report.applied(),
        skipped = report.skipped()
    );
    Ok(report)
}
