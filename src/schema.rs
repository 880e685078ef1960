use sqlx::SqlitePool;
use tracing::info;

use crate::error::MigrationError;

pub const USERS_TABLE: &str = "users";
pub const OWNER_COLUMN: &str = "user_id";
pub const OWNER_COLUMN_TYPE: &str = "INTEGER";

pub const CREATE_USERS_SQL: &str = "CREATE TABLE IF NOT EXISTS users (\
   id INTEGER PRIMARY KEY AUTOINCREMENT,\
   email TEXT NOT NULL UNIQUE,\
   password_hash TEXT NOT NULL,\
   notify_bill_reminders INTEGER NOT NULL DEFAULT 1,\
   notify_monthly_summary INTEGER NOT NULL DEFAULT 0,\
   created_at INTEGER NOT NULL\
 )";

#[derive(Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub decl: &'static str,
}

#[derive(Debug)]
pub struct BusinessTable {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

/// The business tables gaining an owner, in the fixed order the runner
/// processes them. Retrofitting a further table is an entry here, not a new
/// script.
pub const BUSINESS_TABLES: &[BusinessTable] = &[
    BusinessTable {
        name: "income",
        columns: &[
            ColumnDef { name: "id", decl: "TEXT PRIMARY KEY" },
            ColumnDef { name: "source", decl: "TEXT NOT NULL" },
            ColumnDef { name: "amount_cents", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "received_on", decl: "TEXT NOT NULL" },
            ColumnDef { name: "notes", decl: "TEXT" },
            ColumnDef { name: "created_at", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "updated_at", decl: "INTEGER NOT NULL" },
        ],
    },
    BusinessTable {
        name: "expenses",
        columns: &[
            ColumnDef { name: "id", decl: "TEXT PRIMARY KEY" },
            ColumnDef { name: "category", decl: "TEXT NOT NULL" },
            ColumnDef { name: "amount_cents", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "spent_on", decl: "TEXT NOT NULL" },
            ColumnDef { name: "notes", decl: "TEXT" },
            ColumnDef { name: "created_at", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "updated_at", decl: "INTEGER NOT NULL" },
        ],
    },
    BusinessTable {
        name: "assets",
        columns: &[
            ColumnDef { name: "id", decl: "TEXT PRIMARY KEY" },
            ColumnDef { name: "name", decl: "TEXT NOT NULL" },
            ColumnDef { name: "value_cents", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "valued_on", decl: "TEXT" },
            ColumnDef { name: "notes", decl: "TEXT" },
            ColumnDef { name: "created_at", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "updated_at", decl: "INTEGER NOT NULL" },
        ],
    },
    BusinessTable {
        name: "bills",
        columns: &[
            ColumnDef { name: "id", decl: "TEXT PRIMARY KEY" },
            ColumnDef { name: "payee", decl: "TEXT NOT NULL" },
            ColumnDef { name: "amount_cents", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "due_on", decl: "TEXT NOT NULL" },
            ColumnDef { name: "paid", decl: "INTEGER NOT NULL DEFAULT 0" },
            ColumnDef { name: "created_at", decl: "INTEGER NOT NULL" },
            ColumnDef { name: "updated_at", decl: "INTEGER NOT NULL" },
        ],
    },
];

pub fn business_table(name: &str) -> Option<&'static BusinessTable> {
    BUSINESS_TABLES.iter().find(|t| t.name == name)
}

/// Declaration the owner column passes through while being retrofitted.
#[derive(Debug, Clone, Copy)]
pub enum OwnerShape<'a> {
    Nullable,
    Required,
    RequiredWithFk {
        referenced_table: &'a str,
        referenced_column: &'a str,
    },
}

impl OwnerShape<'_> {
    pub fn decl(&self) -> String {
        match self {
            OwnerShape::Nullable => OWNER_COLUMN_TYPE.to_string(),
            OwnerShape::Required => format!("{OWNER_COLUMN_TYPE} NOT NULL"),
            OwnerShape::RequiredWithFk {
                referenced_table,
                referenced_column,
            } => format!(
                "{OWNER_COLUMN_TYPE} NOT NULL REFERENCES {referenced_table}({referenced_column})"
            ),
        }
    }
}

/// Legacy single-tenant shape, without the owner column.
pub fn baseline_create_sql(table: &BusinessTable) -> String {
    let cols: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.decl))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        table.name,
        cols.join(",\n  ")
    )
}

/// Full shape for a shadow rebuild, owner column included.
pub fn rebuild_create_sql(table: &BusinessTable, target_name: &str, shape: &OwnerShape<'_>) -> String {
    let mut cols: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.decl))
        .collect();
    cols.push(format!("{} {}", OWNER_COLUMN, shape.decl()));
    format!("CREATE TABLE {} (\n  {}\n)", target_name, cols.join(",\n  "))
}

/// Comma-separated column list of a retrofitted table, owner column last.
/// Used to copy rows into a shadow table.
pub fn owned_column_list(table: &BusinessTable) -> String {
    let mut names: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
    names.push(OWNER_COLUMN);
    names.join(", ")
}

/// Create the legacy business tables if this is a fresh store. A veteran
/// store already has them and every statement is a no-op.
pub async fn ensure_baseline_schema(pool: &SqlitePool) -> Result<(), MigrationError> {
    for table in BUSINESS_TABLES {
        sqlx::query(&baseline_create_sql(table))
            .execute(pool)
            .await?;
    }
    info!(target: "pennybook", event = "baseline_schema_ensured");
    Ok(())
}

/// Guarded index shims, recreated after rebuilds drop them.
pub async fn ensure_owner_indexes(pool: &SqlitePool) -> Result<(), MigrationError> {
    for table in BUSINESS_TABLES {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {t}_{c}_idx ON {t}({c})",
            t = table.name,
            c = OWNER_COLUMN
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}
