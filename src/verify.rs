//! Independent, read-only audit of the ownership schema. Discrepancies are
//! data for the caller; only a store failure is an error here.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::MigrationError;
use crate::introspect;
use crate::schema::{BUSINESS_TABLES, OWNER_COLUMN, USERS_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaCheck {
    TablePresent,
    ColumnPresent,
    NotNull,
    ForeignKey,
}

impl SchemaCheck {
    fn describe(&self) -> &'static str {
        match self {
            SchemaCheck::TablePresent => "table",
            SchemaCheck::ColumnPresent => "user_id column",
            SchemaCheck::NotNull => "user_id NOT NULL",
            SchemaCheck::ForeignKey => "user_id foreign key",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub table: String,
    pub check: SchemaCheck,
    pub expected: String,
    pub observed: String,
    pub satisfied: bool,
}

impl Finding {
    fn presence(table: &str, check: SchemaCheck, present: bool) -> Self {
        Finding {
            table: table.to_string(),
            check,
            expected: "present".to_string(),
            observed: if present { "present" } else { "missing" }.to_string(),
            satisfied: present,
        }
    }
}

/// One finding per expected attribute of the target schema.
pub async fn audit_ownership_schema(pool: &SqlitePool) -> Result<Vec<Finding>, MigrationError> {
    let mut findings = Vec::new();

    let users_present = introspect::table_exists(pool, USERS_TABLE).await?;
    findings.push(Finding::presence(
        USERS_TABLE,
        SchemaCheck::TablePresent,
        users_present,
    ));

    for table in BUSINESS_TABLES {
        let present = introspect::table_exists(pool, table.name).await?;
        findings.push(Finding::presence(
            table.name,
            SchemaCheck::TablePresent,
            present,
        ));

        let column = introspect::column_exists(pool, table.name, OWNER_COLUMN).await?;
        findings.push(Finding::presence(
            table.name,
            SchemaCheck::ColumnPresent,
            column,
        ));

        let not_null = introspect::column_is_not_null(pool, table.name, OWNER_COLUMN).await?;
        findings.push(Finding {
            table: table.name.to_string(),
            check: SchemaCheck::NotNull,
            expected: "NOT NULL".to_string(),
            observed: if not_null { "NOT NULL" } else { "nullable" }.to_string(),
            satisfied: not_null,
        });

        let fk = introspect::foreign_key_exists(pool, table.name, OWNER_COLUMN, USERS_TABLE).await?;
        findings.push(Finding {
            table: table.name.to_string(),
            check: SchemaCheck::ForeignKey,
            expected: format!("references {USERS_TABLE}(id)"),
            observed: if fk { "present" } else { "missing" }.to_string(),
            satisfied: fk,
        });
    }

    Ok(findings)
}

pub fn discrepancies(findings: &[Finding]) -> Vec<&Finding> {
    findings.iter().filter(|f| !f.satisfied).collect()
}

pub fn render_report(findings: &[Finding]) -> String {
    let mut out = String::from("ownership schema audit\n");
    for f in findings {
        let status = if f.satisfied { "ok" } else { "MISSING" };
        out.push_str(&format!(
            "  {:<10} {:<22} expected {}, observed {}  [{}]\n",
            f.table,
            f.check.describe(),
            f.expected,
            f.observed,
            status
        ));
    }
    let missing = discrepancies(findings).len();
    if missing == 0 {
        out.push_str("schema OK\n");
    } else {
        out.push_str(&format!("{missing} expected schema object(s) missing\n"));
    }
    out
}
