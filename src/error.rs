use thiserror::Error;

/// Error taxonomy for the ownership retrofit pipeline.
///
/// `AlreadyApplied` is only ever *produced* by [`classify_store_error`] and
/// only ever *consumed* (reclassified to success) by the runner and the
/// constraint enforcer. Every other component propagates untouched.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("cannot reach the finance store: {0}")]
    Connectivity(#[source] sqlx::Error),

    #[error("{object} is already present")]
    AlreadyApplied { object: String },

    #[error("schema mismatch on {table}.{column}: {detail}")]
    SchemaMismatch {
        table: String,
        column: String,
        detail: String,
    },

    #[error("data integrity violation in {table}: {detail}")]
    DataIntegrity { table: String, detail: String },

    #[error("finance store error: {0}")]
    Store(#[source] sqlx::Error),
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            e @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => MigrationError::Connectivity(e),
            other => MigrationError::Store(other),
        }
    }
}

/// Map a provider-native error into the taxonomy. This is the only place in
/// the crate that knows SQLite error message shapes; a port to another
/// relational backend replaces the match arms here and nothing else.
///
/// `object` names the schema object the caller was trying to create, e.g.
/// `income.user_id`.
pub fn classify_store_error(err: sqlx::Error, object: &str) -> MigrationError {
    if let sqlx::Error::Database(db) = &err {
        let msg = db.message().to_ascii_lowercase();
        if msg.contains("duplicate column name")
            || msg.contains("already exists")
            || msg.contains("unique constraint failed")
        {
            return MigrationError::AlreadyApplied {
                object: object.to_string(),
            };
        }
        if msg.contains("not null constraint failed")
            || msg.contains("foreign key constraint failed")
        {
            return MigrationError::DataIntegrity {
                table: object.to_string(),
                detail: db.message().to_string(),
            };
        }
    }
    MigrationError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> sqlx::SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:")
    }

    #[tokio::test]
    async fn duplicate_column_classifies_as_already_applied() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE t (a TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("ALTER TABLE t ADD COLUMN b INTEGER")
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query("ALTER TABLE t ADD COLUMN b INTEGER")
            .execute(&pool)
            .await
            .unwrap_err();
        match classify_store_error(err, "t.b") {
            MigrationError::AlreadyApplied { object } => assert_eq!(object, "t.b"),
            other => panic!("expected AlreadyApplied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_table_classifies_as_already_applied() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE t (a TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query("CREATE TABLE t (a TEXT)")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(
            classify_store_error(err, "t"),
            MigrationError::AlreadyApplied { .. }
        ));
    }

    #[tokio::test]
    async fn not_null_violation_classifies_as_data_integrity() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE t (a TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query("INSERT INTO t (a) VALUES (NULL)")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(
            classify_store_error(err, "t"),
            MigrationError::DataIntegrity { .. }
        ));
    }

    #[tokio::test]
    async fn unrelated_error_stays_a_store_error() {
        let pool = pool().await;
        let err = match sqlx::query("SELECT * FROM no_such_table").fetch_all(&pool).await {
            Ok(_) => panic!("expected query against missing table to fail"),
            Err(e) => e,
        };
        assert!(matches!(
            classify_store_error(err, "no_such_table"),
            MigrationError::Store(_)
        ));
    }
}
