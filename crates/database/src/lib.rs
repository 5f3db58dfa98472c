pub mod auctions;
pub mod bids;

use sqlx::{Executor, PgPool};

// Design:
//
// Functions that execute multiple statements should take `&mut
// PgTransaction` to indicate this and to ensure that the whole function
// succeeds or fails together. Functions that execute a single statement
// should take `&mut PgConnection`. We usually call the parameter `ex`
// for `Executor` which is the trait whose methods we use to run
// queries. This scheme allows callers to decide whether they want to
// use the function as part of a bigger transaction or standalone. Note
// that PgTransaction implements Deref to PgConnection. Callers do need
// to take care of calling `commit` on the transaction.
//
// For tests a useful pattern is to start a transaction at the beginning
// of the test, use it for all queries and never commit it. When the
// uncommitted transaction gets dropped it is rolled back. This allows
// postgres tests to run in parallel and makes clearing all tables at
// the beginning of a test obsolete.

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// The names of tables we use in the db.
pub const TABLES: &[&str] = &["auctions", "bids"];

/// Whether the store rejected a commit because it raced another one on
/// the same rows. This is the only error class that is safe to retry.
pub fn is_concurrency_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(err) => matches!(
            err.code().as_deref(),
            // serialization_failure | deadlock_detected
            Some("40001") | Some("40P01")
        ),
        _ => false,
    }
}

/// Delete all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    for table in TABLES {
        ex.execute(format!("TRUNCATE {table} CASCADE;").as_str())
            .await?;
    }
    Ok(())
}

/// Like above but more ergonomic for some tests that use a pool.
#[allow(non_snake_case)]
pub async fn clear_DANGER(pool: &PgPool) -> sqlx::Result<()> {
    let mut transaction = pool.begin().await?;
    clear_DANGER_(&mut transaction).await?;
    transaction.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, PgConnection};

    #[tokio::test]
    #[ignore]
    async fn postgres_clear() {
        let mut con = PgConnection::connect("postgresql://").await.unwrap();
        let mut con = con.begin().await.unwrap();
        clear_DANGER_(&mut con).await.unwrap();
    }
}
