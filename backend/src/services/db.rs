//! Postgres helpers shared by the services

use sqlx::PgConnection;

use crate::error::AppResult;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Serialization failures, deadlocks and lock timeouts are worth retrying
pub fn is_contention(err: &sqlx::Error) -> bool {
    matches!(
        sqlstate(err).as_deref(),
        Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE)
    )
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(UNIQUE_VIOLATION)
}

pub fn is_exclusion_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(EXCLUSION_VIOLATION)
}

/// Bound lock waits for the rest of the current transaction
pub async fn set_lock_timeout(conn: &mut PgConnection, timeout_ms: u64) -> AppResult<()> {
    // SET does not take bind parameters
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", timeout_ms))
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_contention() {
        assert!(!is_contention(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
