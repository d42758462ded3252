pub mod calls;
pub mod contacts;
pub mod history;
pub mod invitations;
pub mod scheduled;
pub mod users;

use crate::error::AppError;

/// Unique violations become `InvalidState` so both repositories report a
/// duplicate the same way. Everything else is an `UpstreamFailure`.
pub(crate) fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if is_unique_violation(&e) {
            tracing::debug!(operation, error = %e, "unique constraint violated");
            return AppError::InvalidState(anyhow::anyhow!(
                "duplicate record during {}",
                operation
            ));
        }
        tracing::error!(operation, error = %e, "database error");
        AppError::UpstreamFailure(anyhow::anyhow!("database error during {}", operation))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_constraint_errors_are_upstream_failures() {
        let err = db_error("find_call_by_id")(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::UpstreamFailure(_)));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
