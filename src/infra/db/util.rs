use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::InvalidInput {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db) if db.is_check_violation() => RepoError::Integrity {
            message: format!(
                "{} ({})",
                db.message(),
                db.constraint().unwrap_or("unknown")
            ),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}
