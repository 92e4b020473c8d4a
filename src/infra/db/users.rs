use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserId;

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, created_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_or_create(&self, username: &str) -> Result<UserRecord, RepoError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            "INSERT INTO users (username) VALUES ($1) \
             ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "INSERT INTO users (username, first_name, last_name, email) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&params.username)
            .bind(&params.first_name)
            .bind(&params.last_name)
            .bind(&params.email)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }
}
