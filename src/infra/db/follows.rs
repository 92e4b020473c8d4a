use async_trait::async_trait;

use crate::application::repos::{FollowsRepo, RepoError};
use crate::domain::types::UserId;

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn insert_follow(&self, user: UserId, author: UserId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT follows_user_author_key DO NOTHING",
        )
        .bind(user)
        .bind(author)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(&self, user: UserId, author: UserId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user)
            .bind(author)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn follow_exists(&self, user: UserId, author: UserId) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user)
        .bind(author)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
