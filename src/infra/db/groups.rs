use async_trait::async_trait;
use sqlx::FromRow;

use crate::application::repos::{GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::groups::NewGroup;
use crate::domain::types::GroupId;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct GroupRow {
    id: GroupId,
    title: String,
    slug: String,
    description: String,
}

impl From<GroupRow> for GroupRecord {
    fn from(row: GroupRow) -> Self {
        GroupRecord {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
        }
    }
}

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, title, slug, description FROM post_groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(GroupRecord::from))
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, title, slug, description FROM post_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(GroupRecord::from))
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, title, slug, description FROM post_groups ORDER BY title, id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "INSERT INTO post_groups (title, slug, description) VALUES ($1, $2, $3) \
             RETURNING id, title, slug, description",
        )
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }
}
