use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostFilter, PostSlice, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::{AuthorRef, GroupRef, PostRecord};
use crate::domain::types::{GroupId, PostId, UserId};

use super::{POST_COLUMNS, POST_JOINS, PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
pub(super) struct PostRow {
    id: PostId,
    text: String,
    pub_date: OffsetDateTime,
    image: Option<String>,
    author_id: UserId,
    author_username: String,
    group_id: Option<GroupId>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };

        PostRecord {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
            },
            group,
            image: row.image,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        filter: PostFilter,
        slice: PostSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let limit = i64::try_from(slice.limit)
            .map_err(|_| RepoError::InvalidInput {
                message: "page size exceeds supported range".to_string(),
            })?;
        let offset = i64::try_from(slice.offset)
            .map_err(|_| RepoError::InvalidInput {
                message: "page offset exceeds supported range".to_string(),
            })?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM posts p");
        qb.push(POST_JOINS);
        qb.push(" WHERE 1=1 ");
        Self::apply_post_filter(&mut qb, filter);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p {POST_JOINS} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let sql = format!(
            "WITH p AS ( \
                INSERT INTO posts (text, author_id, group_id, image) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, text, pub_date, image, author_id, group_id \
             ) \
             SELECT {POST_COLUMNS} FROM p {POST_JOINS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&params.text)
            .bind(params.author_id)
            .bind(params.group_id)
            .bind(params.image.as_deref())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let sql = format!(
            "WITH p AS ( \
                UPDATE posts SET text = $2, group_id = $3, image = COALESCE($4, image) \
                WHERE id = $1 \
                RETURNING id, text, pub_date, image, author_id, group_id \
             ) \
             SELECT {POST_COLUMNS} FROM p {POST_JOINS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(params.id)
            .bind(&params.text)
            .bind(params.group_id)
            .bind(params.image.as_deref())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
