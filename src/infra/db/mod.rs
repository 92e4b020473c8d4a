//! Postgres-backed repository implementations.

mod comments;
mod follows;
mod groups;
mod posts;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthRepo, PostFilter, RepoError};

/// Columns selected for every post listing, joined with author and group.
const POST_COLUMNS: &str = "p.id, p.text, p.pub_date, p.image, \
    u.id AS author_id, u.username AS author_username, \
    g.id AS group_id, g.slug AS group_slug, g.title AS group_title";

const POST_JOINS: &str = " JOIN users u ON u.id = p.author_id \
    LEFT JOIN post_groups g ON g.id = p.group_id ";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn apply_post_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(group_id);
            }
            PostFilter::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(author_id);
            }
            PostFilter::FollowedBy(user_id) => {
                qb.push(" AND p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ");
                qb.push_bind(user_id);
                qb.push(")");
            }
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
