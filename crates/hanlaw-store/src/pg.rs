//! Postgres implementation of [`StatuteStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::info;

use hanlaw_core::{Embedding, StatuteDetail, StatuteSummary, normalize_date};

use crate::{ExistingStatute, StatuteStore, StoreError};

/// Postgres-backed statute store.
///
/// One statute write is one transaction: embedding row, statute row,
/// category row, article rows in document order, then history rows for
/// entries whose date normalises. A failure at any step rolls the whole
/// statute back; readers never see a partial one.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` and run embedded migrations (idempotent).
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Access the underlying pool (for maintenance queries and tests).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StatuteStore for PgStore {
    async fn find_statute(
        &self,
        name: &str,
        external_id: Option<&str>,
    ) -> Result<Option<ExistingStatute>, StoreError> {
        let row = match external_id {
            Some(ext) => {
                sqlx::query(
                    r#"
                    SELECT id, created_at FROM statutes
                    WHERE name = $1 OR statute_id = $2
                    ORDER BY id
                    LIMIT 1
                    "#,
                )
                .bind(name)
                .bind(ext)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, created_at FROM statutes
                    WHERE name = $1
                    ORDER BY id
                    LIMIT 1
                    "#,
                )
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(|r| ExistingStatute {
            id: r.get("id"),
            created_at: r.get("created_at"),
        }))
    }

    async fn insert_statute(
        &self,
        summary: &StatuteSummary,
        detail: &StatuteDetail,
        embedding: &Embedding,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let embedding_id: i64 = sqlx::query_scalar(
            "INSERT INTO statute_embeddings (embedding, source_text) VALUES ($1, $2) RETURNING id",
        )
        .bind(&embedding.vector)
        .bind(&embedding.source_text)
        .fetch_one(&mut *tx)
        .await?;

        let statute_pk: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO statutes
                (embedding_id, statute_id, name, revision_info, effective_date,
                 promulgation_date, promulgation_no, ministry, statute_type,
                 title_korean, title_abbr, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, now()))
            RETURNING id
            "#,
        )
        .bind(embedding_id)
        .bind(&summary.external_id)
        .bind(&summary.name)
        .bind(summary.revision_info())
        .bind(normalize_date(&summary.effective_date))
        .bind(normalize_date(&summary.promulgation_date))
        .bind(&summary.promulgation_no)
        .bind(&summary.ministry)
        .bind(&summary.statute_type)
        .bind(&summary.name)
        .bind(&summary.title_abbr)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO statute_categories (statute_type, ministry, content) VALUES ($1, $2, $3)",
        )
        .bind(&summary.statute_type)
        .bind(&summary.ministry)
        .bind(format!(
            "공포번호: {}, 공포일자: {}",
            summary.promulgation_no, summary.promulgation_date
        ))
        .execute(&mut *tx)
        .await?;

        for (position, article) in detail.articles.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO statute_articles
                    (statute_pk, position, article_number, article_title, article_content)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(statute_pk)
            .bind(position as i32)
            .bind(&article.number)
            .bind(&article.title)
            .bind(&article.content)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &detail.history {
            // Entries without a normalisable date are dropped, not stored
            // with a NULL date.
            let Some(date) = normalize_date(&entry.date) else {
                continue;
            };
            sqlx::query(
                r#"
                INSERT INTO statute_history
                    (statute_pk, history_type, history_date, history_no, history_content)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(statute_pk)
            .bind(&entry.kind)
            .bind(date)
            .bind(&entry.number)
            .bind(&entry.content)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(statute_pk, name = %summary.name, articles = detail.articles.len(), "stored statute");
        Ok(statute_pk)
    }

    async fn delete_statute(&self, id: i64) -> Result<bool, StoreError> {
        // The embedding row is the ownership root: the statute cascades from
        // it, and articles/history cascade from the statute, so one DELETE
        // removes the whole unit.
        let result = sqlx::query(
            r#"
            DELETE FROM statute_embeddings e
            USING statutes s
            WHERE s.id = $1 AND e.id = s.embedding_id
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
