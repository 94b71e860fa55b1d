use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::error::{AppError, AppResult};
use crate::models::{
    ContentType, HistoryFilter, Interaction, InteractionKind, NewInteraction, NewViolation,
    NewViolationRule, Post, PostComment, ReviewStatus, Violation, ViolationRule,
};

use super::{ContentStore, InteractionStore, ViolationStore};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Postgres-backed implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_interaction(row: &PgRow) -> AppResult<Interaction> {
    let kind_str: String = row.try_get("kind")?;
    let kind = InteractionKind::parse(&kind_str)
        .ok_or_else(|| AppError::Internal(format!("Unknown interaction kind: {}", kind_str)))?;

    Ok(Interaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        post_id: row.try_get("post_id")?,
        kind,
        weight: row.try_get("weight")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_post(row: &PgRow) -> AppResult<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        like_count: row.try_get("like_count")?,
        comment_count: row.try_get("comment_count")?,
        view_count: row.try_get("view_count")?,
        hotness_score: row.try_get("hotness_score")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_rule(row: &PgRow) -> AppResult<ViolationRule> {
    Ok(ViolationRule {
        id: row.try_get("id")?,
        pattern: row.try_get("pattern")?,
        is_regex: row.try_get("is_regex")?,
        is_active: row.try_get("is_active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_violation(row: &PgRow) -> AppResult<Violation> {
    let content_type_str: String = row.try_get("content_type")?;
    let content_type = ContentType::parse(&content_type_str)
        .ok_or_else(|| AppError::Internal(format!("Unknown content type: {}", content_type_str)))?;
    let status_str: String = row.try_get("status")?;
    let status = ReviewStatus::parse(&status_str)
        .ok_or_else(|| AppError::Internal(format!("Unknown review status: {}", status_str)))?;

    Ok(Violation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        content_type,
        content_id: row.try_get("content_id")?,
        rule_id: row.try_get("rule_id")?,
        matched_text: row.try_get("matched_text")?,
        snippet: row.try_get("snippet")?,
        detected_at: row.try_get("detected_at")?,
        status,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl InteractionStore for PgStore {
    async fn create(&self, row: NewInteraction) -> AppResult<Interaction> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO interactions (user_id, post_id, kind, weight)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, post_id, kind, weight, created_at
            "#,
        )
        .bind(row.user_id)
        .bind(row.post_id)
        .bind(row.kind.as_str())
        .bind(row.weight)
        .fetch_one(&self.pool)
        .await?;

        map_interaction(&inserted)
    }

    async fn history(&self, user_id: i64, filter: HistoryFilter) -> AppResult<Vec<Interaction>> {
        // LIMIT NULL is no limit in Postgres
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, post_id, kind, weight, created_at
            FROM interactions
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR kind = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.since)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_interaction).collect()
    }

    async fn distinct_post_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT DISTINCT post_id FROM interactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("post_id").map_err(AppError::from))
            .collect()
    }

    async fn for_posts_excluding(
        &self,
        post_ids: Vec<i64>,
        exclude_user: i64,
    ) -> AppResult<Vec<Interaction>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, post_id, kind, weight, created_at
            FROM interactions
            WHERE post_id = ANY($1) AND user_id <> $2
            "#,
        )
        .bind(&post_ids)
        .bind(exclude_user)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_interaction).collect()
    }

    async fn count_by_kind(&self, user_id: i64, kind: InteractionKind) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM interactions WHERE user_id = $1 AND kind = $2",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("cnt")?)
    }

    async fn has_recent_with_post(
        &self,
        user_id: i64,
        post_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM interactions
                WHERE user_id = $1 AND post_id = $2 AND created_at >= $3
            ) AS present
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("present")?)
    }

    async fn post_kind_counts(&self, post_id: i64) -> AppResult<HashMap<InteractionKind, i64>> {
        let rows = sqlx::query(
            "SELECT kind, COUNT(*) AS cnt FROM interactions WHERE post_id = $1 GROUP BY kind",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for row in &rows {
            let kind_str: String = row.try_get("kind")?;
            if let Some(kind) = InteractionKind::parse(&kind_str) {
                counts.insert(kind, row.try_get("cnt")?);
            }
        }
        Ok(counts)
    }

    async fn post_hourly_distribution(&self, post_id: i64) -> AppResult<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT EXTRACT(HOUR FROM created_at)::BIGINT AS hour, COUNT(*) AS cnt
            FROM interactions
            WHERE post_id = $1
            GROUP BY hour
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let mut distribution = vec![0i64; 24];
        for row in &rows {
            let hour: i64 = row.try_get("hour")?;
            let count: i64 = row.try_get("cnt")?;
            if (0..24).contains(&hour) {
                distribution[hour as usize] = count;
            }
        }
        Ok(distribution)
    }

    async fn delete_for_user(&self, user_id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM interactions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn post(&self, post_id: i64) -> AppResult<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, author_id, title, content, like_count, comment_count,
                   view_count, hotness_score, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_post).transpose()
    }

    async fn posts_by_ids(&self, post_ids: Vec<i64>) -> AppResult<Vec<Post>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, author_id, title, content, like_count, comment_count,
                   view_count, hotness_score, created_at
            FROM posts
            WHERE id = ANY($1)
            "#,
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_post).collect()
    }

    async fn update_hotness(&self, post_id: i64, score: f64) -> AppResult<()> {
        sqlx::query("UPDATE posts SET hotness_score = $2 WHERE id = $1")
            .bind(post_id)
            .bind(score)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn comments_by_author(&self, user_id: i64) -> AppResult<Vec<PostComment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, author_id, content, parent_id, created_at
            FROM post_comments
            WHERE author_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PostComment {
                    id: row.try_get("id")?,
                    post_id: row.try_get("post_id")?,
                    author_id: row.try_get("author_id")?,
                    content: row.try_get("content")?,
                    parent_id: row.try_get("parent_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ViolationStore for PgStore {
    async fn active_rules(&self) -> AppResult<Vec<ViolationRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pattern, is_regex, is_active, created_by, created_at, updated_at
            FROM violation_rules
            WHERE is_active = TRUE
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_rule).collect()
    }

    async fn list_rules(&self, include_inactive: bool) -> AppResult<Vec<ViolationRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pattern, is_regex, is_active, created_by, created_at, updated_at
            FROM violation_rules
            WHERE is_active = TRUE OR $1
            ORDER BY id ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_rule).collect()
    }

    async fn rule_exists(&self, pattern: &str, is_regex: bool) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM violation_rules WHERE pattern = $1 AND is_regex = $2
            ) AS present
            "#,
        )
        .bind(pattern)
        .bind(is_regex)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("present")?)
    }

    async fn create_rule(&self, rule: NewViolationRule) -> AppResult<ViolationRule> {
        let row = sqlx::query(
            r#"
            INSERT INTO violation_rules (pattern, is_regex, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, pattern, is_regex, is_active, created_by, created_at, updated_at
            "#,
        )
        .bind(&rule.pattern)
        .bind(rule.is_regex)
        .bind(rule.created_by)
        .fetch_one(&self.pool)
        .await?;

        map_rule(&row)
    }

    async fn set_rule_active(&self, rule_id: i64, active: bool) -> AppResult<ViolationRule> {
        let row = sqlx::query(
            r#"
            UPDATE violation_rules
            SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, pattern, is_regex, is_active, created_by, created_at, updated_at
            "#,
        )
        .bind(rule_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_rule(&row),
            None => Err(AppError::NotFound(format!("Rule {} not found", rule_id))),
        }
    }

    async fn delete_rule(&self, rule_id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM violation_rules WHERE id = $1")
            .bind(rule_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Rule {} not found", rule_id)));
        }
        Ok(())
    }

    async fn create_violation(&self, violation: NewViolation) -> AppResult<Violation> {
        let row = sqlx::query(
            r#"
            INSERT INTO violations (user_id, content_type, content_id, rule_id, matched_text, snippet)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, content_type, content_id, rule_id, matched_text,
                      snippet, detected_at, status, reviewed_by, reviewed_at, notes
            "#,
        )
        .bind(violation.user_id)
        .bind(violation.content_type.as_str())
        .bind(violation.content_id)
        .bind(violation.rule_id)
        .bind(&violation.matched_text)
        .bind(&violation.snippet)
        .fetch_one(&self.pool)
        .await?;

        map_violation(&row)
    }

    async fn list_violations(
        &self,
        status: Option<ReviewStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Violation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, content_type, content_id, rule_id, matched_text,
                   snippet, detected_at, status, reviewed_by, reviewed_at, notes
            FROM violations
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY detected_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_violation).collect()
    }

    async fn get_violation(&self, violation_id: i64) -> AppResult<Option<Violation>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, content_type, content_id, rule_id, matched_text,
                   snippet, detected_at, status, reviewed_by, reviewed_at, notes
            FROM violations
            WHERE id = $1
            "#,
        )
        .bind(violation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_violation).transpose()
    }

    async fn update_review(
        &self,
        violation_id: i64,
        status: ReviewStatus,
        reviewer_id: i64,
        notes: Option<String>,
    ) -> AppResult<Violation> {
        let row = sqlx::query(
            r#"
            UPDATE violations
            SET status = $2, reviewed_by = $3, reviewed_at = NOW(), notes = $4
            WHERE id = $1
            RETURNING id, user_id, content_type, content_id, rule_id, matched_text,
                      snippet, detected_at, status, reviewed_by, reviewed_at, notes
            "#,
        )
        .bind(violation_id)
        .bind(status.as_str())
        .bind(reviewer_id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_violation(&row),
            None => Err(AppError::NotFound(format!(
                "Violation {} not found",
                violation_id
            ))),
        }
    }
}
