use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{
    HistoryFilter, Interaction, InteractionKind, NewInteraction, NewViolation, NewViolationRule,
    Post, PostComment, ReviewStatus, Violation, ViolationRule,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Append-only log of user-content interactions with the aggregate queries
/// the behavior services need. No storage engine is mandated here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn create(&self, row: NewInteraction) -> AppResult<Interaction>;

    /// A user's interactions, newest first, optionally filtered
    async fn history(&self, user_id: i64, filter: HistoryFilter) -> AppResult<Vec<Interaction>>;

    /// Distinct post ids the user has interacted with
    async fn distinct_post_ids(&self, user_id: i64) -> AppResult<Vec<i64>>;

    /// All interactions on the given posts by anyone except `exclude_user`
    async fn for_posts_excluding(
        &self,
        post_ids: Vec<i64>,
        exclude_user: i64,
    ) -> AppResult<Vec<Interaction>>;

    async fn count_by_kind(&self, user_id: i64, kind: InteractionKind) -> AppResult<i64>;

    /// Whether the user touched the post at all since the given instant
    async fn has_recent_with_post(
        &self,
        user_id: i64,
        post_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn post_kind_counts(&self, post_id: i64) -> AppResult<HashMap<InteractionKind, i64>>;

    /// Interaction counts on the post bucketed by hour of day; always 24 entries
    async fn post_hourly_distribution(&self, post_id: i64) -> AppResult<Vec<i64>>;

    /// Privacy erasure: removes every interaction the user has recorded
    async fn delete_for_user(&self, user_id: i64) -> AppResult<u64>;
}

/// Read access to posts and comments, plus the hotness write-back.
/// Post/comment CRUD itself belongs to the conventional layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn post(&self, post_id: i64) -> AppResult<Option<Post>>;

    async fn posts_by_ids(&self, post_ids: Vec<i64>) -> AppResult<Vec<Post>>;

    /// Overwrites the stored hotness score
    async fn update_hotness(&self, post_id: i64, score: f64) -> AppResult<()>;

    async fn comments_by_author(&self, user_id: i64) -> AppResult<Vec<PostComment>>;
}

/// Content-filter rules and detected violations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ViolationStore: Send + Sync {
    /// Active rules in stable ascending-id order
    async fn active_rules(&self) -> AppResult<Vec<ViolationRule>>;

    async fn list_rules(&self, include_inactive: bool) -> AppResult<Vec<ViolationRule>>;

    async fn rule_exists(&self, pattern: &str, is_regex: bool) -> AppResult<bool>;

    async fn create_rule(&self, rule: NewViolationRule) -> AppResult<ViolationRule>;

    async fn set_rule_active(&self, rule_id: i64, active: bool) -> AppResult<ViolationRule>;

    async fn delete_rule(&self, rule_id: i64) -> AppResult<()>;

    async fn create_violation(&self, violation: NewViolation) -> AppResult<Violation>;

    async fn list_violations(
        &self,
        status: Option<ReviewStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Violation>>;

    async fn get_violation(&self, violation_id: i64) -> AppResult<Option<Violation>>;

    /// Stamps the review outcome on a violation; idempotent on re-review
    async fn update_review(
        &self,
        violation_id: i64,
        status: ReviewStatus,
        reviewer_id: i64,
        notes: Option<String>,
    ) -> AppResult<Violation>;
}
