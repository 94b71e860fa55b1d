use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{
    HistoryFilter, Interaction, InteractionKind, NewInteraction, NewViolation, NewViolationRule,
    Post, PostComment, ReviewStatus, Violation, ViolationRule,
};

use super::{ContentStore, InteractionStore, ViolationStore};

/// In-memory implementation of every store trait.
///
/// Backs the integration tests and local experiments; the semantics mirror
/// the Postgres implementation, including stable rule ordering and the
/// not-found errors.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    interactions: Vec<Interaction>,
    posts: HashMap<i64, Post>,
    comments: Vec<PostComment>,
    rules: Vec<ViolationRule>,
    violations: Vec<Violation>,
    next_interaction_id: i64,
    next_rule_id: i64,
    next_violation_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a post. Test helper; posts are otherwise owned by the CRUD layer.
    pub async fn insert_post(&self, post: Post) {
        self.inner.write().await.posts.insert(post.id, post);
    }

    /// Seeds a comment. Test helper.
    pub async fn insert_comment(&self, comment: PostComment) {
        self.inner.write().await.comments.push(comment);
    }

    /// Seeds an interaction with an explicit timestamp. Test helper for
    /// exercising time-sensitive aggregation.
    pub async fn insert_interaction_at(
        &self,
        row: NewInteraction,
        created_at: DateTime<Utc>,
    ) -> Interaction {
        let mut inner = self.inner.write().await;
        inner.next_interaction_id += 1;
        let interaction = Interaction {
            id: inner.next_interaction_id,
            user_id: row.user_id,
            post_id: row.post_id,
            kind: row.kind,
            weight: row.weight,
            created_at,
        };
        inner.interactions.push(interaction.clone());
        interaction
    }

    pub async fn interaction_count(&self) -> usize {
        self.inner.read().await.interactions.len()
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn create(&self, row: NewInteraction) -> AppResult<Interaction> {
        Ok(self.insert_interaction_at(row, Utc::now()).await)
    }

    async fn history(&self, user_id: i64, filter: HistoryFilter) -> AppResult<Vec<Interaction>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Interaction> = inner
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .filter(|i| filter.kind.map_or(true, |k| i.kind == k))
            .filter(|i| filter.since.map_or(true, |s| i.created_at >= s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn distinct_post_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for interaction in inner.interactions.iter().filter(|i| i.user_id == user_id) {
            if seen.insert(interaction.post_id) {
                ids.push(interaction.post_id);
            }
        }
        Ok(ids)
    }

    async fn for_posts_excluding(
        &self,
        post_ids: Vec<i64>,
        exclude_user: i64,
    ) -> AppResult<Vec<Interaction>> {
        let wanted: HashSet<i64> = post_ids.into_iter().collect();
        let inner = self.inner.read().await;
        Ok(inner
            .interactions
            .iter()
            .filter(|i| i.user_id != exclude_user && wanted.contains(&i.post_id))
            .cloned()
            .collect())
    }

    async fn count_by_kind(&self, user_id: i64, kind: InteractionKind) -> AppResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id && i.kind == kind)
            .count() as i64)
    }

    async fn has_recent_with_post(
        &self,
        user_id: i64,
        post_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.interactions.iter().any(|i| {
            i.user_id == user_id && i.post_id == post_id && i.created_at >= since
        }))
    }

    async fn post_kind_counts(&self, post_id: i64) -> AppResult<HashMap<InteractionKind, i64>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for interaction in inner.interactions.iter().filter(|i| i.post_id == post_id) {
            *counts.entry(interaction.kind).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn post_hourly_distribution(&self, post_id: i64) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;
        let mut distribution = vec![0i64; 24];
        for interaction in inner.interactions.iter().filter(|i| i.post_id == post_id) {
            distribution[interaction.created_at.hour() as usize] += 1;
        }
        Ok(distribution)
    }

    async fn delete_for_user(&self, user_id: i64) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.interactions.len();
        inner.interactions.retain(|i| i.user_id != user_id);
        Ok((before - inner.interactions.len()) as u64)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn post(&self, post_id: i64) -> AppResult<Option<Post>> {
        Ok(self.inner.read().await.posts.get(&post_id).cloned())
    }

    async fn posts_by_ids(&self, post_ids: Vec<i64>) -> AppResult<Vec<Post>> {
        let inner = self.inner.read().await;
        Ok(post_ids
            .iter()
            .filter_map(|id| inner.posts.get(id).cloned())
            .collect())
    }

    async fn update_hotness(&self, post_id: i64, score: f64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(post) = inner.posts.get_mut(&post_id) {
            post.hotness_score = score;
        }
        Ok(())
    }

    async fn comments_by_author(&self, user_id: i64) -> AppResult<Vec<PostComment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .comments
            .iter()
            .filter(|c| c.author_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ViolationStore for MemoryStore {
    async fn active_rules(&self) -> AppResult<Vec<ViolationRule>> {
        let inner = self.inner.read().await;
        let mut rules: Vec<ViolationRule> = inner
            .rules
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn list_rules(&self, include_inactive: bool) -> AppResult<Vec<ViolationRule>> {
        let inner = self.inner.read().await;
        let mut rules: Vec<ViolationRule> = inner
            .rules
            .iter()
            .filter(|r| include_inactive || r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn rule_exists(&self, pattern: &str, is_regex: bool) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .rules
            .iter()
            .any(|r| r.pattern == pattern && r.is_regex == is_regex))
    }

    async fn create_rule(&self, rule: NewViolationRule) -> AppResult<ViolationRule> {
        let mut inner = self.inner.write().await;
        inner.next_rule_id += 1;
        let now = Utc::now();
        let rule = ViolationRule {
            id: inner.next_rule_id,
            pattern: rule.pattern,
            is_regex: rule.is_regex,
            is_active: true,
            created_by: rule.created_by,
            created_at: now,
            updated_at: now,
        };
        inner.rules.push(rule.clone());
        Ok(rule)
    }

    async fn set_rule_active(&self, rule_id: i64, active: bool) -> AppResult<ViolationRule> {
        let mut inner = self.inner.write().await;
        match inner.rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                rule.is_active = active;
                rule.updated_at = Utc::now();
                Ok(rule.clone())
            }
            None => Err(AppError::NotFound(format!("Rule {} not found", rule_id))),
        }
    }

    async fn delete_rule(&self, rule_id: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.rules.len();
        inner.rules.retain(|r| r.id != rule_id);
        if inner.rules.len() == before {
            return Err(AppError::NotFound(format!("Rule {} not found", rule_id)));
        }
        Ok(())
    }

    async fn create_violation(&self, violation: NewViolation) -> AppResult<Violation> {
        let mut inner = self.inner.write().await;
        inner.next_violation_id += 1;
        let violation = Violation {
            id: inner.next_violation_id,
            user_id: violation.user_id,
            content_type: violation.content_type,
            content_id: violation.content_id,
            rule_id: violation.rule_id,
            matched_text: violation.matched_text,
            snippet: violation.snippet,
            detected_at: Utc::now(),
            status: ReviewStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            notes: None,
        };
        inner.violations.push(violation.clone());
        Ok(violation)
    }

    async fn list_violations(
        &self,
        status: Option<ReviewStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Violation>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Violation> = inner
            .violations
            .iter()
            .filter(|v| status.map_or(true, |s| v.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get_violation(&self, violation_id: i64) -> AppResult<Option<Violation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .violations
            .iter()
            .find(|v| v.id == violation_id)
            .cloned())
    }

    async fn update_review(
        &self,
        violation_id: i64,
        status: ReviewStatus,
        reviewer_id: i64,
        notes: Option<String>,
    ) -> AppResult<Violation> {
        let mut inner = self.inner.write().await;
        match inner.violations.iter_mut().find(|v| v.id == violation_id) {
            Some(violation) => {
                violation.status = status;
                violation.reviewed_by = Some(reviewer_id);
                violation.reviewed_at = Some(Utc::now());
                violation.notes = notes;
                Ok(violation.clone())
            }
            None => Err(AppError::NotFound(format!(
                "Violation {} not found",
                violation_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_distinct_post_ids_dedupes() {
        let store = MemoryStore::new();
        for post_id in [1, 2, 1, 3, 2] {
            store
                .create(NewInteraction {
                    user_id: 5,
                    post_id,
                    kind: InteractionKind::View,
                    weight: 0.5,
                })
                .await
                .unwrap();
        }

        let ids = store.distinct_post_ids(5).await.unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_for_user_only_touches_that_user() {
        let store = MemoryStore::new();
        for user_id in [1, 1, 2] {
            store
                .create(NewInteraction {
                    user_id,
                    post_id: 9,
                    kind: InteractionKind::Like,
                    weight: 2.0,
                })
                .await
                .unwrap();
        }

        let removed = store.delete_for_user(1).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.interaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_rule_ordering_is_stable() {
        let store = MemoryStore::new();
        for pattern in ["spam", "scam", "junk"] {
            store
                .create_rule(NewViolationRule {
                    pattern: pattern.to_string(),
                    is_regex: false,
                    created_by: 1,
                })
                .await
                .unwrap();
        }
        store.set_rule_active(2, false).await.unwrap();

        let active = store.active_rules().await.unwrap();
        let ids: Vec<i64> = active.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_update_review_missing_violation() {
        let store = MemoryStore::new();
        let result = store
            .update_review(99, ReviewStatus::Reviewed, 1, None)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
