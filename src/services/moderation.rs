use std::sync::Arc;

use regex::RegexBuilder;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{
    ContentType, NewViolation, NewViolationRule, ReviewStatus, Violation, ViolationMatch,
    ViolationRule,
};
use crate::services::authorization::{require_admin, Authorizer};
use crate::store::ViolationStore;

/// Characters of context captured on each side of a matched text
const SNIPPET_RADIUS: usize = 50;

/// Sentinel content id for submissions that were blocked before persistence
pub const BLOCKED_CONTENT_ID: i64 = 0;

/// Result of scanning a piece of content against the active rule set
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DetectionOutcome {
    pub has_violations: bool,
    pub violations: Vec<ViolationMatch>,
}

/// Result of the creation-flow screen: detection plus best-effort recording
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScreenOutcome {
    pub blocked: bool,
    /// Distinct matched texts, for the submitter-facing error message
    pub matched_texts: Vec<String>,
    pub violations: Vec<ViolationMatch>,
}

/// Scans content against the active filter rules and runs the admin-side
/// rule management and violation review workflow.
pub struct ModerationService {
    violations: Arc<dyn ViolationStore>,
    authorizer: Arc<dyn Authorizer>,
}

impl ModerationService {
    pub fn new(violations: Arc<dyn ViolationStore>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            violations,
            authorizer,
        }
    }

    /// Scans `content` against every active rule, in ascending rule-id order.
    ///
    /// Regex rules are matched case-insensitively and report every match;
    /// literal rules report only the first occurrence. Matched text keeps
    /// the original casing. A rule whose stored pattern no longer compiles
    /// is logged and skipped; the scan continues. No side effects.
    pub async fn detect(&self, content: &str) -> AppResult<DetectionOutcome> {
        let rules = self.violations.active_rules().await?;
        let mut matches = Vec::new();

        for rule in &rules {
            if rule.is_regex {
                let regex = match RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(regex) => regex,
                    Err(e) => {
                        tracing::warn!(
                            rule_id = rule.id,
                            error = %e,
                            "Skipping rule with invalid regex pattern"
                        );
                        continue;
                    }
                };

                for found in regex.find_iter(content) {
                    matches.push(ViolationMatch {
                        rule_id: rule.id,
                        matched_text: found.as_str().to_string(),
                        is_regex: true,
                    });
                }
            } else if let Some(matched_text) = first_literal_match(content, &rule.pattern) {
                matches.push(ViolationMatch {
                    rule_id: rule.id,
                    matched_text,
                    is_regex: false,
                });
            }
        }

        Ok(DetectionOutcome {
            has_violations: !matches.is_empty(),
            violations: matches,
        })
    }

    /// Persists one pending Violation per detected match, each with a
    /// surrounding snippet. Best effort: a failed insert is logged and the
    /// remaining matches are still attempted.
    pub async fn record_violations(
        &self,
        user_id: i64,
        content_type: ContentType,
        content_id: i64,
        content: &str,
        matches: &[ViolationMatch],
    ) -> bool {
        let mut all_persisted = true;

        for found in matches {
            let row = NewViolation {
                user_id,
                content_type,
                content_id,
                rule_id: found.rule_id,
                matched_text: found.matched_text.clone(),
                snippet: context_snippet(content, &found.matched_text),
            };

            if let Err(e) = self.violations.create_violation(row).await {
                tracing::error!(
                    user_id,
                    rule_id = found.rule_id,
                    error = %e,
                    "Failed to persist violation"
                );
                all_persisted = false;
            }
        }

        all_persisted
    }

    /// Creation-flow entry point: scans a submission before it is persisted.
    ///
    /// Detection failure propagates (creation must not proceed unfiltered).
    /// When matches exist they are recorded against the blocked-content
    /// sentinel and the matched texts are returned for the error shown to
    /// the submitter.
    pub async fn screen(
        &self,
        user_id: i64,
        content_type: ContentType,
        content: &str,
    ) -> AppResult<ScreenOutcome> {
        let outcome = self.detect(content).await?;

        if !outcome.has_violations {
            return Ok(ScreenOutcome {
                blocked: false,
                matched_texts: Vec::new(),
                violations: Vec::new(),
            });
        }

        self.record_violations(
            user_id,
            content_type,
            BLOCKED_CONTENT_ID,
            content,
            &outcome.violations,
        )
        .await;

        let mut matched_texts: Vec<String> = Vec::new();
        for found in &outcome.violations {
            if !matched_texts.contains(&found.matched_text) {
                matched_texts.push(found.matched_text.clone());
            }
        }

        tracing::info!(
            user_id,
            content_type = content_type.as_str(),
            matches = outcome.violations.len(),
            "Content submission blocked by filter rules"
        );

        Ok(ScreenOutcome {
            blocked: true,
            matched_texts,
            violations: outcome.violations,
        })
    }

    // ------------------------------------------------------------------
    // Admin: rule management
    // ------------------------------------------------------------------

    pub async fn create_rule(
        &self,
        acting_user: i64,
        pattern: String,
        is_regex: bool,
    ) -> AppResult<ViolationRule> {
        require_admin(self.authorizer.as_ref(), acting_user).await?;

        let pattern = pattern.trim().to_string();
        if pattern.is_empty() {
            return Err(AppError::Validation(
                "Rule pattern must not be empty".to_string(),
            ));
        }

        if is_regex {
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| AppError::InvalidRegex(e.to_string()))?;
        }

        if self.violations.rule_exists(&pattern, is_regex).await? {
            return Err(AppError::Validation(
                "An identical rule already exists".to_string(),
            ));
        }

        let rule = self
            .violations
            .create_rule(NewViolationRule {
                pattern,
                is_regex,
                created_by: acting_user,
            })
            .await?;

        tracing::info!(rule_id = rule.id, created_by = acting_user, "Filter rule created");

        Ok(rule)
    }

    pub async fn list_rules(
        &self,
        acting_user: i64,
        include_inactive: bool,
    ) -> AppResult<Vec<ViolationRule>> {
        require_admin(self.authorizer.as_ref(), acting_user).await?;
        self.violations.list_rules(include_inactive).await
    }

    pub async fn set_rule_active(
        &self,
        acting_user: i64,
        rule_id: i64,
        active: bool,
    ) -> AppResult<ViolationRule> {
        require_admin(self.authorizer.as_ref(), acting_user).await?;
        self.violations.set_rule_active(rule_id, active).await
    }

    pub async fn delete_rule(&self, acting_user: i64, rule_id: i64) -> AppResult<()> {
        require_admin(self.authorizer.as_ref(), acting_user).await?;
        self.violations.delete_rule(rule_id).await
    }

    // ------------------------------------------------------------------
    // Admin: violation review
    // ------------------------------------------------------------------

    pub async fn list_violations(
        &self,
        acting_user: i64,
        status: Option<ReviewStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Violation>> {
        require_admin(self.authorizer.as_ref(), acting_user).await?;

        if !(1..=500).contains(&limit) {
            return Err(AppError::Validation(
                "limit must be between 1 and 500".to_string(),
            ));
        }
        if offset < 0 {
            return Err(AppError::Validation("offset must not be negative".to_string()));
        }

        self.violations.list_violations(status, limit, offset).await
    }

    /// Reviews a violation: `pending -> reviewed | ignored`, stamping the
    /// reviewer and timestamp. Re-reviewing overwrites the previous stamp.
    pub async fn review(
        &self,
        acting_user: i64,
        violation_id: i64,
        status: ReviewStatus,
        notes: Option<String>,
    ) -> AppResult<Violation> {
        require_admin(self.authorizer.as_ref(), acting_user).await?;

        if status == ReviewStatus::Pending {
            return Err(AppError::Validation(
                "Review status must be reviewed or ignored".to_string(),
            ));
        }

        let violation = self
            .violations
            .update_review(violation_id, status, acting_user, notes)
            .await?;

        tracing::info!(
            violation_id,
            status = status.as_str(),
            reviewed_by = acting_user,
            "Violation reviewed"
        );

        Ok(violation)
    }
}

/// First case-insensitive occurrence of `pattern` in `content`, returned in
/// the original casing.
fn first_literal_match(content: &str, pattern: &str) -> Option<String> {
    if pattern.is_empty() {
        return None;
    }

    let (start, end) = find_ignore_case(content, pattern)?;
    match content.get(start..end) {
        Some(text) => Some(text.to_string()),
        // Lowercasing shifted byte offsets (rare non-ASCII case); report the
        // pattern itself rather than slicing mid-character
        None => Some(pattern.to_string()),
    }
}

/// Byte range of the first case-insensitive occurrence, in terms of the
/// lowercased haystack. Offsets match the original for ASCII content.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let hay_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    let start = hay_lower.find(&needle_lower)?;
    Some((start, start + needle_lower.len()))
}

/// Up to `SNIPPET_RADIUS` characters of context on each side of the first
/// case-insensitive occurrence of `matched`, clamped to the content bounds.
fn context_snippet(content: &str, matched: &str) -> String {
    let (start, end) = match find_ignore_case(content, matched) {
        Some(range) => range,
        None => return matched.to_string(),
    };

    let start = floor_char_boundary(content, start);
    let end = ceil_char_boundary(content, end.min(content.len()));

    let snippet_start = content[..start]
        .char_indices()
        .rev()
        .nth(SNIPPET_RADIUS - 1)
        .map(|(index, _)| index)
        .unwrap_or(0);
    let snippet_end = content[end..]
        .char_indices()
        .nth(SNIPPET_RADIUS)
        .map(|(index, _)| end + index)
        .unwrap_or(content.len());

    content[snippet_start..snippet_end].to_string()
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::authorization::StaticAuthorizer;
    use crate::store::MemoryStore;

    const ADMIN: i64 = 1;
    const REGULAR: i64 = 2;

    fn moderation(store: Arc<MemoryStore>) -> ModerationService {
        let authorizer = Arc::new(StaticAuthorizer::new().with_admin(ADMIN));
        ModerationService::new(store, authorizer)
    }

    async fn add_rule(service: &ModerationService, pattern: &str, is_regex: bool) -> i64 {
        service
            .create_rule(ADMIN, pattern.to_string(), is_regex)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_literal_rule_first_occurrence_only() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        add_rule(&service, "spam", false).await;

        let outcome = service.detect("this is spam content").await.unwrap();
        assert!(outcome.has_violations);
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].matched_text, "spam");

        // Repeated occurrences still report once per literal rule
        let outcome = service.detect("spam and more SPAM").await.unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].matched_text, "spam");
    }

    #[tokio::test]
    async fn test_literal_match_preserves_original_casing() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        add_rule(&service, "spam", false).await;

        let outcome = service.detect("total SpAm here").await.unwrap();
        assert_eq!(outcome.violations[0].matched_text, "SpAm");
    }

    #[tokio::test]
    async fn test_regex_rule_reports_every_match() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        add_rule(&service, r"buy\s+now", true).await;

        let outcome = service.detect("buy now!!! buy NOW!!!").await.unwrap();
        assert!(outcome.has_violations);
        assert_eq!(outcome.violations.len(), 2);
        assert_eq!(outcome.violations[0].matched_text, "buy now");
        assert_eq!(outcome.violations[1].matched_text, "buy NOW");
    }

    #[tokio::test]
    async fn test_no_active_rules_is_clean() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);

        let outcome = service.detect("anything at all").await.unwrap();
        assert!(!outcome.has_violations);
        assert!(outcome.violations.is_empty());
    }

    #[tokio::test]
    async fn test_deactivated_rule_is_not_applied() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        let rule_id = add_rule(&service, "spam", false).await;
        service.set_rule_active(ADMIN, rule_id, false).await.unwrap();

        let outcome = service.detect("this is spam").await.unwrap();
        assert!(!outcome.has_violations);
    }

    #[tokio::test]
    async fn test_matches_ordered_by_rule_id() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        let first = add_rule(&service, "alpha", false).await;
        let second = add_rule(&service, "beta", false).await;

        let outcome = service.detect("beta then alpha").await.unwrap();
        let rule_order: Vec<i64> = outcome.violations.iter().map(|v| v.rule_id).collect();
        assert_eq!(rule_order, vec![first, second]);
    }

    #[tokio::test]
    async fn test_invalid_stored_regex_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        // Inject a broken pattern directly, bypassing creation validation
        use crate::store::ViolationStore;
        store
            .create_rule(NewViolationRule {
                pattern: "(unclosed".to_string(),
                is_regex: true,
                created_by: ADMIN,
            })
            .await
            .unwrap();
        store
            .create_rule(NewViolationRule {
                pattern: "spam".to_string(),
                is_regex: false,
                created_by: ADMIN,
            })
            .await
            .unwrap();

        let service = moderation(store);
        let outcome = service.detect("spam with (unclosed rule").await.unwrap();

        // The broken rule is skipped, the scan continues
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].matched_text, "spam");
    }

    #[tokio::test]
    async fn test_create_rule_rejects_invalid_regex() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);

        let result = service.create_rule(ADMIN, "(unclosed".to_string(), true).await;
        assert!(matches!(result, Err(AppError::InvalidRegex(_))));
    }

    #[tokio::test]
    async fn test_create_rule_rejects_duplicates() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        add_rule(&service, "spam", false).await;

        let result = service.create_rule(ADMIN, "spam".to_string(), false).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Same pattern as a regex rule is a different rule
        assert!(service.create_rule(ADMIN, "spam".to_string(), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_rule_management_requires_admin() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);

        let result = service.create_rule(REGULAR, "spam".to_string(), false).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let result = service.list_rules(REGULAR, true).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_screen_records_against_blocked_sentinel() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store.clone());
        add_rule(&service, "spam", false).await;

        let outcome = service
            .screen(REGULAR, ContentType::Post, "pure spam content")
            .await
            .unwrap();
        assert!(outcome.blocked);
        assert_eq!(outcome.matched_texts, vec!["spam"]);

        let recorded = service
            .list_violations(ADMIN, Some(ReviewStatus::Pending), 10, 0)
            .await
            .unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].content_id, BLOCKED_CONTENT_ID);
        assert_eq!(recorded[0].user_id, REGULAR);
    }

    #[tokio::test]
    async fn test_screen_clean_content_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        add_rule(&service, "spam", false).await;

        let outcome = service
            .screen(REGULAR, ContentType::Comment, "perfectly fine")
            .await
            .unwrap();
        assert!(!outcome.blocked);

        let recorded = service.list_violations(ADMIN, None, 10, 0).await.unwrap();
        assert!(recorded.is_empty());
    }

    #[tokio::test]
    async fn test_review_stamps_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);
        add_rule(&service, "spam", false).await;
        service
            .screen(REGULAR, ContentType::Post, "spam here")
            .await
            .unwrap();

        let reviewed = service
            .review(ADMIN, 1, ReviewStatus::Reviewed, Some("first pass".to_string()))
            .await
            .unwrap();
        assert_eq!(reviewed.status, ReviewStatus::Reviewed);
        assert_eq!(reviewed.reviewed_by, Some(ADMIN));
        assert!(reviewed.reviewed_at.is_some());
        assert_eq!(reviewed.notes.as_deref(), Some("first pass"));

        // Second review overwrites the stamps
        let reviewed = service
            .review(ADMIN, 1, ReviewStatus::Ignored, Some("second pass".to_string()))
            .await
            .unwrap();
        assert_eq!(reviewed.status, ReviewStatus::Ignored);
        assert_eq!(reviewed.notes.as_deref(), Some("second pass"));
    }

    #[tokio::test]
    async fn test_review_rejects_pending_target() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);

        let result = service.review(ADMIN, 1, ReviewStatus::Pending, None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_review_missing_violation_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = moderation(store);

        let result = service.review(ADMIN, 99, ReviewStatus::Reviewed, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_snippet_clamped_at_content_start() {
        let content = "spam right at the start of a long enough piece of content";
        let snippet = context_snippet(content, "spam");
        assert!(snippet.starts_with("spam"));
        assert!(snippet.len() <= "spam".len() + SNIPPET_RADIUS);
    }

    #[test]
    fn test_snippet_takes_radius_on_both_sides() {
        let before = "a".repeat(80);
        let after = "b".repeat(80);
        let content = format!("{}spam{}", before, after);

        let snippet = context_snippet(&content, "spam");
        assert_eq!(snippet.len(), SNIPPET_RADIUS + 4 + SNIPPET_RADIUS);
        assert!(snippet.contains("spam"));
    }

    #[test]
    fn test_snippet_finds_case_insensitive_occurrence() {
        let content = "leading text SPAM trailing text";
        let snippet = context_snippet(content, "spam");
        assert!(snippet.contains("SPAM"));
    }
}
