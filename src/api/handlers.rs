use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{
    ContentType, HistoryFilter, Interaction, InteractionKind, PostAnalytics, ReviewStatus,
    SimilarUser, Violation, ViolationRule,
};
use crate::services::{ScreenOutcome, WeightContext};

use super::AppState;

/// Response envelope: every endpoint answers `{success, data}` on the happy
/// path; errors produce `{success: false, error}` via `AppError`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

fn require_id(value: i64, name: &str) -> AppResult<i64> {
    if value > 0 {
        Ok(value)
    } else {
        Err(AppError::Validation(format!("{} must be positive", name)))
    }
}

/// Acting user for admin endpoints, taken from the `x-user-id` header
fn acting_user(headers: &HeaderMap) -> AppResult<i64> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation("Missing or invalid x-user-id header".to_string()))
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecordInteractionRequest {
    pub user_id: i64,
    pub post_id: i64,
    pub kind: InteractionKind,
    /// Explicit weight override; computed dynamically when absent
    pub weight: Option<f64>,
    /// Length of the comment being recorded, for the long-comment bonus
    pub comment_length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecordInteractionResponse {
    pub accepted: bool,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct TrackInteractionRequest {
    pub user_id: i64,
    pub post_id: i64,
    pub kind: InteractionKind,
    pub weight: Option<f64>,
}

/// Compact interaction statistics, a subset of the full behavior profile
#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub user_id: i64,
    pub total_interactions: u64,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub activity_periods: crate::models::ActivityPeriods,
    pub top_hours: Vec<u32>,
    pub top_weekdays: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub kind: Option<String>,
    /// Restrict to interactions from the last N days
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ClearHistoryQuery {
    pub confirm: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenRequest {
    pub user_id: i64,
    pub content_type: ContentType,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListViolationsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewViolationRequest {
    pub status: String,
    pub notes: Option<String>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Explicit interaction recording (the behavior API path).
///
/// When no weight is supplied the dynamic preference weight applies. Counted
/// views and new comments also trigger a background hotness recompute; likes
/// do not.
pub async fn record_interaction(
    State(state): State<AppState>,
    Json(request): Json<RecordInteractionRequest>,
) -> AppResult<Json<Envelope<RecordInteractionResponse>>> {
    let user_id = require_id(request.user_id, "user_id")?;
    let post_id = require_id(request.post_id, "post_id")?;

    let weight = match request.weight {
        Some(weight) => weight,
        None => {
            let context = WeightContext {
                comment_length: request.comment_length,
            };
            state
                .profiles
                .preference_weight(user_id, request.kind, post_id, context)
                .await?
        }
    };

    let outcome = state
        .recorder
        .record_explicit(user_id, post_id, request.kind, weight);

    if matches!(
        request.kind,
        InteractionKind::View | InteractionKind::Comment
    ) {
        state.hotness.recompute_in_background(post_id);
    }

    Ok(ok(RecordInteractionResponse {
        accepted: outcome.accepted,
        weight: outcome.weight,
    }))
}

/// Automatic route-based tracking (the middleware path).
///
/// Called by the conventional content routes when a post is viewed, liked or
/// commented; duplicates within the debounce window are suppressed.
pub async fn track_interaction(
    State(state): State<AppState>,
    Json(request): Json<TrackInteractionRequest>,
) -> AppResult<Json<Envelope<RecordInteractionResponse>>> {
    let user_id = require_id(request.user_id, "user_id")?;
    let post_id = require_id(request.post_id, "post_id")?;

    let outcome = state
        .recorder
        .record_tracked(user_id, post_id, request.kind, request.weight);

    if outcome.accepted
        && matches!(
            request.kind,
            InteractionKind::View | InteractionKind::Comment
        )
    {
        state.hotness.recompute_in_background(post_id);
    }

    Ok(ok(RecordInteractionResponse {
        accepted: outcome.accepted,
        weight: outcome.weight,
    }))
}

/// Full behavior profile for a user
pub async fn get_behavior_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Envelope<crate::models::BehaviorProfile>>> {
    let user_id = require_id(user_id, "user_id")?;
    let profile = state.profiles.build_profile(user_id).await?;
    Ok(ok(profile))
}

/// Interaction statistics only, without content preferences
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Envelope<UserStatsResponse>>> {
    let user_id = require_id(user_id, "user_id")?;
    let profile = state.profiles.build_profile(user_id).await?;

    Ok(ok(UserStatsResponse {
        user_id: profile.user_id,
        total_interactions: profile.total_interactions,
        view_count: profile.view_count,
        like_count: profile.like_count,
        comment_count: profile.comment_count,
        activity_periods: profile.activity_periods,
        top_hours: profile.top_hours,
        top_weekdays: profile.top_weekdays,
    }))
}

/// Interest categories derived from the user's interacted posts
pub async fn get_interest_categories(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Envelope<Vec<String>>>> {
    let user_id = require_id(user_id, "user_id")?;
    let categories = state.profiles.interest_categories(user_id).await?;
    Ok(ok(categories))
}

/// Users with overlapping engagement
pub async fn get_similar_users(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<SimilarQuery>,
) -> AppResult<Json<Envelope<Vec<SimilarUser>>>> {
    let user_id = require_id(user_id, "user_id")?;

    if let Some(limit) = query.limit {
        if !(1..=50).contains(&limit) {
            return Err(AppError::Validation(
                "limit must be between 1 and 50".to_string(),
            ));
        }
    }

    let similar = state.similarity.find_similar(user_id, query.limit).await?;
    Ok(ok(similar))
}

/// Interaction history with optional kind/recency filters
pub async fn get_interaction_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Envelope<Vec<Interaction>>>> {
    let user_id = require_id(user_id, "user_id")?;

    let kind = match query.kind.as_deref() {
        Some(raw) => Some(
            InteractionKind::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown interaction kind: {}", raw)))?,
        ),
        None => None,
    };

    let since = match query.days {
        Some(days) if days <= 0 => {
            return Err(AppError::Validation("days must be positive".to_string()));
        }
        Some(days) => Some(Utc::now() - Duration::days(days)),
        None => None,
    };

    let limit = query.limit.unwrap_or(50);
    if !(1..=500).contains(&limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 500".to_string(),
        ));
    }

    let history = state
        .interactions
        .history(
            user_id,
            HistoryFilter {
                kind,
                since,
                limit: Some(limit),
            },
        )
        .await?;

    Ok(ok(history))
}

/// Privacy erasure of a user's own interaction history.
/// Requires the explicit confirmation flag.
pub async fn clear_interaction_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<ClearHistoryQuery>,
) -> AppResult<Json<Envelope<serde_json::Value>>> {
    let user_id = require_id(user_id, "user_id")?;

    if query.confirm != Some(true) {
        return Err(AppError::Validation(
            "Clearing interaction history requires confirm=true".to_string(),
        ));
    }

    let removed = state.interactions.delete_for_user(user_id).await?;
    tracing::info!(user_id, removed, "Interaction history cleared");

    Ok(ok(json!({ "removed": removed })))
}

/// Per-post interaction analytics
pub async fn get_post_analytics(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Envelope<PostAnalytics>>> {
    let post_id = require_id(post_id, "post_id")?;

    let counts = state.interactions.post_kind_counts(post_id).await?;
    let hourly_distribution = state.interactions.post_hourly_distribution(post_id).await?;

    Ok(ok(PostAnalytics {
        post_id,
        view_count: counts.get(&InteractionKind::View).copied().unwrap_or(0),
        like_count: counts.get(&InteractionKind::Like).copied().unwrap_or(0),
        comment_count: counts.get(&InteractionKind::Comment).copied().unwrap_or(0),
        hourly_distribution,
    }))
}

/// Creation-flow violation screen, called before a post/comment is persisted
pub async fn screen_content(
    State(state): State<AppState>,
    Json(request): Json<ScreenRequest>,
) -> AppResult<Json<Envelope<ScreenOutcome>>> {
    let user_id = require_id(request.user_id, "user_id")?;

    if request.content.is_empty() {
        return Err(AppError::Validation("content must not be empty".to_string()));
    }

    let outcome = state
        .moderation
        .screen(user_id, request.content_type, &request.content)
        .await?;

    Ok(ok(outcome))
}

// Moderation admin endpoints

pub async fn list_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListRulesQuery>,
) -> AppResult<Json<Envelope<Vec<ViolationRule>>>> {
    let admin = acting_user(&headers)?;
    let rules = state
        .moderation
        .list_rules(admin, query.include_inactive)
        .await?;
    Ok(ok(rules))
}

pub async fn create_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRuleRequest>,
) -> AppResult<(StatusCode, Json<Envelope<ViolationRule>>)> {
    let admin = acting_user(&headers)?;
    let rule = state
        .moderation
        .create_rule(admin, request.pattern, request.is_regex)
        .await?;
    Ok((StatusCode::CREATED, ok(rule)))
}

pub async fn update_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rule_id): Path<i64>,
    Json(request): Json<UpdateRuleRequest>,
) -> AppResult<Json<Envelope<ViolationRule>>> {
    let admin = acting_user(&headers)?;
    let rule = state
        .moderation
        .set_rule_active(admin, rule_id, request.is_active)
        .await?;
    Ok(ok(rule))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rule_id): Path<i64>,
) -> AppResult<Json<Envelope<serde_json::Value>>> {
    let admin = acting_user(&headers)?;
    state.moderation.delete_rule(admin, rule_id).await?;
    Ok(ok(json!({ "deleted": rule_id })))
}

pub async fn list_violations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListViolationsQuery>,
) -> AppResult<Json<Envelope<Vec<Violation>>>> {
    let admin = acting_user(&headers)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            ReviewStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown review status: {}", raw)))?,
        ),
        None => None,
    };

    let violations = state
        .moderation
        .list_violations(
            admin,
            status,
            query.limit.unwrap_or(50),
            query.offset.unwrap_or(0),
        )
        .await?;

    Ok(ok(violations))
}

pub async fn review_violation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(violation_id): Path<i64>,
    Json(request): Json<ReviewViolationRequest>,
) -> AppResult<Json<Envelope<Violation>>> {
    let admin = acting_user(&headers)?;

    let status = ReviewStatus::parse(&request.status).ok_or_else(|| {
        AppError::Validation(format!("Unknown review status: {}", request.status))
    })?;

    let violation = state
        .moderation
        .review(admin, violation_id, status, request.notes)
        .await?;

    Ok(ok(violation))
}
