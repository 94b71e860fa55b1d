use std::sync::Arc;

use chrono::{Datelike, Duration, Timelike, Utc};

use crate::error::AppResult;
use crate::models::{
    clamp_weight, ActivityPeriods, BehaviorProfile, EngagementStyle, HistoryFilter,
    InteractionKind, Post, SocialBehavior,
};
use crate::store::{ContentStore, InteractionStore};

/// Fixed keyword sets for content-category extraction. A category matches a
/// post when any keyword appears, case-insensitive, in its title or body.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "technology",
        &["programming", "software", "computer", "tech", "code", "ai"],
    ),
    (
        "science",
        &["science", "research", "physics", "biology", "experiment"],
    ),
    (
        "gaming",
        &["game", "gaming", "esports", "console", "multiplayer"],
    ),
    (
        "lifestyle",
        &["travel", "food", "fitness", "fashion", "health"],
    ),
    (
        "business",
        &["business", "startup", "finance", "market", "economy"],
    ),
    (
        "education",
        &["learn", "course", "tutorial", "university", "school"],
    ),
];

/// How many top categories, hours, and weekdays a profile reports
const TOP_N: usize = 3;

/// Prior like count under which a like still earns the rare-liker bonus
const RARE_LIKER_THRESHOLD: i64 = 10;

/// Comment length above which the long-comment bonus applies
const LONG_COMMENT_THRESHOLD: usize = 100;

/// Weight multiplier applied when the user already touched the post recently
const REPEAT_INTERACTION_FACTOR: f64 = 0.7;

/// Optional context for dynamic weight computation
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightContext {
    pub comment_length: Option<usize>,
}

/// Builds behavioral profiles from the interaction log and computes the
/// dynamic weights used by the explicit tracking path.
pub struct ProfileService {
    interactions: Arc<dyn InteractionStore>,
    content: Arc<dyn ContentStore>,
}

impl ProfileService {
    pub fn new(interactions: Arc<dyn InteractionStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            interactions,
            content,
        }
    }

    /// Aggregates a user's full interaction history into a behavior profile.
    ///
    /// A user with no interactions gets the well-defined empty profile, not
    /// an error. Profiles are recomputed on every call.
    pub async fn build_profile(&self, user_id: i64) -> AppResult<BehaviorProfile> {
        let interactions = self
            .interactions
            .history(user_id, HistoryFilter::default())
            .await?;

        if interactions.is_empty() {
            return Ok(BehaviorProfile::empty(user_id));
        }

        let mut view_count = 0u64;
        let mut like_count = 0u64;
        let mut comment_count = 0u64;
        let mut activity_periods = ActivityPeriods::default();
        let mut hour_counts = [0u64; 24];
        let mut weekday_counts = [0u64; 7];

        for interaction in &interactions {
            match interaction.kind {
                InteractionKind::View => view_count += 1,
                InteractionKind::Like => like_count += 1,
                InteractionKind::Comment => comment_count += 1,
            }

            let hour = interaction.created_at.hour();
            activity_periods.record(hour);
            hour_counts[hour as usize] += 1;
            weekday_counts[interaction.created_at.weekday().num_days_from_monday() as usize] += 1;
        }

        let posts = self.interacted_posts(user_id).await?;
        let average_content_length = if posts.is_empty() {
            0.0
        } else {
            posts
                .iter()
                .map(|p| p.content.chars().count() as f64)
                .sum::<f64>()
                / posts.len() as f64
        };

        let total_interactions = interactions.len() as u64;
        let profile = BehaviorProfile {
            user_id,
            total_interactions,
            view_count,
            like_count,
            comment_count,
            activity_periods,
            top_hours: top_indices(&hour_counts),
            top_weekdays: top_indices(&weekday_counts),
            average_content_length,
            top_categories: categories_for_posts(&posts),
            engagement_style: classify_engagement(total_interactions, like_count, comment_count),
            social: self.social_behavior(user_id, like_count, comment_count).await?,
        };

        tracing::debug!(
            user_id,
            total = profile.total_interactions,
            style = ?profile.engagement_style,
            "Behavior profile built"
        );

        Ok(profile)
    }

    /// The ranked interest categories for a user, derived from the posts
    /// they interacted with
    pub async fn interest_categories(&self, user_id: i64) -> AppResult<Vec<String>> {
        let posts = self.interacted_posts(user_id).await?;
        Ok(categories_for_posts(&posts))
    }

    /// Computes the dynamic weight for an interaction about to be recorded
    /// through the explicit tracking path.
    pub async fn preference_weight(
        &self,
        user_id: i64,
        kind: InteractionKind,
        post_id: i64,
        context: WeightContext,
    ) -> AppResult<f64> {
        let mut weight = kind.base_weight();

        if kind == InteractionKind::Like {
            let prior_likes = self
                .interactions
                .count_by_kind(user_id, InteractionKind::Like)
                .await?;
            if prior_likes < RARE_LIKER_THRESHOLD {
                weight += 0.5;
            }
        }

        if context
            .comment_length
            .is_some_and(|len| len > LONG_COMMENT_THRESHOLD)
        {
            weight += 0.5;
        }

        let since = Utc::now() - Duration::hours(24);
        if self
            .interactions
            .has_recent_with_post(user_id, post_id, since)
            .await?
        {
            weight *= REPEAT_INTERACTION_FACTOR;
        }

        Ok(clamp_weight(weight))
    }

    async fn interacted_posts(&self, user_id: i64) -> AppResult<Vec<Post>> {
        let post_ids = self.interactions.distinct_post_ids(user_id).await?;
        self.content.posts_by_ids(post_ids).await
    }

    async fn social_behavior(
        &self,
        user_id: i64,
        like_count: u64,
        comment_count: u64,
    ) -> AppResult<SocialBehavior> {
        let authored = self.content.comments_by_author(user_id).await?;

        let average_comment_length = if authored.is_empty() {
            0.0
        } else {
            authored
                .iter()
                .map(|c| c.content.chars().count() as f64)
                .sum::<f64>()
                / authored.len() as f64
        };

        let likes_to_comments_ratio = if comment_count == 0 {
            like_count as f64
        } else {
            like_count as f64 / comment_count as f64
        };

        Ok(SocialBehavior {
            likes_to_comments_ratio,
            average_comment_length,
            responds_to_comments: authored.iter().any(|c| c.parent_id.is_some()),
        })
    }
}

/// Indices of the `TOP_N` largest counts, most frequent first.
/// Ties resolve to the lower index; zero counts never rank.
fn top_indices(counts: &[u64]) -> Vec<u32> {
    let mut indexed: Vec<(u32, u64)> = counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(index, &count)| (index as u32, count))
        .collect();

    indexed.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.into_iter().take(TOP_N).map(|(index, _)| index).collect()
}

/// Categories matched by the given posts, ranked by how many posts matched.
/// Ties keep the fixed table order.
fn categories_for_posts(posts: &[Post]) -> Vec<String> {
    let mut matched: Vec<(usize, &str, usize)> = Vec::new();

    for (order, (category, keywords)) in CATEGORY_KEYWORDS.iter().enumerate() {
        let count = posts
            .iter()
            .filter(|post| {
                let text = format!("{} {}", post.title, post.content).to_lowercase();
                keywords.iter().any(|keyword| text.contains(keyword))
            })
            .count();
        if count > 0 {
            matched.push((order, category, count));
        }
    }

    matched.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
    matched
        .into_iter()
        .take(TOP_N)
        .map(|(_, category, _)| category.to_string())
        .collect()
}

/// Engagement classification, evaluated in strict precedence order
fn classify_engagement(total: u64, likes: u64, comments: u64) -> EngagementStyle {
    if total > 100 {
        EngagementStyle::PowerUser
    } else if comments as f64 > likes as f64 * 0.3 {
        EngagementStyle::Active
    } else if likes > 20 {
        EngagementStyle::Casual
    } else {
        EngagementStyle::Lurker
    }
}
