use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::Post;
use crate::store::ContentStore;

/// Gravity exponent: how fast engagement decays with age
pub const GRAVITY: f64 = 1.8;

/// Computes the decaying popularity score for a set of engagement counters.
///
/// `score = (likes*2 + comments*3 + views*0.1) / (age_hours + 2)^1.8`
///
/// Negative ages (clock skew) are clamped to zero.
pub fn score(likes: i64, comments: i64, views: i64, age_hours: f64) -> f64 {
    let age = age_hours.max(0.0);
    let engagement = likes as f64 * 2.0 + comments as f64 * 3.0 + views as f64 * 0.1;
    engagement / (age + 2.0).powf(GRAVITY)
}

/// Scores a post from its current counters and age at `now`
pub fn score_post(post: &Post, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - post.created_at).num_milliseconds() as f64 / 3_600_000.0;
    score(
        post.like_count,
        post.comment_count,
        post.view_count,
        age_hours,
    )
}

/// Recomputes and overwrites the stored hotness score of posts.
///
/// Recomputation is idempotent and cheap: a missed update self-heals on the
/// next qualifying event, so failures are only logged.
pub struct HotnessService {
    content: Arc<dyn ContentStore>,
}

impl HotnessService {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    /// Loads the post, scores it at the current instant, and overwrites the
    /// stored score
    pub async fn recompute(&self, post_id: i64) -> AppResult<f64> {
        let post = self
            .content
            .post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

        let score = score_post(&post, Utc::now());
        self.content.update_hotness(post_id, score).await?;

        tracing::debug!(post_id, score, "Hotness score recomputed");

        Ok(score)
    }

    /// Recomputes off the request path. The triggering event must not wait
    /// on, or fail because of, the score update.
    pub fn recompute_in_background(self: &Arc<Self>, post_id: i64) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.recompute(post_id).await {
                tracing::warn!(post_id, error = %e, "Background hotness recompute failed");
            }
        });
    }
}
