use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A forum post with its engagement counters and derived hotness score.
///
/// The counters are monotonic and owned by the CRUD layer; `hotness_score`
/// is recomputed from them (overwritten, never accumulated).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub hotness_score: f64,
    pub created_at: DateTime<Utc>,
}

/// A threaded comment on a post. `parent_id` is set for replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostComment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Per-post interaction analytics: kind totals plus an hourly histogram
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostAnalytics {
    pub post_id: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    /// Interaction counts bucketed by hour of day (0..24)
    pub hourly_distribution: Vec<i64>,
}

impl PostAnalytics {
    /// An empty analytics view for a post with no recorded interactions
    pub fn empty(post_id: i64) -> Self {
        Self {
            post_id,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            hourly_distribution: vec![0; 24],
        }
    }
}
