use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::SimilarUser;
use crate::store::InteractionStore;

/// Default number of similar users returned
pub const DEFAULT_LIMIT: usize = 10;

/// Candidates must share at least this fraction of the target's post set
const MIN_OVERLAP_FRACTION: f64 = 0.1;

#[derive(Default)]
struct Candidate {
    shared_posts: HashSet<i64>,
    total_weight: f64,
}

/// Ranks other users by weighted co-interaction overlap with a target user
pub struct SimilarityService {
    interactions: Arc<dyn InteractionStore>,
}

impl SimilarityService {
    pub fn new(interactions: Arc<dyn InteractionStore>) -> Self {
        Self { interactions }
    }

    /// Finds users whose engagement overlaps the target's.
    ///
    /// Candidates need `max(1, floor(0.1 * |target posts|))` shared posts to
    /// qualify. Ranking is by shared-post count, then by summed interaction
    /// weight on those posts. The score normalizes that weight sum by the
    /// size of the target's post set.
    pub async fn find_similar(
        &self,
        user_id: i64,
        limit: Option<usize>,
    ) -> AppResult<Vec<SimilarUser>> {
        let target_posts = self.interactions.distinct_post_ids(user_id).await?;
        if target_posts.is_empty() {
            return Ok(Vec::new());
        }

        let target_count = target_posts.len();
        let others = self
            .interactions
            .for_posts_excluding(target_posts, user_id)
            .await?;

        let mut candidates: HashMap<i64, Candidate> = HashMap::new();
        for interaction in others {
            let candidate = candidates.entry(interaction.user_id).or_default();
            candidate.shared_posts.insert(interaction.post_id);
            candidate.total_weight += interaction.weight;
        }

        let threshold =
            (((target_count as f64) * MIN_OVERLAP_FRACTION).floor() as usize).max(1);

        let mut ranked: Vec<(usize, f64, i64)> = candidates
            .into_iter()
            .filter(|(_, c)| c.shared_posts.len() >= threshold)
            .map(|(candidate_id, c)| (c.shared_posts.len(), c.total_weight, candidate_id))
            .collect();

        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        ranked.truncate(limit.unwrap_or(DEFAULT_LIMIT));

        tracing::debug!(
            user_id,
            candidates = ranked.len(),
            threshold,
            "Similar users ranked"
        );

        Ok(ranked
            .into_iter()
            .map(|(common, total_weight, candidate_id)| SimilarUser {
                user_id: candidate_id,
                similarity_score: total_weight / target_count as f64,
                common_interactions: common as u64,
            })
            .collect())
    }
}
