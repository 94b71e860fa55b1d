use serde::{Deserialize, Serialize};

/// Coarse classification of a user's interaction volume and shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStyle {
    Lurker,
    Casual,
    Active,
    PowerUser,
}

/// Interaction counts bucketed by part of day.
///
/// Hour boundaries are inclusive: morning 6-11, afternoon 12-17,
/// evening 18-23, night 0-5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPeriods {
    pub morning: u64,
    pub afternoon: u64,
    pub evening: u64,
    pub night: u64,
}

impl ActivityPeriods {
    /// Buckets one interaction by its hour of day
    pub fn record(&mut self, hour: u32) {
        match hour {
            6..=11 => self.morning += 1,
            12..=17 => self.afternoon += 1,
            18..=23 => self.evening += 1,
            _ => self.night += 1,
        }
    }
}

/// Ratios describing how a user participates in discussions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialBehavior {
    /// likes / comments; falls back to the like count when comments = 0
    pub likes_to_comments_ratio: f64,
    /// Average character length of the user's own authored comments
    pub average_comment_length: f64,
    /// True when the user has authored at least one reply
    pub responds_to_comments: bool,
}

/// Behavioral profile aggregated from a user's interaction history.
///
/// Recomputed on demand; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub user_id: i64,
    pub total_interactions: u64,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub activity_periods: ActivityPeriods,
    /// Top 3 hours of day by interaction frequency, most frequent first
    pub top_hours: Vec<u32>,
    /// Top 3 weekdays (0 = Monday) by interaction frequency
    pub top_weekdays: Vec<u32>,
    /// Average character length of posts the user interacted with
    pub average_content_length: f64,
    pub top_categories: Vec<String>,
    pub engagement_style: EngagementStyle,
    pub social: SocialBehavior,
}

impl BehaviorProfile {
    /// The well-defined profile for a user with no recorded interactions
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            total_interactions: 0,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            activity_periods: ActivityPeriods::default(),
            top_hours: Vec::new(),
            top_weekdays: Vec::new(),
            average_content_length: 0.0,
            top_categories: Vec::new(),
            engagement_style: EngagementStyle::Lurker,
            social: SocialBehavior::default(),
        }
    }
}

/// One ranked entry from the similar-user search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarUser {
    pub user_id: i64,
    /// Sum of the candidate's weights on shared posts, normalized by the
    /// size of the target's post set
    pub similarity_score: f64,
    /// Number of distinct posts both users interacted with
    pub common_interactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_period_boundaries() {
        let mut periods = ActivityPeriods::default();
        for hour in [6, 11] {
            periods.record(hour);
        }
        for hour in [12, 17] {
            periods.record(hour);
        }
        for hour in [18, 23] {
            periods.record(hour);
        }
        for hour in [0, 5] {
            periods.record(hour);
        }

        assert_eq!(periods.morning, 2);
        assert_eq!(periods.afternoon, 2);
        assert_eq!(periods.evening, 2);
        assert_eq!(periods.night, 2);
    }

    #[test]
    fn test_empty_profile_is_lurker() {
        let profile = BehaviorProfile::empty(7);
        assert_eq!(profile.user_id, 7);
        assert_eq!(profile.total_interactions, 0);
        assert_eq!(profile.engagement_style, EngagementStyle::Lurker);
        assert_eq!(profile.activity_periods, ActivityPeriods::default());
    }

    #[test]
    fn test_engagement_style_serde_snake_case() {
        let json = serde_json::to_string(&EngagementStyle::PowerUser).unwrap();
        assert_eq!(json, r#""power_user""#);
    }
}
