use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound of the interaction weight invariant
pub const MIN_WEIGHT: f64 = 0.0;
/// Upper bound of the interaction weight invariant
pub const MAX_WEIGHT: f64 = 10.0;

/// Kind of engagement a user had with a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Like,
    Comment,
}

impl InteractionKind {
    /// Default weight recorded for this kind when the caller supplies none
    pub fn base_weight(&self) -> f64 {
        match self {
            InteractionKind::View => 0.5,
            InteractionKind::Like => 2.0,
            InteractionKind::Comment => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Comment => "comment",
        }
    }

    /// Parses the storage/wire representation. Returns `None` for unknown kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(InteractionKind::View),
            "like" => Some(InteractionKind::Like),
            "comment" => Some(InteractionKind::Comment),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded engagement of one user with one post. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub kind: InteractionKind,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// Interaction awaiting persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub user_id: i64,
    pub post_id: i64,
    pub kind: InteractionKind,
    pub weight: f64,
}

/// Filters for interaction-history queries
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub kind: Option<InteractionKind>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Clamps a weight into the [0, 10] invariant
pub fn clamp_weight(weight: f64) -> f64 {
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_weights() {
        assert_eq!(InteractionKind::View.base_weight(), 0.5);
        assert_eq!(InteractionKind::Like.base_weight(), 2.0);
        assert_eq!(InteractionKind::Comment.base_weight(), 3.0);
    }

    #[test]
    fn test_parse_round_trip() {
        for kind in [
            InteractionKind::View,
            InteractionKind::Like,
            InteractionKind::Comment,
        ] {
            assert_eq!(InteractionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(InteractionKind::parse("share"), None);
    }

    #[test]
    fn test_clamp_weight_bounds() {
        assert_eq!(clamp_weight(-1.0), 0.0);
        assert_eq!(clamp_weight(4.2), 4.2);
        assert_eq!(clamp_weight(25.0), 10.0);
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&InteractionKind::Like).unwrap();
        assert_eq!(json, r#""like""#);

        let parsed: InteractionKind = serde_json::from_str(r#""comment""#).unwrap();
        assert_eq!(parsed, InteractionKind::Comment);
    }
}
