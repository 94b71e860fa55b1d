pub mod interaction;
pub mod post;
pub mod profile;
pub mod violation;

pub use interaction::{
    clamp_weight, HistoryFilter, Interaction, InteractionKind, NewInteraction, MAX_WEIGHT,
    MIN_WEIGHT,
};
pub use post::{Post, PostAnalytics, PostComment};
pub use profile::{
    ActivityPeriods, BehaviorProfile, EngagementStyle, SimilarUser, SocialBehavior,
};
pub use violation::{
    ContentType, NewViolation, NewViolationRule, ReviewStatus, Violation, ViolationMatch,
    ViolationRule,
};
