pub mod authorization;
pub mod hotness;
pub mod moderation;
pub mod profile;
pub mod recorder;
pub mod similarity;

pub use authorization::{Authorizer, Capability, PgAuthorizer, StaticAuthorizer};
pub use hotness::HotnessService;
pub use moderation::{DetectionOutcome, ModerationService, ScreenOutcome, BLOCKED_CONTENT_ID};
pub use profile::{ProfileService, WeightContext};
pub use recorder::{InteractionRecorder, RecordOutcome, RecorderHandle};
pub use similarity::SimilarityService;
