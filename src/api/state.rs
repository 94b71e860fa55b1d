use std::sync::Arc;
use std::time::Duration;

use crate::services::{
    Authorizer, HotnessService, InteractionRecorder, ModerationService, ProfileService,
    RecorderHandle, SimilarityService,
};
use crate::store::{ContentStore, InteractionStore, ViolationStore};

/// Shared application state: the core services, constructed once per process
/// and injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<InteractionRecorder>,
    pub interactions: Arc<dyn InteractionStore>,
    pub profiles: Arc<ProfileService>,
    pub similarity: Arc<SimilarityService>,
    pub hotness: Arc<HotnessService>,
    pub moderation: Arc<ModerationService>,
}

impl AppState {
    /// Wires the services over the given stores. Also returns the handle
    /// used to flush the interaction writer on shutdown.
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        content: Arc<dyn ContentStore>,
        violations: Arc<dyn ViolationStore>,
        authorizer: Arc<dyn Authorizer>,
        debounce_window: Duration,
    ) -> (Self, RecorderHandle) {
        let (recorder, recorder_handle) =
            InteractionRecorder::new(interactions.clone(), debounce_window);

        let state = Self {
            recorder: Arc::new(recorder),
            interactions: interactions.clone(),
            profiles: Arc::new(ProfileService::new(interactions.clone(), content.clone())),
            similarity: Arc::new(SimilarityService::new(interactions)),
            hotness: Arc::new(HotnessService::new(content)),
            moderation: Arc::new(ModerationService::new(violations, authorizer)),
        };

        (state, recorder_handle)
    }
}
