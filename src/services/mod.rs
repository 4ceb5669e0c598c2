// Business logic services

pub mod account_service;
pub mod assignment_service;
pub mod dashboard_service;
pub mod event_service;
pub mod exercise_service;
pub mod identity_service;
pub mod message_service;
pub mod profile_service;
pub mod progress_service;
pub mod recommendation_service;
pub mod routine_service;
pub mod space_service;
pub mod stats_service;

pub use account_service::AccountService;
pub use assignment_service::AssignmentService;
pub use dashboard_service::DashboardService;
pub use event_service::EventService;
pub use exercise_service::ExerciseService;
pub use identity_service::{IdentityError, IdentityService};
pub use message_service::MessageService;
pub use profile_service::ProfileService;
pub use progress_service::ProgressService;
pub use recommendation_service::RecommendationService;
pub use routine_service::RoutineService;
pub use space_service::SpaceService;
pub use stats_service::StatsService;

use serde_json::Value;
use tracing::warn;

use crate::documents::{Collection, DocumentStore, DocumentStoreError};

/// Body of a mirrored document, or `None` when it is absent or the store
/// cannot be reached. Read paths never fail because of the mirror.
pub(crate) async fn mirror_body(store: &DocumentStore, collection: Collection, key: &str) -> Option<Value> {
    match store.find(collection, key).await {
        Ok(found) => found.map(|document| document.body),
        Err(DocumentStoreError::Disabled) => None,
        Err(e) => {
            warn!(collection = %collection, key, error = %e, "mirror lookup failed");
            None
        }
    }
}
