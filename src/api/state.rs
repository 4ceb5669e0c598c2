use sqlx::PgPool;

use crate::auth::AuthService;
use crate::config::{AppConfig, DocumentStoreConfig};
use crate::documents::{DocumentStore, Outbox, OutboxRelay};
use crate::services::{
    AccountService, AssignmentService, DashboardService, EventService, ExerciseService, IdentityError,
    IdentityService, MessageService, ProfileService, ProgressService, RecommendationService, RoutineService,
    SpaceService, StatsService,
};

/// Everything a handler can reach. Cloning is cheap: services hold pools
/// and shared handles.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth: AuthService,
    pub identity: IdentityService,
    pub stats: StatsService,
    pub exercises: ExerciseService,
    pub routines: RoutineService,
    pub progress: ProgressService,
    pub assignments: AssignmentService,
    pub recommendations: RecommendationService,
    pub messages: MessageService,
    pub events: EventService,
    pub spaces: SpaceService,
    pub profiles: ProfileService,
    pub accounts: AccountService,
    pub dashboards: DashboardService,
    pub store: DocumentStore,
    pub relay: OutboxRelay,
}

impl AppState {
    pub fn new(
        db: PgPool,
        institutional_db: PgPool,
        institutional_schema: &str,
        store: DocumentStore,
        config: &AppConfig,
        documents: &DocumentStoreConfig,
    ) -> Result<Self, IdentityError> {
        let outbox = Outbox::new();
        let identity = IdentityService::new(institutional_db, institutional_schema)?;
        let relay = OutboxRelay::new(db.clone(), store.clone(), outbox.clone(), documents);

        let auth = AuthService::new(
            db.clone(),
            &config.jwt_secret,
            identity.clone(),
            outbox.clone(),
            &config.institutional_email_domain,
        );
        let stats = StatsService::new(db.clone());
        let exercises = ExerciseService::new(db.clone(), store.clone(), outbox.clone());
        let routines = RoutineService::new(db.clone(), outbox.clone());
        let progress = ProgressService::new(db.clone(), store.clone(), outbox.clone());
        let assignments = AssignmentService::new(db.clone(), outbox.clone());
        let recommendations = RecommendationService::new(db.clone(), outbox);
        let messages = MessageService::new(db.clone());
        let events = EventService::new(db.clone());
        let spaces = SpaceService::new(db.clone());
        let profiles = ProfileService::new(db.clone());
        let accounts = AccountService::new(db.clone());

        let dashboards = DashboardService::new(
            db.clone(),
            identity.clone(),
            stats.clone(),
            routines.clone(),
            progress.clone(),
            assignments.clone(),
            recommendations.clone(),
            messages.clone(),
            accounts.clone(),
            events.clone(),
            spaces.clone(),
            relay.clone(),
        );

        Ok(Self {
            db,
            auth,
            identity,
            stats,
            exercises,
            routines,
            progress,
            assignments,
            recommendations,
            messages,
            events,
            spaces,
            profiles,
            accounts,
            dashboards,
            store,
            relay,
        })
    }
}
