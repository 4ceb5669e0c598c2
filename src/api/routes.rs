use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::admin::admin_routes;
use super::auth::auth_routes;
use super::dashboard::{dashboard_routes, report_routes};
use super::directory::directory_routes;
use super::events::event_routes;
use super::exercises::exercise_routes;
use super::health::health_check;
use super::messages::{message_routes, recommendation_routes};
use super::profile::profile_routes;
use super::progress::progress_routes;
use super::routines::routine_routes;
use super::spaces::{reservation_routes, space_routes};
use super::trainer::trainer_routes;
use super::AppState;
use crate::auth::{
    admin_only_middleware, cors_layer, jwt_auth_middleware, security_headers_layer, trainer_only_middleware,
};

pub fn create_routes(state: AppState) -> Router {
    // Everything below requires a valid access token.
    let protected = Router::new()
        .nest("/dashboard", dashboard_routes())
        .nest("/exercises", exercise_routes())
        .nest("/routines", routine_routes())
        .nest("/progress", progress_routes())
        .nest("/reports", report_routes())
        .nest("/profile", profile_routes())
        .nest("/messages", message_routes())
        .nest("/recommendations", recommendation_routes())
        .nest("/events", event_routes())
        .nest("/spaces", space_routes())
        .nest("/reservations", reservation_routes())
        .nest("/directory", directory_routes())
        .nest(
            "/trainer",
            trainer_routes().route_layer(middleware::from_fn(trainer_only_middleware)),
        )
        .nest(
            "/admin",
            admin_routes().route_layer(middleware::from_fn(admin_only_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(state.auth.clone(), jwt_auth_middleware));

    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .merge(protected);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
        .with_state(state)
}
