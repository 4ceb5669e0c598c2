use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use super::{ApiError, AppState};
use crate::auth::{
    jwt_auth_middleware, AccountInfo, AuthError, AuthResponse, LoginRequest, MessageResponse,
    RefreshTokenRequest, TokenResponse, UserSession,
};
use crate::documents::ClientInfo;

/// Authentication routes
pub fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route(
            "/me",
            get(me).route_layer(middleware::from_fn_with_state(state.auth.clone(), jwt_auth_middleware)),
        )
}

/// Login with institutional or local credentials
#[tracing::instrument(skip(state, client, request))]
async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = state.auth.login(request, client).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new access token
#[tracing::instrument(skip(state, request))]
async fn refresh_token(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<RefreshTokenRequest>, ApiError>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = state.auth.refresh_token(request).await?;
    Ok(Json(response))
}

/// Revoke the presented access token and every refresh token of the account
#[tracing::instrument(skip(state, bearer))]
async fn logout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::MissingAuthHeader)?;
    let response = state.auth.logout(bearer.token()).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, session), fields(account_id = %session.account_id))]
async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<AccountInfo>, AuthError> {
    Ok(Json(state.auth.me(session.account_id).await?))
}
