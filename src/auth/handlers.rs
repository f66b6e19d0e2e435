use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::dto::{LoginRequest, LoginResponse},
    error::AppResult,
    state::AppState,
    users::{dto::CreateUserRequest, repo_types::SafeAccount},
    validation::ValidJson,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<SafeAccount>)> {
    let account = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let res = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(res))
}
