use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest},
        repo_types::SafeAccount,
    },
    validation::ValidJson,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/profile", get(get_profile).patch(update_profile))
        .route("/users/inactive", get(list_inactive))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

/// Unparseable ids get the same JSON error body as every other failure.
fn user_id(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

#[instrument(skip(state, principal, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<SafeAccount>)> {
    let account = state.accounts.create_by_admin(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[instrument(skip(state, principal))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> AppResult<Json<Vec<SafeAccount>>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let filter = query.into_filter()?;
    let accounts = state.accounts.list(&principal, filter).await?;
    Ok(Json(accounts))
}

#[instrument(skip(state, principal))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<SafeAccount>> {
    Ok(Json(state.accounts.profile(&principal).await?))
}

#[instrument(skip(state, principal, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> AppResult<Json<SafeAccount>> {
    Ok(Json(state.accounts.update_profile(&principal, payload).await?))
}

#[instrument(skip(state, principal))]
pub async fn list_inactive(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Vec<SafeAccount>>> {
    Ok(Json(state.accounts.inactive(&principal).await?))
}

#[instrument(skip(state, principal))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<SafeAccount>> {
    let id = user_id(id)?;
    Ok(Json(state.accounts.get(&principal, id).await?))
}

#[instrument(skip(state, principal, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> AppResult<Json<SafeAccount>> {
    let id = user_id(id)?;
    Ok(Json(state.accounts.update_by_admin(&principal, id, payload).await?))
}

#[instrument(skip(state, principal))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let id = user_id(id)?;
    state.accounts.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
