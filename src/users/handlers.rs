use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{CreateUserRequest, DeleteUserResponse, UpdateUserRequest, UpdateUserResponse},
        repo_types::User,
        services::{DirectoryError, UserDirectory, UserUpdate},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(directory, payload))]
pub async fn create_user(
    State(directory): State<UserDirectory>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(payload) = payload.map_err(rejected)?;
    let (Some(username), Some(email), Some(password)) = (
        present(payload.username),
        present(payload.email),
        present(payload.password),
    ) else {
        warn!("create user with missing fields");
        return Err(ApiError::BadRequest(
            "Username, email, and password are required.".into(),
        ));
    };

    match directory.add(&username, &email, &password).await {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "user created");
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(DirectoryError::DuplicateIdentity) => {
            warn!(%username, "username or email already exists");
            Err(ApiError::Conflict("Username or email already exists.".into()))
        }
        Err(e) => Err(failure(e, "Failed to add user.")),
    }
}

#[instrument(skip(directory))]
pub async fn get_user(
    State(directory): State<UserDirectory>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&raw_id)?;
    match directory.get_by_id(id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::NotFound("User not found.".into())),
        Err(e) => Err(failure(e, "Failed to get user.")),
    }
}

#[instrument(skip(directory, payload))]
pub async fn update_user(
    State(directory): State<UserDirectory>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateUserResponse>> {
    let id = parse_id(&raw_id)?;
    let Json(payload) = payload.map_err(rejected)?;
    let update = UserUpdate {
        email: present(payload.email),
        password: present(payload.password),
    };
    if update.email.is_none() && update.password.is_none() {
        warn!(user_id = id, "update with no fields");
        return Err(ApiError::BadRequest(
            "Email or password is required for update.".into(),
        ));
    }

    match directory.update(id, update).await {
        Ok(Some(outcome)) => Ok(Json(UpdateUserResponse {
            id: outcome.id,
            message: format!("User {} updated successfully.", outcome.id),
            changes: outcome.changes,
        })),
        Ok(None) => Err(ApiError::NotFound("User not found.".into())),
        Err(DirectoryError::DuplicateIdentity) => {
            warn!(user_id = id, "email already exists");
            Err(ApiError::Conflict("Email already exists.".into()))
        }
        Err(e) => Err(failure(e, "Failed to update user.")),
    }
}

#[instrument(skip(directory))]
pub async fn delete_user(
    State(directory): State<UserDirectory>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let id = parse_id(&raw_id)?;
    match directory.delete(id).await {
        Ok(Some(outcome)) => Ok(Json(DeleteUserResponse {
            id: outcome.id,
            message: format!("User {} deleted successfully.", outcome.id),
            deleted: outcome.deleted,
        })),
        Ok(None) => Err(ApiError::NotFound("User not found.".into())),
        Err(e) => Err(failure(e, "Failed to delete user.")),
    }
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

fn rejected(rejection: JsonRejection) -> ApiError {
    warn!(status = %rejection.status(), "unreadable request body");
    ApiError::from(rejection)
}

fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest("User ID must be a number.".into()))
}

/// Maps whatever the handler did not match explicitly. Input errors keep their
/// message; everything else is logged and hidden behind `msg`.
fn failure(err: DirectoryError, msg: &str) -> ApiError {
    match err {
        DirectoryError::InvalidArgument(reason) => ApiError::BadRequest(reason.into()),
        DirectoryError::DuplicateIdentity => {
            ApiError::Conflict("Username or email already exists.".into())
        }
        other => {
            debug_assert!(other.is_unexpected());
            error!(error = %other, "{}", msg);
            ApiError::Internal(msg.into())
        }
    }
}
