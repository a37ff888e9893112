use serde::{Deserialize, Serialize};

/// Request body for `POST /users`. Fields are optional so that a missing one
/// becomes a 400 from the handler instead of a JSON rejection.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for `PUT /users/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateUserResponse {
    pub id: i64,
    pub message: String,
    pub changes: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    pub id: i64,
    pub message: String,
    pub deleted: u64,
}
