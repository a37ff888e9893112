mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use repo_types::User;
pub use services::{DirectoryError, UserDirectory, UserUpdate};

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
