use axum::extract::FromRef;

use crate::db::Store;
use crate::users::services::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub directory: UserDirectory,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            directory: UserDirectory::new(store),
        }
    }
}

impl FromRef<AppState> for UserDirectory {
    fn from_ref(state: &AppState) -> Self {
        state.directory.clone()
    }
}
