use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::handlers::bulletin_handlers::{get_bulletin, list_bulletins, search_bulletins};
use crate::handlers::service_handler::{create_summary, poll_job};
use crate::state::AppState;

pub fn bulletin_routes(state: AppState) -> Router {
    Router::new()
        .route("/bulletins", get(list_bulletins))
        .route("/bulletins/{number}", get(get_bulletin))
        .route("/search", get(search_bulletins))
        .route("/summaries", post(create_summary))
        .route("/jobs/{id}", get(poll_job))
        .layer(Extension(state))
}
