//! HTTP surface of the operations console
//!
//! JSON over HTTP; handlers surface caller mistakes as 4xx and storage
//! or transport failures as 500 with a short `{"error": ...}` body.

mod exec;
mod files;
mod health;
mod servers;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use crate::state::AppState;
use crate::ws;

/// Upload request body ceiling
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Builds the full application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/ws", get(ws::websocket_handler))
        .route(
            "/servers",
            get(servers::list_servers).post(servers::create_server),
        )
        .route(
            "/servers/{id}",
            get(servers::get_server)
                .put(servers::update_server)
                .delete(servers::delete_server),
        )
        .route("/servers/{id}/status", get(servers::server_status))
        .route("/servers/{id}/ssh/exec", post(exec::execute_command))
        .route(
            "/servers/{id}/files",
            get(files::list_files).delete(files::delete_entry),
        )
        .route("/servers/{id}/files/dir", post(files::create_directory))
        .route("/servers/{id}/files/upload", post(files::upload_file))
        .route("/servers/{id}/files/upload-many", post(files::upload_many))
        .route(
            "/servers/{id}/files/upload-folder",
            post(files::upload_folder),
        )
        .route("/servers/{id}/files/download", get(files::download_file))
        .route("/servers/{id}/files/rename", post(files::rename_entry))
        .route(
            "/servers/{id}/files/content",
            get(files::read_content).put(files::write_content),
        )
        .route("/servers/{id}/files/search", get(files::search_files))
        .route("/servers/{id}/files/du", get(files::dir_size))
        .route("/servers/{id}/files/chmod", post(files::change_permissions))
        .route("/servers/{id}/files/copy", post(files::copy_entry))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Builds a `{"error": message}` response with the given status
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
