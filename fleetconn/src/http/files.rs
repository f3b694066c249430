//! Remote file management handlers over the SFTP pool

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use fleetconn_core::models::{
    ChmodRequest, ContentRequest, CopyRequest, DeleteRequest, DirectoryRequest, RenameRequest,
};
use fleetconn_core::registry::RegistryError;
use fleetconn_core::sftp::{base_name, join_remote, FileChannel};

use super::error_response;
use crate::state::AppState;

/// Text read ceiling enforced by the content endpoint
const MAX_TEXT_READ_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    path: Option<String>,
    pattern: Option<String>,
}

/// Resolves the file channel for a host, mapping failures to responses
async fn file_channel(state: &AppState, id: u32) -> Result<Arc<FileChannel>, Response> {
    let server = match state.registry.get(id).await {
        Ok(server) => server,
        Err(RegistryError::NotFound(_)) => {
            return Err(error_response(StatusCode::NOT_FOUND, "Server not found"));
        }
        Err(e) => {
            tracing::error!(%e, "Failed to fetch server");
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch server",
            ));
        }
    };

    let Ok(password) = state.vault.decrypt(&server.password) else {
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to decrypt credentials",
        ));
    };

    state.sftp_pool.acquire(&server, &password).await.map_err(|e| {
        tracing::error!(server_id = id, %e, "Failed to connect to server");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to connect to server",
        )
    })
}

/// Picks the remote path for a single-file upload: an explicit file path
/// wins, a directory path gets the client file name appended
fn resolve_upload_path(form_path: &str, filename: &str) -> String {
    if form_path.is_empty() {
        return format!("/{filename}");
    }
    if base_name(form_path).contains('.') {
        return form_path.to_string();
    }
    join_remote(form_path, filename)
}

/// Picks the remote path for one entry of a folder upload; a missing or
/// empty relative path falls back to the bare file name
fn resolve_relative_path(base: &str, relative: Option<&str>, filename: &str) -> String {
    match relative {
        Some(rel) if !rel.is_empty() => join_remote(base, rel),
        _ => join_remote(base, filename),
    }
}

/// GET /servers/{id}/files
pub async fn list_files(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<PathQuery>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };
    let path = query.path.unwrap_or_else(|| "/".to_string());

    match channel.list(&path).await {
        Ok(files) => {
            let total = files.len();
            Json(json!({ "path": path, "files": files, "total": total })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /servers/{id}/files/dir
pub async fn create_directory(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<DirectoryRequest>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    match channel.mkdir_p(&req.path).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Directory created", "path": req.path })),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /servers/{id}/files/upload
pub async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    mut multipart: Multipart,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut form_path = String::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let Ok(bytes) = field.bytes().await else {
                    return error_response(StatusCode::BAD_REQUEST, "Invalid form data");
                };
                file = Some((filename, bytes.to_vec()));
            }
            Some("path") => {
                form_path = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    let Some((filename, data)) = file else {
        return error_response(StatusCode::BAD_REQUEST, "No file provided");
    };

    let remote_path = resolve_upload_path(&form_path, &filename);
    let size = data.len();

    match channel.upload(&remote_path, data).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "File uploaded",
                "path": remote_path,
                "filename": filename,
                "size": size,
            })),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /servers/{id}/files/upload-many
pub async fn upload_many(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    mut multipart: Multipart,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut base_path = String::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("files") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => files.push((filename, bytes.to_vec())),
                    Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid form data"),
                }
            }
            Some("path") => {
                base_path = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No files provided");
    }
    if base_path.is_empty() {
        base_path = "/".to_string();
    }

    let total = files.len();
    let mut uploaded = Vec::new();
    let mut failed = Vec::new();

    for (filename, data) in files {
        let remote_path = join_remote(&base_path, &filename);
        match channel.upload(&remote_path, data).await {
            Ok(()) => uploaded.push(filename),
            Err(_) => failed.push(filename),
        }
    }

    Json(json!({ "uploaded": uploaded, "failed": failed, "total": total })).into_response()
}

/// POST /servers/{id}/files/upload-folder
pub async fn upload_folder(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    mut multipart: Multipart,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut relative_paths: Vec<String> = Vec::new();
    let mut base_path = String::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("files") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => files.push((filename, bytes.to_vec())),
                    Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid form data"),
                }
            }
            Some("paths") => {
                relative_paths.push(field.text().await.unwrap_or_default());
            }
            Some("path") => {
                base_path = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No files provided");
    }
    if base_path.is_empty() {
        base_path = "/".to_string();
    }

    let total = files.len();
    let mut uploaded = Vec::new();
    let mut failed = Vec::new();

    for (index, (filename, data)) in files.into_iter().enumerate() {
        let relative = relative_paths.get(index).map(String::as_str);
        let remote_path = resolve_relative_path(&base_path, relative, &filename);
        match channel.upload(&remote_path, data).await {
            Ok(()) => uploaded.push(remote_path),
            Err(_) => failed.push(filename),
        }
    }

    Json(json!({ "uploaded": uploaded, "failed": failed, "total": total })).into_response()
}

/// GET /servers/{id}/files/download
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<PathQuery>,
) -> Response {
    let Some(path) = query.path.filter(|p| !p.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Path is required");
    };
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let entry = match channel.stat(&path).await {
        Ok(entry) => entry,
        Err(_) => return error_response(StatusCode::NOT_FOUND, "File not found"),
    };
    if entry.is_dir {
        return error_response(StatusCode::BAD_REQUEST, "Cannot download a directory");
    }

    match channel.download(&path).await {
        Ok(data) => (
            [
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", entry.name),
                ),
                (
                    header::CONTENT_TYPE,
                    "application/octet-stream".to_string(),
                ),
            ],
            data,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// DELETE /servers/{id}/files
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<DeleteRequest>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let entry = match channel.stat(&req.path).await {
        Ok(entry) => entry,
        Err(_) => return error_response(StatusCode::NOT_FOUND, "File not found"),
    };

    let result = if entry.is_dir {
        channel.rmdir(&req.path, req.recursive).await
    } else {
        channel.delete(&req.path).await
    };

    match result {
        Ok(()) => Json(json!({ "message": "Deleted successfully", "path": req.path }))
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /servers/{id}/files/rename
pub async fn rename_entry(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<RenameRequest>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    match channel.rename(&req.old_path, &req.new_path).await {
        Ok(()) => Json(json!({
            "message": "Renamed successfully",
            "old_path": req.old_path,
            "new_path": req.new_path,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /servers/{id}/files/content
pub async fn read_content(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<PathQuery>,
) -> Response {
    let Some(path) = query.path.filter(|p| !p.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Path is required");
    };
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let entry = match channel.stat(&path).await {
        Ok(entry) => entry,
        Err(_) => return error_response(StatusCode::NOT_FOUND, "File not found"),
    };
    if entry.size > MAX_TEXT_READ_BYTES {
        return error_response(StatusCode::BAD_REQUEST, "File too large");
    }

    match channel.read_text(&path).await {
        Ok(content) => Json(json!({
            "path": path,
            "content": content,
            "size": entry.size,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// PUT /servers/{id}/files/content
pub async fn write_content(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<ContentRequest>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    let size = req.content.len();
    match channel.write_text(&req.path, req.content).await {
        Ok(()) => Json(json!({
            "message": "File saved",
            "path": req.path,
            "size": size,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /servers/{id}/files/search
pub async fn search_files(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let Some(pattern) = query.pattern.filter(|p| !p.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Pattern is required");
    };
    let path = query.path.unwrap_or_else(|| "/".to_string());

    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    match channel.search(&path, &pattern).await {
        Ok(files) => {
            let total = files.len();
            Json(json!({
                "pattern": pattern,
                "path": path,
                "files": files,
                "total": total,
            }))
            .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /servers/{id}/files/du
pub async fn dir_size(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<PathQuery>,
) -> Response {
    let Some(path) = query.path.filter(|p| !p.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Path is required");
    };
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    match channel.dir_size(&path).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /servers/{id}/files/chmod
pub async fn change_permissions(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<ChmodRequest>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    match channel.chmod(&req.path, req.permission).await {
        Ok(()) => Json(json!({
            "message": "Permissions changed",
            "path": req.path,
            "permission": req.permission,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /servers/{id}/files/copy
pub async fn copy_entry(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<CopyRequest>,
) -> Response {
    let channel = match file_channel(&state, id).await {
        Ok(channel) => channel,
        Err(response) => return response,
    };

    match channel.copy(&req.source, &req.destination).await {
        Ok(()) => Json(json!({
            "message": "File copied",
            "source": req.source,
            "destination": req.destination,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_upload_path_defaults_to_root() {
        assert_eq!(resolve_upload_path("", "notes.txt"), "/notes.txt");
    }

    #[test]
    fn test_resolve_upload_path_keeps_explicit_file() {
        assert_eq!(
            resolve_upload_path("/srv/app/config.yaml", "ignored.txt"),
            "/srv/app/config.yaml"
        );
    }

    #[test]
    fn test_resolve_upload_path_joins_directory() {
        assert_eq!(
            resolve_upload_path("/srv/uploads", "report.pdf"),
            "/srv/uploads/report.pdf"
        );
    }

    #[test]
    fn test_resolve_relative_path_uses_parallel_entry() {
        assert_eq!(
            resolve_relative_path("/data", Some("project/src/main.rs"), "main.rs"),
            "/data/project/src/main.rs"
        );
    }

    #[test]
    fn test_resolve_relative_path_falls_back_to_filename() {
        assert_eq!(
            resolve_relative_path("/data", None, "main.rs"),
            "/data/main.rs"
        );
        assert_eq!(
            resolve_relative_path("/data", Some(""), "main.rs"),
            "/data/main.rs"
        );
    }
}
