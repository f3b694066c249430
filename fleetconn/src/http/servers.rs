//! Fleet CRUD handlers
//!
//! Creating a host encrypts its password and starts a monitoring worker;
//! updating connection-relevant fields restarts the worker; deleting
//! stops the worker before the row goes away.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use fleetconn_core::models::{
    ConnectionKind, CreateServerRequest, ServerDto, ServerStatus, ServerSys, UpdateServerRequest,
};
use fleetconn_core::registry::{NewServer, RegistryError};

use super::error_response;
use crate::state::AppState;

/// GET /servers
pub async fn list_servers(State(state): State<AppState>) -> Response {
    match state.registry.list().await {
        Ok(servers) => {
            let dtos: Vec<ServerDto> = servers.iter().map(|s| s.to_dto()).collect();
            let total = dtos.len();
            Json(json!({ "servers": dtos, "total": total })).into_response()
        }
        Err(e) => {
            tracing::error!(%e, "Failed to fetch servers");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch servers")
        }
    }
}

/// GET /servers/{id}
pub async fn get_server(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    match state.registry.get(id).await {
        Ok(server) => Json(server.to_dto()).into_response(),
        Err(RegistryError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Server not found")
        }
        Err(e) => {
            tracing::error!(%e, "Failed to fetch server");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch server")
        }
    }
}

/// POST /servers
pub async fn create_server(
    State(state): State<AppState>,
    Json(req): Json<CreateServerRequest>,
) -> Response {
    if req.ip_address.is_empty() || req.password.is_empty() || req.username.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "ip_address, password and username are required",
        );
    }

    let Ok(encrypted) = state.vault.encrypt(&req.password) else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encrypt password",
        );
    };

    let new_server = NewServer {
        ip_address: req.ip_address,
        password: encrypted,
        port: req.port.filter(|p| !p.is_empty()).unwrap_or_else(|| "22".to_string()),
        sys: req.sys.unwrap_or(ServerSys::Linux),
        connection: req.connection.unwrap_or(ConnectionKind::Ssh),
        username: req.username,
        name: req.name,
    };

    let server = match state.registry.insert(new_server).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(%e, "Failed to create server");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create server");
        }
    };

    state.monitor.add(&server, &req.password).await;

    (StatusCode::CREATED, Json(server.to_dto())).into_response()
}

/// PUT /servers/{id}
pub async fn update_server(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<UpdateServerRequest>,
) -> Response {
    let mut server = match state.registry.get(id).await {
        Ok(server) => server,
        Err(RegistryError::NotFound(_)) => {
            return error_response(StatusCode::NOT_FOUND, "Server not found");
        }
        Err(e) => {
            tracing::error!(%e, "Failed to fetch server");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch server");
        }
    };

    if let Some(ip_address) = &req.ip_address {
        server.ip_address = ip_address.clone();
    }
    if let Some(password) = &req.password {
        let Ok(encrypted) = state.vault.encrypt(password) else {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encrypt password",
            );
        };
        server.password = encrypted;
    }
    if let Some(port) = &req.port {
        server.port = port.clone();
    }
    if let Some(sys) = req.sys {
        server.sys = sys;
    }
    if let Some(connection) = req.connection {
        server.connection = connection;
    }
    if let Some(username) = &req.username {
        server.username = username.clone();
    }
    if let Some(name) = &req.name {
        server.name = name.clone();
    }

    if let Err(e) = state.registry.update(&server).await {
        tracing::error!(%e, "Failed to update server");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update server");
    }

    if req.requires_worker_restart() {
        state.monitor.remove(id).await;
        let password = match &req.password {
            Some(password) => password.clone(),
            None => match state.vault.decrypt(&server.password) {
                Ok(password) => password,
                Err(e) => {
                    tracing::error!(server_id = id, %e, "Failed to decrypt stored password");
                    return Json(server.to_dto()).into_response();
                }
            },
        };
        state.monitor.add(&server, &password).await;
    }

    Json(server.to_dto()).into_response()
}

/// DELETE /servers/{id}
pub async fn delete_server(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    state.monitor.remove(id).await;

    match state.registry.soft_delete(id).await {
        Ok(()) => Json(json!({ "message": "Server deleted" })).into_response(),
        Err(RegistryError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Server not found")
        }
        Err(e) => {
            tracing::error!(%e, "Failed to delete server");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete server")
        }
    }
}

/// GET /servers/{id}/status
pub async fn server_status(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    let status: ServerStatus = match state.registry.get(id).await {
        Ok(server) => server.status,
        Err(RegistryError::NotFound(_)) => {
            return error_response(StatusCode::NOT_FOUND, "Server not found");
        }
        Err(e) => {
            tracing::error!(%e, "Failed to fetch server");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch server");
        }
    };

    Json(json!({
        "server_id": id,
        "status": status,
        "is_monitoring": state.monitor.status(id).await,
    }))
    .into_response()
}
