//! Interactive command execution over the pooled session
//!
//! Sessions are single-shot, so the illusion of a stateful shell comes
//! from prefixing each command with `cd <cwd> &&` and re-probing `pwd`
//! after a successful `cd`. The session's working directory is mutated
//! nowhere else.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use fleetconn_core::models::ExecRequest;
use fleetconn_core::registry::RegistryError;

use super::error_response;
use crate::state::AppState;

/// Wraps a caller command with the session's working directory
fn wrap_with_cwd(cwd: &str, command: &str) -> String {
    if cwd.is_empty() {
        command.to_string()
    } else {
        format!("cd {cwd} && {command}")
    }
}

/// Returns true when the trimmed command starts a directory change
fn is_cd_command(command: &str) -> bool {
    command.trim_start().starts_with("cd ")
}

/// Builds the follow-up probe that resolves the new working directory
fn pwd_probe(cwd: &str, command: &str) -> String {
    if cwd.is_empty() {
        format!("{command} && pwd")
    } else {
        format!("cd {cwd} && {command} && pwd")
    }
}

/// POST /servers/{id}/ssh/exec
pub async fn execute_command(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<ExecRequest>,
) -> Response {
    if req.command.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Command is required");
    }

    let server = match state.registry.get(id).await {
        Ok(server) => server,
        Err(RegistryError::NotFound(_)) => {
            return error_response(StatusCode::NOT_FOUND, "Server not found");
        }
        Err(e) => {
            tracing::error!(%e, "Failed to fetch server");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch server");
        }
    };

    let Ok(password) = state.vault.decrypt(&server.password) else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to decrypt credentials",
        );
    };

    let session = match state.ssh_pool.acquire(&server, &password).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(server_id = id, %e, "Failed to connect to server");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to connect to server",
            );
        }
    };

    let cwd = session.current_dir().await;
    let full_command = wrap_with_cwd(&cwd, &req.command);

    tracing::info!(server_id = id, command = %full_command, "Executing command");
    let result = session.execute(&full_command).await;

    if result.is_ok() && is_cd_command(&req.command) {
        let probe = pwd_probe(&cwd, &req.command);
        if let Ok(new_dir) = session.execute(&probe).await {
            session.set_current_dir(new_dir.trim().to_string()).await;
        }
    }

    match result {
        Ok(output) => {
            let lines: Vec<String> = output.trim().split('\n').map(String::from).collect();
            Json(json!({
                "output": output,
                "lines": lines,
                "command": req.command,
                "currentDir": session.current_dir().await,
            }))
            .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Command failed", "detail": e.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_without_cwd() {
        assert_eq!(wrap_with_cwd("", "ls -la"), "ls -la");
    }

    #[test]
    fn test_wrap_with_cwd() {
        assert_eq!(wrap_with_cwd("/var/log", "ls"), "cd /var/log && ls");
    }

    #[test]
    fn test_is_cd_command() {
        assert!(is_cd_command("cd /tmp"));
        assert!(is_cd_command("  cd .."));
        assert!(!is_cd_command("echo cd "));
        assert!(!is_cd_command("cdr"));
        assert!(!is_cd_command("cd"));
    }

    #[test]
    fn test_pwd_probe_without_cwd() {
        assert_eq!(pwd_probe("", "cd /tmp"), "cd /tmp && pwd");
    }

    #[test]
    fn test_pwd_probe_with_cwd() {
        assert_eq!(
            pwd_probe("/home/ops", "cd logs"),
            "cd /home/ops && cd logs && pwd"
        );
    }
}
