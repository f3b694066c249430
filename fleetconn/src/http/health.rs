//! Health and readiness endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::state::AppState;

/// Renders an uptime as `1d 2h 3m`-style text
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = if state.registry.ping().await.is_ok() {
        "ok"
    } else {
        "error"
    };
    let status = if database == "ok" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(json!({
        "status": status,
        "uptime": format_uptime(state.started_at.elapsed().as_secs()),
        "database": database,
        "timestamp": chrono::Utc::now().timestamp(),
    }))
    .into_response()
}

/// GET /ready
pub async fn ready_check(State(state): State<AppState>) -> Response {
    if state.registry.ping().await.is_ok() {
        Json(json!({ "ready": true })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime_minutes() {
        assert_eq!(format_uptime(0), "0m");
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(125), "2m");
    }

    #[test]
    fn test_format_uptime_hours() {
        assert_eq!(format_uptime(3660), "1h 1m");
    }

    #[test]
    fn test_format_uptime_days() {
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }
}
