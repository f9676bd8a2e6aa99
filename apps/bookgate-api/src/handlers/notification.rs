//! 通知模式端点。
//!
//! - POST /notification/start/{name}（已激活时 400）
//! - POST /notification/stop/{name}（未激活时 404）
//! - GET  /notification/events/{name}（取走式读取，未激活时 404）
//! - GET  /notification/status

use crate::AppState;
use crate::utils::response::{
    bad_request, blocking_task_failed, event_to_dto, not_found, operation_failed,
    reader_not_found,
};
use api_contract::{
    MessageResponse, NotificationEventsResponse, NotificationSessionDto,
    NotificationStartResponse, NotificationStatusResponse,
};
use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

pub async fn start_notification(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    if session.is_notification_active() {
        return bad_request("Notification mode already running for this reader");
    }

    let port = state.registry.allocate_listener_port();
    let result = tokio::task::spawn_blocking(move || session.start_notification(port)).await;

    match result {
        Ok(Ok(true)) => Json(NotificationStartResponse {
            success: true,
            message: "Notification mode started".to_string(),
            port,
            reader_name: name,
        })
        .into_response(),
        Ok(Ok(false)) => bad_request("Notification mode already running for this reader"),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}

pub async fn stop_notification(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    if !session.is_notification_active() {
        return not_found(format!("No active notification session for reader: {name}"));
    }

    let result = tokio::task::spawn_blocking(move || session.stop_notification()).await;

    match result {
        Ok(Ok(true)) => Json(MessageResponse::new("Notification mode stopped")).into_response(),
        Ok(Ok(false)) => not_found(format!("No active notification session for reader: {name}")),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}

pub async fn notification_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let Some(session) = state.registry.get(&name) else {
        return not_found(format!("No active notification session for reader: {name}"));
    };
    if !session.is_notification_active() {
        return not_found(format!("No active notification session for reader: {name}"));
    }

    let result = tokio::task::spawn_blocking(move || {
        let events = session.poll_events();
        let is_connected = session.listener_peer_connected();
        (events, is_connected)
    })
    .await;

    match result {
        Ok((events, is_connected)) => {
            let events: Vec<_> = events.into_iter().map(event_to_dto).collect();
            Json(NotificationEventsResponse {
                success: true,
                reader_name: name,
                event_count: events.len(),
                is_connected,
                events,
            })
            .into_response()
        }
        Err(_) => blocking_task_failed(),
    }
}

pub async fn notification_status(State(state): State<AppState>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let mut sessions = Vec::new();
        for (name, session) in state.registry.sessions() {
            if session.is_notification_active() {
                sessions.push(NotificationSessionDto {
                    reader_name: name,
                    port: session.notification_port().unwrap_or_default(),
                    is_connected: session.listener_peer_connected(),
                    queued_events: session.queued_event_count(),
                });
            }
        }
        sessions
    })
    .await;

    match result {
        Ok(sessions) => Json(NotificationStatusResponse {
            success: true,
            active_sessions: sessions.len(),
            sessions,
        })
        .into_response(),
        Err(_) => blocking_task_failed(),
    }
}
