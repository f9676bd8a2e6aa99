//! 读写器清单。
//!
//! - GET /readers
//!
//! 每台读写器在列出时会尝试确保连接，状态报告为
//! connected / disconnected / error: <msg>。

use crate::AppState;
use crate::utils::response::blocking_task_failed;
use api_contract::{ReaderInfoDto, ReadersResponse};
use axum::{Json, extract::State, response::{IntoResponse, Response}};

pub async fn list_readers(State(state): State<AppState>) -> Response {
    let registry = state.registry;
    let result = tokio::task::spawn_blocking(move || {
        let mut readers = Vec::new();
        for (name, session) in registry.sessions() {
            let config = session.config();
            let (is_connected, connection_status) = session.connection_status();
            let notification_active = session.is_notification_active();

            readers.push(ReaderInfoDto {
                name,
                address: config.address.clone(),
                port: config.port,
                mode: config.mode.as_str().to_string(),
                antennas: config.antennas.clone(),
                antenna_mask: format!("0x{:02X}", config.antenna_mask()),
                is_connected,
                connection_status,
                notification_active,
                notification_port: if notification_active {
                    session.notification_port()
                } else {
                    None
                },
            });
        }
        readers
    })
    .await;

    match result {
        Ok(readers) => Json(ReadersResponse {
            success: true,
            reader_count: readers.len(),
            readers,
        })
        .into_response(),
        Err(_) => blocking_task_failed(),
    }
}
