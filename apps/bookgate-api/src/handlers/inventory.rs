//! 盘点端点。
//!
//! - GET /inventory/{name}
//!
//! 空场是正常条件，返回 count = 0 的成功响应。

use crate::AppState;
use crate::utils::response::{blocking_task_failed, operation_failed, reader_not_found, tag_to_dto};
use api_contract::InventoryResponse;
use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use bookgate_protocol::inventory_tags;

pub async fn inventory(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    let antenna_mask = session.config().antenna_mask();
    let factory = state.tag_factory.clone();
    let result = tokio::task::spawn_blocking(move || {
        session.execute(|driver| inventory_tags(driver, antenna_mask, &factory))
    })
    .await;

    match result {
        Ok(Ok(tags)) => {
            let dtos = tags.iter().map(tag_to_dto).collect::<Vec<_>>();
            Json(InventoryResponse {
                success: true,
                message: "Inventory successful".to_string(),
                count: dtos.len(),
                tags: dtos,
            })
            .into_response()
        }
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}
