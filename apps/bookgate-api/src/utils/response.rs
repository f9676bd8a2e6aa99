//! HTTP 响应辅助函数和 DTO 转换
//!
//! 统一的失败响应构造（400 / 404 / 500）与核心类型到响应 DTO 的
//! 转换。所有失败响应都是 `{ success: false, error: <message> }`。

use api_contract::{AntennaRssiDto, ErrorResponse, EventRssiDto, NotificationEventDto, TagDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bookgate_session::NotificationEvent;
use bookgate_tag::Tag;
use bookgate_telemetry::record_operation_failure;

/// 请求参数错误响应。
pub fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

/// 资源未找到错误响应。
pub fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
}

/// 未知读写器的 404 响应。
pub fn reader_not_found(reader_name: &str) -> Response {
    not_found(format!("Reader not found: {reader_name}"))
}

/// 操作失败响应（500）。
pub fn operation_failed(message: impl Into<String>) -> Response {
    let message = message.into();
    record_operation_failure();
    tracing::error!(error = %message, "operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message)),
    )
        .into_response()
}

/// 后台任务被取消或崩溃时的兜底响应。
pub fn blocking_task_failed() -> Response {
    operation_failed("internal error: blocking task failed")
}

/// Tag 转 TagDto。
pub fn tag_to_dto(tag: &Tag) -> TagDto {
    TagDto {
        tag_type: tag.tag_type().to_string(),
        epc: tag.epc_hex(),
        pc: tag.pc_hex(),
        media_id: tag.media_id().unwrap_or_default(),
        secured: tag.is_secured(),
        rssi_values: tag
            .rssi_values()
            .iter()
            .map(|rssi| AntennaRssiDto {
                antenna_number: rssi.antenna_number,
                rssi: rssi.rssi,
            })
            .collect(),
    }
}

/// NotificationEvent 转 NotificationEventDto。
pub fn event_to_dto(event: NotificationEvent) -> NotificationEventDto {
    NotificationEventDto {
        timestamp: event.timestamp,
        event_type: event.event_type,
        idd: event.idd,
        rssi_values: event.rssi_values.map(|values| {
            values
                .into_iter()
                .map(|rssi| EventRssiDto {
                    antenna: rssi.antenna_number,
                    rssi: rssi.rssi,
                })
                .collect()
        }),
        reader_timestamp: event.reader_timestamp,
        reader_type: event.reader_type,
        firmware_version: event.firmware_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn reader_not_found_contract() {
        let response = reader_not_found("nonexistent");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Reader not found: nonexistent");
    }

    #[tokio::test]
    async fn bad_request_contract() {
        let response = bad_request("Missing 'mediaId' query parameter");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Missing 'mediaId' query parameter");
    }

    #[tokio::test]
    async fn operation_failed_contract() {
        let response = operation_failed("Inventory failed: transmit failed");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Inventory failed: transmit failed");
    }
}
