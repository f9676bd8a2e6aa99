//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 探活：/、/test、/metrics
//! - 读写器清单：/readers
//! - 盘点：/inventory/{name}
//! - 标签变更：/initialize、/edit、/clear、/secure、/unsecure
//! - 标签分析：/analyze/{name}
//! - 通知模式：/notification/*

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由。
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/test", get(test))
        .route("/metrics", get(get_metrics))
        .route("/readers", get(list_readers))
        .route("/inventory/:name", get(inventory))
        .route("/initialize/:name", post(initialize))
        .route("/edit/:name", post(edit))
        .route("/clear/:name", post(clear))
        .route("/secure/:name", post(secure))
        .route("/unsecure/:name", post(unsecure))
        .route("/analyze/:name", get(analyze))
        .route("/notification/start/:name", post(start_notification))
        .route("/notification/stop/:name", post(stop_notification))
        .route("/notification/events/:name", get(notification_events))
        .route("/notification/status", get(notification_status))
}
