//! 标签变更与分析端点。
//!
//! - POST /initialize/{name}?mediaId=&format=&secured=
//! - POST /edit/{name}?epc=&mediaId=
//! - POST /clear/{name}?epc=
//! - POST /secure/{name}?epc= 与 POST /unsecure/{name}?epc=
//! - GET  /analyze/{name}?epc=
//!
//! 入参校验（EPC 十六进制、媒体号格式、格式名）一律 400；未知读写器
//! 404；驱动层经重试后仍失败的操作 500，错误文案含厂商错误码与
//! ISO 错误码。

use crate::AppState;
use crate::utils::response::{
    bad_request, blocking_task_failed, operation_failed, reader_not_found,
};
use api_contract::{ClearResponse, EditResponse, InitializeResponse, SecurityToggleResponse};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use bookgate_protocol::{analyze_tag, clear_tag, edit_tag, initialize_tag, write_security_state};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeQuery {
    media_id: Option<String>,
    format: Option<String>,
    secured: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditQuery {
    epc: Option<String>,
    media_id: Option<String>,
}

#[derive(Deserialize)]
pub struct EpcQuery {
    epc: Option<String>,
}

/// POST /initialize/{name}：把场内唯一的空白标签格式化为指定格式。
pub async fn initialize(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InitializeQuery>,
) -> Response {
    let Some(media_id) = query.media_id.filter(|m| !m.is_empty()) else {
        return bad_request("Missing 'mediaId' query parameter");
    };
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    // secured 缺省为 true，format 缺省用配置的默认格式。
    let secured = query
        .secured
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(true);
    let format = query
        .format
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| state.default_tag_format.clone());

    let new_tag = match state.tag_factory.for_initialization(&format, &media_id, secured) {
        Ok(tag) => tag,
        Err(e) => return bad_request(e.to_string()),
    };
    if let Err(e) = new_tag.validate_media_id(&media_id) {
        return bad_request(e.to_string());
    }

    let epc = new_tag.epc_hex();
    let pc = new_tag.pc_hex();
    let tag_type = new_tag.tag_type().to_string();
    let antenna_mask = session.config().antenna_mask();

    let result = tokio::task::spawn_blocking(move || {
        session.execute(|driver| initialize_tag(driver, antenna_mask, &new_tag))
    })
    .await;

    match result {
        Ok(Ok(())) => Json(InitializeResponse {
            success: true,
            message: "Tag initialized successfully".to_string(),
            epc,
            pc,
            media_id,
            secured,
            format,
            tag_type,
        })
        .into_response(),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}

/// POST /edit/{name}：改写既有标签的媒体号。
pub async fn edit(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EditQuery>,
) -> Response {
    let Some(epc_hex) = query.epc.filter(|e| !e.is_empty()) else {
        return bad_request("Missing 'epc' query parameter");
    };
    let Some(media_id) = query.media_id.filter(|m| !m.is_empty()) else {
        return bad_request("Missing 'mediaId' query parameter");
    };
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    let old_tag = match state.tag_factory.from_hex(&epc_hex) {
        Ok(tag) => tag,
        Err(e) => return bad_request(e.to_string()),
    };
    if old_tag.is_raw() {
        return bad_request("Tag format not recognized - use /initialize for unformatted tags");
    }

    let mut new_tag = match state.tag_factory.from_hex(&epc_hex) {
        Ok(tag) => tag,
        Err(e) => return bad_request(e.to_string()),
    };
    if let Err(e) = new_tag.validate_media_id(&media_id) {
        return bad_request(format!("Invalid media ID for this tag format: {e}"));
    }
    if let Err(e) = new_tag.set_media_id(&media_id) {
        return bad_request(format!("Invalid media ID for this tag format: {e}"));
    }

    let old_epc = old_tag.epc_hex();
    let new_epc = new_tag.epc_hex();
    let tag_type = new_tag.tag_type().to_string();
    let antenna_mask = session.config().antenna_mask();

    let result = tokio::task::spawn_blocking(move || {
        session.execute(|driver| edit_tag(driver, antenna_mask, &old_epc, &old_tag, &new_tag))
    })
    .await;

    match result {
        Ok(Ok(())) => Json(EditResponse {
            success: true,
            message: "Tag updated successfully".to_string(),
            old_epc: epc_hex,
            new_epc,
            media_id,
            tag_type,
        })
        .into_response(),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}

/// POST /clear/{name}：口令清零，EPC 恢复为 TID。
pub async fn clear(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
) -> Response {
    let Some(epc_hex) = query.epc.filter(|e| !e.is_empty()) else {
        return bad_request("Missing 'epc' query parameter");
    };
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    let old_tag = match state.tag_factory.from_hex(&epc_hex) {
        Ok(tag) => tag,
        Err(e) => return bad_request(e.to_string()),
    };
    let old_epc = old_tag.epc_hex();
    let antenna_mask = session.config().antenna_mask();

    let result = tokio::task::spawn_blocking(move || {
        session.execute(|driver| clear_tag(driver, antenna_mask, &old_epc, &old_tag))
    })
    .await;

    match result {
        Ok(Ok(outcome)) => Json(ClearResponse {
            success: true,
            message: "Tag cleared successfully - passwords zeroed and EPC restored to TID"
                .to_string(),
            old_epc: epc_hex,
            new_epc: outcome.new_epc,
            new_pc: outcome.new_pc,
            tid: outcome.tid,
        })
        .into_response(),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}

/// POST /secure/{name}：布防。
pub async fn secure(
    state: State<AppState>,
    path: Path<String>,
    query: Query<EpcQuery>,
) -> Response {
    toggle_security(state, path, query, true).await
}

/// POST /unsecure/{name}：撤防。
pub async fn unsecure(
    state: State<AppState>,
    path: Path<String>,
    query: Query<EpcQuery>,
) -> Response {
    toggle_security(state, path, query, false).await
}

async fn toggle_security(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
    secured: bool,
) -> Response {
    let Some(epc_hex) = query.epc.filter(|e| !e.is_empty()) else {
        return bad_request("Missing 'epc' query parameter");
    };
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    let mut tag = match state.tag_factory.from_hex(&epc_hex) {
        Ok(tag) => tag,
        Err(e) => return bad_request(e.to_string()),
    };
    if tag.is_raw() {
        return bad_request("Tag format not recognized - cannot modify security on raw tags");
    }

    tag.set_secured(secured);
    let tag_type = tag.tag_type().to_string();
    let normalized_epc = tag.epc_hex();
    let antenna_mask = session.config().antenna_mask();

    let result = tokio::task::spawn_blocking(move || {
        session.execute(|driver| write_security_state(driver, antenna_mask, &normalized_epc, &tag))
    })
    .await;

    match result {
        Ok(Ok(())) => Json(SecurityToggleResponse {
            success: true,
            message: format!(
                "Tag {} successfully",
                if secured { "secured" } else { "unsecured" }
            ),
            epc: epc_hex,
            tag_type,
            secured,
        })
        .into_response(),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}

/// GET /analyze/{name}：只读深度分析。
pub async fn analyze(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
) -> Response {
    let Some(epc_hex) = query.epc.filter(|e| !e.is_empty()) else {
        return bad_request("Missing 'epc' query parameter");
    };
    let Some(session) = state.registry.get(&name) else {
        return reader_not_found(&name);
    };

    let theoretical = match state.tag_factory.from_hex(&epc_hex) {
        Ok(tag) => tag,
        Err(e) => return bad_request(e.to_string()),
    };
    let normalized_epc = theoretical.epc_hex();
    let antenna_mask = session.config().antenna_mask();

    let result = tokio::task::spawn_blocking(move || {
        session.execute(|driver| analyze_tag(driver, antenna_mask, &normalized_epc, &theoretical))
    })
    .await;

    match result {
        Ok(Ok(analysis)) => Json(json!({
            "success": true,
            "epc": epc_hex,
            "analysis": analysis,
        }))
        .into_response(),
        Ok(Err(e)) => operation_failed(e.to_string()),
        Err(_) => blocking_task_failed(),
    }
}
