//! 图书馆 RFID 读写器网关服务。
//!
//! 启动流程：加载 `.env` → 初始化 tracing → 读取 YAML 配置
//! （CONFIG_FILE_PATH）→ 装载口令注册表 → 按配置注册读写器会话 →
//! 启动 HTTP 服务，收到 Ctrl-C 后关停所有会话。

mod handlers;
mod routes;
mod utils;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use bookgate_config::{AppConfig, ServiceConfig};
use bookgate_driver::{DriverFactory, ReaderDriver, SimField, SimReaderDriver, SimTag, new_sim_field};
use bookgate_session::ReaderRegistry;
use bookgate_tag::{PasswordRegistry, TagFactory};
use bookgate_telemetry::{init_tracing, new_request_ids};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, error, info};

/// HTTP 层共享状态。
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ReaderRegistry>,
    pub tag_factory: TagFactory,
    pub default_tag_format: String,
}

#[tokio::main]
async fn main() {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    init_tracing();
    info!("starting rfid reader service");

    let app_config = AppConfig::from_env();
    let service_config = match ServiceConfig::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load reader configuration");
            std::process::exit(1);
        }
    };

    let passwords = Arc::new(PasswordRegistry::new(service_config.tag_passwords.clone()));
    info!(
        entries = service_config.tag_passwords.len(),
        "loaded tag password configuration"
    );
    let tag_factory = TagFactory::new(passwords);

    let registry = Arc::new(ReaderRegistry::new(
        service_config.readers.clone(),
        sim_driver_factory(),
    ));

    let state = AppState {
        registry: Arc::clone(&registry),
        tag_factory,
        default_tag_format: service_config.default_tag_format.clone(),
    };

    let app = routes::create_api_router()
        .with_state(state)
        .layer(middleware::from_fn(request_context));

    let listener = match tokio::net::TcpListener::bind(&app_config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %app_config.http_addr, error = %e, "failed to bind http listener");
            std::process::exit(1);
        }
    };
    info!(addr = %app_config.http_addr, "http server listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;

    info!("shutting down - closing all readers");
    registry.close_all();

    if let Err(e) = serve_result {
        error!(error = %e, "http server terminated with error");
        std::process::exit(1);
    }
}

/// 仿真驱动工厂。
///
/// 厂商 SDK 不在本仓库范围内，默认把每台配置的读写器接到一片内存
/// 标签场上（出厂各一枚空白标签）；标签场按读写器名称持久，重连后
/// 内容不丢。真实驱动通过同一个工厂接缝替换。
fn sim_driver_factory() -> DriverFactory {
    let fields: Mutex<HashMap<String, SimField>> = Mutex::new(HashMap::new());
    Arc::new(move |reader_name: &str| {
        let field = fields
            .lock()
            .entry(reader_name.to_string())
            .or_insert_with(|| {
                let field = new_sim_field();
                field.lock().push(SimTag::blank(tid_for_reader(reader_name)));
                field
            })
            .clone();
        Box::new(SimReaderDriver::new(field)) as Box<dyn ReaderDriver>
    })
}

/// 按读写器名称派生一个稳定的仿真 TID。
fn tid_for_reader(reader_name: &str) -> [u8; 12] {
    let mut tid = [0u8; 12];
    tid[..4].copy_from_slice(&[0xE2, 0x80, 0x68, 0x94]);
    for (target, byte) in tid[4..].iter_mut().zip(reader_name.bytes()) {
        *target = byte;
    }
    tid
}

/// 注入 request_id/trace_id 并为每个请求建 span。
async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
