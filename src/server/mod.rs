//! HTTP服务
//!
//! - `POST /api/deep-research`：NDJSON 流式返回调研事件
//! - `POST /api/person-images`：Wikimedia 人物图片检索
//! - `POST /api/person-search`：人物公开资料检索
//! - `GET /health`

use std::convert::Infallible;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::i18n::Locale;
use crate::images::WikimediaClient;
use crate::person_search::{PersonQuery, PersonSearch, PersonSearchResponse};
use crate::research::{ResearchContext, spawn_research};
use crate::stream::{NDJSON_CONTENT_TYPE, encode_line};

/// 各请求共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub context: ResearchContext,
    pub wikimedia: WikimediaClient,
    pub person_search: PersonSearch,
}

impl AppState {
    pub fn new(context: ResearchContext) -> Result<Self> {
        let wikimedia = WikimediaClient::new(&context.config.images)?;
        let person_search = PersonSearch::new(&context.config.search)?;
        Ok(Self {
            context,
            wikimedia,
            person_search,
        })
    }
}

/// 在响应流开始前返回的错误
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Query is required")]
    MissingQuery { status: StatusCode },

    #[error("Full name is required")]
    MissingName,

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidJson | ApiError::MissingName => StatusCode::BAD_REQUEST,
            ApiError::MissingQuery { status } | ApiError::Upstream { status, .. } => *status,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// 请求体中的 query 与 locale；query 不是字符串时视为空
fn parse_request(body: &Bytes) -> Result<(String, Locale), ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;
    let query = value
        .get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let locale = Locale::from_request(value.get("locale").and_then(Value::as_str));
    Ok((query, locale))
}

/// POST /api/deep-research
///
/// 客户端断开时响应体被丢弃，drop guard 触发取消信号；后台任务会继续完成部分报告。
pub async fn deep_research(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let (query, locale) = parse_request(&body)?;
    if query.trim().is_empty() {
        return Err(ApiError::MissingQuery {
            status: StatusCode::BAD_REQUEST,
        });
    }

    let cancel = CancellationToken::new();
    let mut events = spawn_research(state.context.clone(), query, locale, cancel.clone());

    // 响应体未被轮询就被丢弃时也要触发取消
    let guard = cancel.drop_guard();
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = events.recv().await {
            match encode_line(&event) {
                Ok(line) => yield Ok::<_, Infallible>(Bytes::from(line)),
                Err(err) => error!(error = %err, kind = event.kind(), "failed to encode event"),
            }
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// POST /api/person-images
pub async fn person_images(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let (query, locale) = parse_request(&body)?;
    if query.trim().is_empty() {
        return Err(ApiError::MissingQuery {
            status: StatusCode::UNPROCESSABLE_ENTITY,
        });
    }

    let images = state
        .wikimedia
        .fetch_person_images(&query, locale, None)
        .await
        .map_err(|err| ApiError::Upstream {
            status: StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: err.to_string(),
        })?;

    Ok(Json(json!({ "images": images })))
}

/// POST /api/person-search
///
/// 单个查询失败只记录日志，不返回错误。
pub async fn person_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PersonSearchResponse>, ApiError> {
    let value: Value = serde_json::from_slice(&body).map_err(|_| ApiError::InvalidJson)?;
    let query = PersonQuery::new(
        value.get("fullName").and_then(Value::as_str).unwrap_or_default(),
        value.get("company").and_then(Value::as_str),
        value.get("position").and_then(Value::as_str),
    );
    if query.full_name.is_empty() {
        return Err(ApiError::MissingName);
    }

    Ok(Json(state.person_search.search(&query).await))
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/deep-research", post(deep_research))
        .route("/api/person-images", post(person_images))
        .route("/api/person-search", post(person_search))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动HTTP服务，收到 Ctrl-C 后优雅退出
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = bind_addr, "🌐 服务已启动");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("收到退出信号，正在关闭服务");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
