use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::TypedMultipart;
use log::info;
use tokio::task::spawn_blocking;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::builder::BuildReport;
use crate::database::DatabaseInfo;
use crate::metrics;
use crate::session::ActiveStatus;

/// 在活动数据库中搜索一张图片
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "图片无法解码"),
        (status = 409, description = "没有活动数据库"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(data): TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let k = data.k.unwrap_or(state.search.k);
    let start = Instant::now();

    info!("正在搜索上传图片");

    let session = state.session.clone();
    let (database, result) = spawn_blocking(move || -> crate::Result<_> {
        let mut session = session.lock()?;
        let result = session.search_bytes(&data.file, k)?;
        let database = session.status().map(|status| status.name).unwrap_or_default();
        Ok((database, result))
    })
    .await??;

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, database, result }))
}

/// 切换活动数据库
#[utoipa::path(
    post,
    path = "/switch",
    request_body = SwitchRequest,
    responses(
        (status = 200, body = ActiveStatus),
        (status = 404, description = "数据库不存在"),
    )
)]
pub async fn switch_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<SwitchRequest>,
) -> Result<Json<Option<ActiveStatus>>> {
    let db = state.root.get(&data.name)?;
    let session = state.session.clone();
    let status = spawn_blocking(move || -> crate::Result<_> {
        let mut session = session.lock()?;
        session.switch(db.path())?;
        Ok(session.status())
    })
    .await??;
    Ok(Json(status))
}

/// 从服务器上的图片目录新建数据库
#[utoipa::path(
    post,
    path = "/build",
    request_body = BuildRequest,
    responses(
        (status = 200, body = BuildReport),
        (status = 400, description = "源目录中没有图片"),
    )
)]
pub async fn build_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<BuildRequest>,
) -> Result<Json<BuildReport>> {
    info!("正在从 {} 新建数据库 {}", data.source, data.name);
    let report = spawn_blocking(move || {
        state.session.build(&state.root, PathBuf::from(&data.source), &data.name)
    })
    .await??;
    Ok(Json(report))
}

/// 列出所有数据库
#[utoipa::path(
    get,
    path = "/databases",
    responses(
        (status = 200, body = Vec<DatabaseInfo>),
    )
)]
pub async fn databases_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DatabaseInfo>>> {
    let list = spawn_blocking(move || state.root.list()).await??;
    Ok(Json(list))
}

/// 获取会话状态
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let session = state.session.clone();
    let status = spawn_blocking(move || -> crate::Result<_> {
        let session = session.lock()?;
        Ok(StatusResponse {
            active: session.status(),
            loaded_model: session.loaded_model().map(|variant| variant.to_string()),
            new_build_model: session.variant_for_new_build().to_string(),
        })
    })
    .await??;
    Ok(Json(status))
}

/// 导出 prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}
