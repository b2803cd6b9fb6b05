use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::SearchHit;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Bytes,
    pub k: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的结果数量
    pub k: Option<usize>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 搜索的数据库名称
    pub database: String,
    /// 按相似度从高到低排列的结果
    pub result: Vec<SearchHit>,
}

/// 切换数据库的参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchRequest {
    /// 数据库名称
    pub name: String,
}

/// 新建数据库的参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct BuildRequest {
    /// 服务器上的源图片目录
    pub source: String,
    /// 数据库名称
    pub name: String,
}

/// 会话状态
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// 活动数据库，未打开时为空
    pub active: Option<crate::session::ActiveStatus>,
    /// 已加载的模型
    pub loaded_model: Option<String>,
    /// 新建数据库时使用的模型
    pub new_build_model: String,
}
