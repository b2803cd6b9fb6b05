use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 核心操作的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 图片目录中没有任何可用的图片
    #[error("目录中没有找到图片: {}", .0.display())]
    NoImages(PathBuf),
    /// 图片无法解码
    #[error("无法解码图片: {0}")]
    ImageDecode(String),
    /// 数据库名称不合法
    #[error("无效的数据库名称: {0:?}")]
    InvalidName(String),
    /// 数据库不存在或尚未建立索引
    #[error("数据库不存在: {}", .0.display())]
    DatabaseNotFound(PathBuf),
    /// 模型文件不存在
    #[error("模型文件不存在: {}", .0.display())]
    ModelNotFound(PathBuf),
    /// 名称列表与索引行数不一致
    #[error("数据库不一致: 名称列表有 {names} 项，索引有 {rows} 行")]
    Inconsistent { names: usize, rows: usize },
    /// 索引文件结构不合法
    #[error("无效的索引文件: {0}")]
    InvalidIndex(String),
    /// 向量维数与索引不匹配
    #[error("向量维数不匹配: 索引为 {expected}，输入为 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// 当前没有活动数据库
    #[error("尚未选择数据库")]
    NotLoaded,
    #[error("faiss error {code}: {message}")]
    Faiss { code: i32, message: String },
    #[error("模型推理失败: {0}")]
    Inference(String),
    #[error("会话锁已损坏")]
    Poisoned,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// 是否为调用方输入导致的错误
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NoImages(_)
                | Self::ImageDecode(_)
                | Self::InvalidName(_)
                | Self::DimensionMismatch { .. }
        )
    }
}
