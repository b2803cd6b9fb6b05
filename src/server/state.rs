use std::sync::Arc;

use crate::cli::server::ServerCommand;
use crate::config::SearchOptions;
use crate::database::DatabaseRoot;
use crate::session::SharedSession;

/// 应用状态
pub struct AppState {
    /// 搜索会话
    pub session: SharedSession,
    /// 数据库根目录
    pub root: DatabaseRoot,
    /// 搜索配置选项
    pub search: SearchOptions,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(session: SharedSession, root: DatabaseRoot, opts: ServerCommand) -> Arc<Self> {
        Arc::new(AppState { session, root, search: opts.search })
    }
}
