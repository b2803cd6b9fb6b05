use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::SearchOptions;
use crate::{Opts, SearchSession, SharedSession, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 启动时打开的数据库
    #[arg(short, long)]
    pub database: Option<String>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let root = opts.databases();
        let mut session = SearchSession::new(opts.loader());
        if let Some(name) = &self.database {
            let db = root.get(name)?;
            block_in_place(|| session.switch(db.path()))?;
        }

        // 创建应用状态
        let state = server::AppState::new(SharedSession::new(session), root, self.clone());

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
