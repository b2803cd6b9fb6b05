use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::database::DatabaseRoot;
use crate::encoder::clip::{ClipLoader, DEFAULT_INPUT_NAME, Device};
use crate::session::DEFAULT_TOP_K;

static DATA_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    ProjectDirs::from("", "picsearch", "picsearch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
});

fn default_data_dir() -> PathBuf {
    DATA_DIR.clone()
}

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// 模型目录，默认为数据目录下的 models
    #[arg(long, value_name = "DIR", global = true)]
    pub model_dir: Option<PathBuf>,
    /// 推理设备
    #[arg(long, value_enum, default_value_t = Device::Auto, global = true)]
    pub device: Device,
    /// ONNX 模型的输入名称
    #[arg(long, value_name = "NAME", default_value = DEFAULT_INPUT_NAME, global = true)]
    pub input_name: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 显示的结果数量
    #[arg(short, value_name = "K", default_value_t = DEFAULT_TOP_K)]
    pub k: usize,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "picsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 数据目录，包含 databases 和 models 两个子目录
    #[arg(short = 'D', long, global = true, default_value_os_t = default_data_dir())]
    pub data_dir: PathBuf,
    #[command(flatten)]
    pub model: ModelOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 从图片目录新建数据库
    Build(BuildCommand),
    /// 在数据库中搜索图片
    Search(SearchCommand),
    /// 列出所有数据库
    List(ListCommand),
    /// 显示设备与模型信息
    Info(InfoCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

impl Opts {
    /// 返回数据库根目录
    pub fn databases(&self) -> DatabaseRoot {
        DatabaseRoot::new(self.data_dir.join("databases"))
    }

    /// 返回模型目录
    pub fn models(&self) -> PathBuf {
        self.model.model_dir.clone().unwrap_or_else(|| self.data_dir.join("models"))
    }

    /// 按配置创建模型加载器
    pub fn loader(&self) -> ClipLoader {
        ClipLoader::new(self.models(), self.model.device).input_name(self.model.input_name.clone())
    }
}
