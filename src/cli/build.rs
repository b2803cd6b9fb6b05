use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::{OutputFormat, SubCommandExtend};
use crate::encoder::ModelVariant;
use crate::{Opts, SearchSession};

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    /// 源图片目录，只添加第一层的 png/jpg/jpeg 图片
    pub source: PathBuf,
    /// 数据库名称
    pub name: String,
    /// 使用的模型，默认有 CUDA 时使用 ViT-L/14，否则使用 ViT-B/32
    #[arg(long, value_enum)]
    pub model: Option<ModelVariant>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for BuildCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let root = opts.databases();
        let mut session = SearchSession::new(opts.loader());
        let variant = self.model.unwrap_or_else(|| session.variant_for_new_build());
        info!("使用模型 {} 建立数据库 {}", variant, self.name);

        let report =
            block_in_place(|| session.build_with(&root, &self.source, &self.name, variant))?;

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => println!("{}", report.path.display()),
        }
        Ok(())
    }
}
