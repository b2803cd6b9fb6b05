use anyhow::Result;
use clap::Parser;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::encoder::clip::cuda_available;
use crate::encoder::{ModelLoader, ModelVariant};
use crate::faiss::faiss_version;

#[derive(Parser, Debug, Clone)]
pub struct InfoCommand {}

impl SubCommandExtend for InfoCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let loader = opts.loader();

        println!("faiss 版本        : {}", faiss_version());
        println!("CUDA 可用         : {}", cuda_available());
        println!("推理设备          : {:?}", opts.model.device);
        println!("新建数据库使用模型: {}", ModelVariant::for_new_build(loader.accelerated()));
        println!("数据库目录        : {}", opts.databases().path().display());
        for variant in ModelVariant::ALL {
            let path = loader.model_path(variant);
            let state = if path.is_file() { "已安装" } else { "未找到" };
            println!("{:<18}: {} ({})", variant.name(), path.display(), state);
        }
        Ok(())
    }
}
