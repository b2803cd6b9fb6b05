use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::{OutputFormat, SubCommandExtend};
use crate::config::{Opts, SearchOptions};
use crate::store::SearchHit;
use crate::{SearchSession, utils};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: PathBuf,
    /// 数据库名称
    #[arg(short, long)]
    pub database: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = opts.databases().get(&self.database)?;
        let image = utils::imread(&self.image)?;

        let mut session = SearchSession::new(opts.loader());
        let result = block_in_place(|| session.query(&image, db.path(), self.search.k))?;

        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[SearchHit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for hit in result {
                println!("{:.4}\t{}", hit.score, hit.name);
            }
        }
    }
    Ok(())
}
