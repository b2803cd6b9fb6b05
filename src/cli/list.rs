use anyhow::Result;
use clap::Parser;

use crate::Opts;
use crate::cli::{OutputFormat, SubCommandExtend};

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ListCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let databases = opts.databases().list()?;
        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&databases)?),
            OutputFormat::Table => {
                for db in databases {
                    let state = if db.ready { "ready" } else { "empty" };
                    println!("{}\t{}\t{}", db.name, state, db.images);
                }
            }
        }
        Ok(())
    }
}
