mod build;
mod info;
mod list;
mod search;
pub mod server;

pub use build::*;
pub use info::*;
pub use list::*;
pub use search::*;
pub use server::*;

use clap::ValueEnum;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
