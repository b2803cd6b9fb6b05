pub mod builder;
pub mod cli;
pub mod config;
pub mod database;
pub mod encoder;
pub mod error;
pub mod faiss;
pub mod metrics;
mod server;
pub mod session;
pub mod store;
pub mod utils;

pub use builder::BuildReport;
pub use config::Opts;
pub use database::{DatabaseDir, DatabaseRoot};
pub use encoder::{Encoder, ModelLoader, ModelVariant};
pub use error::{Error, Result};
pub use session::{SearchSession, SharedSession};
pub use store::{SearchHit, VectorStore};
