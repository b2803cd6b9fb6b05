use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use log::info;
use serde::Serialize;
use utoipa::ToSchema;

use crate::database::{DatabaseDir, DatabaseRoot, copy_images, list_images, source_images};
use crate::encoder::{ModelCache, ModelVariant};
use crate::error::{Error, Result};
use crate::faiss::FlatIndex;
use crate::store::VectorStore;
use crate::utils::{imread_rgb, pb_style};

/// 每批编码的图片数量
pub const BATCH_SIZE: usize = 32;

/// 建库结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BuildReport {
    /// 数据库目录
    #[schema(value_type = String)]
    pub path: PathBuf,
    pub images: usize,
    pub dim: usize,
    #[schema(value_type = String)]
    pub variant: ModelVariant,
    /// 耗时，单位为秒
    #[serde(serialize_with = "serialize_secs")]
    #[schema(value_type = f64)]
    pub elapsed: Duration,
}

/// 从 source 目录新建（或覆盖）名为 name 的数据库
///
/// 先确认源目录中的图片都能解码，再复制到数据库的图片目录并建立索引。
/// 任何一步失败时，已有的索引与名称列表保持不变
///
/// # Arguments
///
/// * `models` - 编码器缓存
/// * `root` - 数据库根目录
/// * `source` - 源图片目录，只复制第一层的图片
/// * `name` - 数据库名称
/// * `variant` - 使用的模型规格
pub fn build_database(
    models: &mut ModelCache,
    root: &DatabaseRoot,
    source: &Path,
    name: &str,
    variant: ModelVariant,
) -> Result<(VectorStore, BuildReport)> {
    if !source.is_dir() {
        return Err(Error::NoImages(source.to_path_buf()));
    }
    // 坏图片不能进入图片目录，否则之后的每次重建都会失败
    for path in source_images(source)? {
        imread_rgb(&path)?;
    }
    let db = root.create(name)?;
    copy_images(source, db.images())?;
    index_database(models, &db, variant)
}

/// 对数据库图片目录中的所有图片建立索引并保存
///
/// 图片按相对路径排序，第 i 张图片的向量位于索引第 i 行
pub fn index_database(
    models: &mut ModelCache,
    db: &DatabaseDir,
    variant: ModelVariant,
) -> Result<(VectorStore, BuildReport)> {
    let start = Instant::now();

    let images = list_images(db.images())?;
    if images.is_empty() {
        return Err(Error::NoImages(db.images()));
    }

    info!("正在使用 {} 为 {} 张图片建立索引", variant, images.len());
    let encoder = models.encoder(variant)?;
    let mut index = FlatIndex::new(variant.dim())?;

    let pb = ProgressBar::new(images.len() as u64).with_style(pb_style());
    for batch in images.chunks(BATCH_SIZE) {
        let mats = batch.iter().map(|image| imread_rgb(&image.path)).collect::<Result<Vec<_>>>()?;
        let features = encoder.encode_batch(&mats)?;
        if features.nrows() != mats.len() {
            return Err(Error::Inference(format!(
                "编码器返回 {} 个向量，期望 {}",
                features.nrows(),
                mats.len()
            )));
        }
        index.add(features.view())?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    let names = images.into_iter().map(|image| image.name).collect();
    let store = VectorStore::new(db.clone(), index, names)?;
    if db.is_ready() {
        // 写入名称列表之前先删除旧索引，避免新名称列表与旧索引同时可见
        info!("替换数据库 {} 的旧索引", db.name());
        fs::remove_file(db.index())?;
    }
    store.save()?;

    let report = BuildReport {
        path: db.path().to_path_buf(),
        images: store.len(),
        dim: store.dim(),
        variant,
        elapsed: start.elapsed(),
    };
    info!(
        "已为 {} 张图片建立索引 @ dim={}，耗时 {:.2}s，保存到 {}",
        report.images,
        report.dim,
        report.elapsed.as_secs_f32(),
        report.path.display()
    );
    Ok((store, report))
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
