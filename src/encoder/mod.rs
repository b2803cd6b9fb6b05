//! 图片编码器
//!
//! 编码器把 RGB 图片转换为定长、L2 归一化的特征向量。模型有两种规格，以输出维数区分：
//! 轻量的 ViT-B/32（512 维）和高精度的 ViT-L/14（768 维）。
//!
//! 新建数据库时按硬件选择规格（[`ModelVariant::for_new_build`]），
//! 加载已有数据库时按索引维数选择规格（[`ModelVariant::for_existing_index`]），
//! 以保证查询使用的模型与建库时一致。

pub mod clip;

use std::fmt;

use clap::ValueEnum;
use log::{info, warn};
use ndarray::{Array1, Array2, Axis};
use opencv::core::Mat;
use serde::Serialize;

use crate::error::{Error, Result};

pub use clip::{ClipEncoder, ClipLoader};

/// 模型规格
#[derive(ValueEnum, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// ViT-B/32，512 维
    #[value(name = "ViT-B/32", alias = "b32")]
    #[serde(rename = "ViT-B/32")]
    VitB32,
    /// ViT-L/14，768 维
    #[value(name = "ViT-L/14", alias = "l14")]
    #[serde(rename = "ViT-L/14")]
    VitL14,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::VitB32, ModelVariant::VitL14];

    /// 输出向量维数
    pub fn dim(self) -> usize {
        match self {
            Self::VitB32 => 512,
            Self::VitL14 => 768,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VitB32 => "ViT-B/32",
            Self::VitL14 => "ViT-L/14",
        }
    }

    /// 模型文件名
    pub fn file_name(self) -> &'static str {
        match self {
            Self::VitB32 => "ViT-B-32.onnx",
            Self::VitL14 => "ViT-L-14.onnx",
        }
    }

    /// 新建数据库时使用的规格：有加速器时使用高精度模型，否则使用轻量模型
    pub fn for_new_build(accelerated: bool) -> Self {
        if accelerated { Self::VitL14 } else { Self::VitB32 }
    }

    /// 加载已有数据库时使用的规格，由索引中的向量维数决定，与当前硬件无关
    ///
    /// 无法识别的维数回退到 ViT-B/32 并输出警告
    pub fn for_existing_index(dim: usize) -> Self {
        match Self::from_dim(dim) {
            Some(variant) => variant,
            None => {
                warn!("无法识别的索引维数 {}，回退到 {}", dim, Self::VitB32);
                Self::VitB32
            }
        }
    }

    pub fn from_dim(dim: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.dim() == dim)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 图片编码器
///
/// 输入为 3 通道 RGB 图片（见 [`crate::utils::to_rgb`]），输出为 L2 归一化的向量。
/// 批量编码与单张编码对同一张图片必须给出相同的结果。
pub trait Encoder: Send {
    /// 编码器的模型规格
    fn variant(&self) -> ModelVariant;

    /// 批量编码，返回大小为 (n, dim) 的矩阵，第 i 行对应第 i 张图片
    fn encode_batch(&mut self, images: &[Mat]) -> Result<Array2<f32>>;

    /// 编码单张图片
    fn encode(&mut self, image: &Mat) -> Result<Array1<f32>> {
        let batch = self.encode_batch(std::slice::from_ref(image))?;
        if batch.nrows() != 1 {
            return Err(Error::Inference(format!("期望 1 个输出，实际为 {}", batch.nrows())));
        }
        Ok(batch.index_axis_move(Axis(0), 0))
    }
}

/// 按规格加载编码器
pub trait ModelLoader: Send {
    /// 加载指定规格的编码器，模型文件不存在时返回 [`Error::ModelNotFound`]
    fn load(&self, variant: ModelVariant) -> Result<Box<dyn Encoder>>;

    /// 是否有可用的加速器
    fn accelerated(&self) -> bool;
}

/// 编码器缓存，同一时间只保留一个已加载的模型
///
/// 请求的规格与已加载的不同时，先释放旧模型再加载新模型
pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    current: Option<Box<dyn Encoder>>,
}

impl ModelCache {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self { loader, current: None }
    }

    /// 当前已加载的模型规格
    pub fn loaded(&self) -> Option<ModelVariant> {
        self.current.as_ref().map(|encoder| encoder.variant())
    }

    /// 是否有可用的加速器
    pub fn accelerated(&self) -> bool {
        self.loader.accelerated()
    }

    /// 获取指定规格的编码器，必要时加载
    pub fn encoder(&mut self, variant: ModelVariant) -> Result<&mut Box<dyn Encoder>> {
        if self.loaded() != Some(variant) {
            self.current = None;
            info!("正在加载模型 {}", variant);
            self.current = Some(self.loader.load(variant)?);
        }
        self.current.as_mut().ok_or_else(|| Error::Inference(format!("模型 {} 未加载", variant)))
    }

    /// 释放已加载的模型
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache").field("loaded", &self.loaded()).finish()
    }
}

/// L2 归一化，零向量保持不变
pub fn l2_normalize(mut v: ndarray::ArrayViewMut1<f32>) {
    let norm = v.dot(&v).sqrt();
    if norm > 0. {
        v.mapv_inplace(|x| x / norm);
    }
}

/// 对矩阵的每一行做 L2 归一化
pub fn l2_normalize_rows(m: &mut Array2<f32>) {
    for row in m.rows_mut() {
        l2_normalize(row);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, array};

    use super::*;

    #[test]
    fn new_build_prefers_large_model_on_accelerator() {
        assert_eq!(ModelVariant::for_new_build(true), ModelVariant::VitL14);
        assert_eq!(ModelVariant::for_new_build(false), ModelVariant::VitB32);
    }

    #[test]
    fn existing_index_selects_by_dimension() {
        assert_eq!(ModelVariant::for_existing_index(512), ModelVariant::VitB32);
        assert_eq!(ModelVariant::for_existing_index(768), ModelVariant::VitL14);
    }

    #[test]
    fn unknown_dimension_falls_back_to_small_model() {
        assert_eq!(ModelVariant::for_existing_index(1024), ModelVariant::VitB32);
        assert_eq!(ModelVariant::from_dim(1024), None);
    }

    #[test]
    fn l2_normalize_rows_gives_unit_vectors() {
        let mut m = array![[3., 4.], [0., 0.], [1., 1.]];
        l2_normalize_rows(&mut m);
        assert!((m[[0, 0]] - 0.6).abs() < 1e-6);
        assert!((m[[0, 1]] - 0.8).abs() < 1e-6);
        assert_eq!(m.row(1), Array1::<f32>::zeros(2));
        let norm = m.row(2).dot(&m.row(2)).sqrt();
        assert!((norm - 1.).abs() < 1e-6);
    }

    struct Constant(ModelVariant);

    impl Encoder for Constant {
        fn variant(&self) -> ModelVariant {
            self.0
        }

        fn encode_batch(&mut self, images: &[Mat]) -> Result<Array2<f32>> {
            Ok(Array2::from_elem((images.len(), self.0.dim()), 1.))
        }
    }

    struct CountingLoader(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl ModelLoader for CountingLoader {
        fn load(&self, variant: ModelVariant) -> Result<Box<dyn Encoder>> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Box::new(Constant(variant)))
        }

        fn accelerated(&self) -> bool {
            false
        }
    }

    #[test]
    fn cache_reloads_only_when_variant_changes() -> Result<()> {
        let loads = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut cache = ModelCache::new(Box::new(CountingLoader(loads.clone())));
        assert_eq!(cache.loaded(), None);

        cache.encoder(ModelVariant::VitB32)?;
        cache.encoder(ModelVariant::VitB32)?;
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);

        let encoder = cache.encoder(ModelVariant::VitL14)?;
        assert_eq!(encoder.encode(&Mat::default())?.len(), 768);
        assert_eq!(cache.loaded(), Some(ModelVariant::VitL14));
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 2);

        cache.invalidate();
        assert_eq!(cache.loaded(), None);
        Ok(())
    }
}
