//! 基于 ONNX Runtime 的 CLIP 图像编码器
//!
//! 模型文件为导出成 ONNX 的 CLIP 视觉部分，输入 `[N, 3, 224, 224]`，输出 `[N, D]`。

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{debug, info};
use ndarray::Array2;
use opencv::core::{self, Mat, Rect, Size};
use opencv::imgproc;
use opencv::prelude::*;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;

use super::{Encoder, ModelLoader, ModelVariant, l2_normalize_rows};
use crate::error::{Error, Result};

/// 模型输入图片的边长
pub const INPUT_SIZE: i32 = 224;
/// 默认的模型输入名称
pub const DEFAULT_INPUT_NAME: &str = "pixel_values";

const MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// 推理设备
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// 有 CUDA 时使用 CUDA，否则使用 CPU
    Auto,
    Cpu,
    Cuda,
}

/// ONNX Runtime 是否报告 CUDA 可用
pub fn cuda_available() -> bool {
    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

/// 从模型目录加载 CLIP 编码器
#[derive(Debug, Clone)]
pub struct ClipLoader {
    model_dir: PathBuf,
    device: Device,
    input_name: String,
}

impl ClipLoader {
    pub fn new<P: Into<PathBuf>>(model_dir: P, device: Device) -> Self {
        Self { model_dir: model_dir.into(), device, input_name: DEFAULT_INPUT_NAME.to_string() }
    }

    /// 设置模型的输入名称
    pub fn input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    /// 指定规格的模型文件路径
    pub fn model_path(&self, variant: ModelVariant) -> PathBuf {
        self.model_dir.join(variant.file_name())
    }
}

impl ModelLoader for ClipLoader {
    fn load(&self, variant: ModelVariant) -> Result<Box<dyn Encoder>> {
        let encoder =
            ClipEncoder::open(self.model_path(variant), variant, self.accelerated(), &self.input_name)?;
        Ok(Box::new(encoder))
    }

    fn accelerated(&self) -> bool {
        match self.device {
            Device::Auto => cuda_available(),
            Device::Cpu => false,
            Device::Cuda => true,
        }
    }
}

/// CLIP 图像编码器
pub struct ClipEncoder {
    session: Session,
    variant: ModelVariant,
    input_name: String,
}

impl ClipEncoder {
    /// 加载模型文件
    ///
    /// # Arguments
    ///
    /// * `path` - ONNX 模型路径
    /// * `variant` - 模型规格，输出维数必须与之相符
    /// * `cuda` - 是否使用 CUDA 推理
    /// * `input_name` - 模型的输入名称
    pub fn open<P: AsRef<Path>>(
        path: P,
        variant: ModelVariant,
        cuda: bool,
        input_name: &str,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelNotFound(path.to_path_buf()));
        }

        let mut builder = Session::builder()
            .map_err(ort_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_error)?;
        if cuda {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(ort_error)?;
        }
        let session = builder.commit_from_file(path).map_err(ort_error)?;

        info!(
            "已加载模型 {} ({})，设备: {}",
            variant,
            path.display(),
            if cuda { "cuda" } else { "cpu" }
        );
        Ok(Self { session, variant, input_name: input_name.to_string() })
    }
}

impl Encoder for ClipEncoder {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn encode_batch(&mut self, images: &[Mat]) -> Result<Array2<f32>> {
        let dim = self.variant.dim();
        if images.is_empty() {
            return Ok(Array2::zeros((0, dim)));
        }

        let mut input = Vec::with_capacity(images.len() * 3 * (INPUT_SIZE * INPUT_SIZE) as usize);
        for image in images {
            input.extend(preprocess(image)?);
        }

        let shape = vec![images.len() as i64, 3, INPUT_SIZE as i64, INPUT_SIZE as i64];
        let tensor = Tensor::from_array((shape, input.into_boxed_slice())).map_err(ort_error)?;
        let outputs = self
            .session
            .run(ort::inputs! { self.input_name.as_str() => tensor })
            .map_err(ort_error)?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(ort_error)?;
        let dims: &[i64] = &shape;
        if dims.len() != 2 || dims[0] as usize != images.len() || dims[1] as usize != dim {
            return Err(Error::Inference(format!(
                "模型输出形状为 {:?}，期望 [{}, {}]",
                dims,
                images.len(),
                dim
            )));
        }

        let mut features = Array2::from_shape_vec((images.len(), dim), data.to_vec())
            .map_err(|e| Error::Inference(e.to_string()))?;
        l2_normalize_rows(&mut features);
        debug!("编码 {} 张图片", images.len());
        Ok(features)
    }
}

/// CLIP 预处理：短边缩放到 224（双三次插值），居中裁剪 224x224，
/// 按 CLIP 的均值和标准差归一化，输出 CHW 排列的数据
///
/// 输入必须是 8 位 RGB 图片
pub fn preprocess(image: &Mat) -> Result<Vec<f32>> {
    if image.channels() != 3 || image.depth() != core::CV_8U {
        return Err(Error::ImageDecode(String::from("编码器只接受 8 位 RGB 图片")));
    }

    let (w, h) = (image.cols(), image.rows());
    let scale = INPUT_SIZE as f64 / w.min(h) as f64;
    let new_w = ((w as f64 * scale) as i32).max(INPUT_SIZE);
    let new_h = ((h as f64 * scale) as i32).max(INPUT_SIZE);

    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(new_w, new_h),
        0.,
        0.,
        imgproc::InterpolationFlags::INTER_CUBIC as i32,
    )?;

    let x = ((new_w - INPUT_SIZE) as f64 / 2.).round() as i32;
    let y = ((new_h - INPUT_SIZE) as f64 / 2.).round() as i32;
    let roi = Mat::roi(&resized, Rect::new(x, y, INPUT_SIZE, INPUT_SIZE))?;
    let mut cropped = Mat::default();
    roi.copy_to(&mut cropped)?;

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut output = vec![0f32; 3 * plane];
    for (i, pixel) in cropped.data_typed::<core::Vec3b>()?.iter().enumerate() {
        for c in 0..3 {
            output[c * plane + i] = (pixel[c] as f32 / 255. - MEAN[c]) / STD[c];
        }
    }
    Ok(output)
}

fn ort_error(e: impl std::fmt::Display) -> Error {
    Error::Inference(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_produces_normalized_chw() -> anyhow::Result<()> {
        let image =
            Mat::new_rows_cols_with_default(300, 500, core::CV_8UC3, core::Scalar::all(255.))?;
        let data = preprocess(&image)?;
        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
        assert_eq!(data.len(), 3 * plane);
        for c in 0..3 {
            let expected = (1. - MEAN[c]) / STD[c];
            assert!((data[c * plane] - expected).abs() < 1e-4);
            assert!((data[c * plane + plane - 1] - expected).abs() < 1e-4);
        }
        Ok(())
    }

    #[test]
    fn preprocess_rejects_non_rgb() -> anyhow::Result<()> {
        let gray = Mat::new_rows_cols_with_default(32, 32, core::CV_8UC1, core::Scalar::all(0.))?;
        assert!(matches!(preprocess(&gray), Err(Error::ImageDecode(_))));
        Ok(())
    }

    #[test]
    fn missing_model_file_is_reported() {
        let loader = ClipLoader::new("/nonexistent/models", Device::Cpu);
        let err = loader.load(ModelVariant::VitB32).err();
        assert!(matches!(err, Some(Error::ModelNotFound(p)) if p.ends_with("ViT-B-32.onnx")));
    }
}
