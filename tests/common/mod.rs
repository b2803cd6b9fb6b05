#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use ndarray::Array2;
use opencv::core::{self, Mat, Scalar, Size, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use picsearch::encoder::l2_normalize;
use picsearch::{Encoder, ModelLoader, ModelVariant};

/// 8x8x8 的颜色直方图，共 512 维，冒充 ViT-B/32
pub struct HistogramEncoder;

impl Encoder for HistogramEncoder {
    fn variant(&self) -> ModelVariant {
        ModelVariant::VitB32
    }

    fn encode_batch(&mut self, images: &[Mat]) -> picsearch::Result<Array2<f32>> {
        let mut features = Array2::zeros((images.len(), 512));
        for (i, image) in images.iter().enumerate() {
            let mut row = features.row_mut(i);
            for px in image.data_bytes()?.chunks_exact(3) {
                let bin = (px[0] as usize >> 5) * 64 + (px[1] as usize >> 5) * 8 + (px[2] as usize >> 5);
                row[bin] += 1.;
            }
            l2_normalize(row);
        }
        Ok(features)
    }
}

/// 16x16 的 RGB 缩略图，共 768 维，冒充 ViT-L/14
pub struct ThumbnailEncoder;

impl Encoder for ThumbnailEncoder {
    fn variant(&self) -> ModelVariant {
        ModelVariant::VitL14
    }

    fn encode_batch(&mut self, images: &[Mat]) -> picsearch::Result<Array2<f32>> {
        let mut features = Array2::zeros((images.len(), 768));
        for (i, image) in images.iter().enumerate() {
            let mut small = Mat::default();
            imgproc::resize(image, &mut small, Size::new(16, 16), 0., 0., imgproc::INTER_AREA)?;
            let mut row = features.row_mut(i);
            for (dst, src) in row.iter_mut().zip(small.data_bytes()?) {
                *dst = *src as f32 / 255.;
            }
            l2_normalize(row);
        }
        Ok(features)
    }
}

/// 不需要模型文件的加载器，记录加载次数
#[derive(Clone, Default)]
pub struct TestLoader {
    pub loads: Arc<AtomicUsize>,
    pub accelerated: bool,
}

impl TestLoader {
    pub fn accelerated() -> Self {
        Self { accelerated: true, ..Default::default() }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for TestLoader {
    fn load(&self, variant: ModelVariant) -> picsearch::Result<Box<dyn Encoder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(match variant {
            ModelVariant::VitB32 => Box::new(HistogramEncoder),
            ModelVariant::VitL14 => Box::new(ThumbnailEncoder),
        })
    }

    fn accelerated(&self) -> bool {
        self.accelerated
    }
}

/// 写入一张纯色图片
pub fn write_image(path: impl AsRef<Path>, rgb: [f64; 3]) -> Result<()> {
    let mat = Mat::new_rows_cols_with_default(
        32,
        32,
        core::CV_8UC3,
        Scalar::new(rgb[2], rgb[1], rgb[0], 0.),
    )?;
    imgcodecs::imwrite(&path.as_ref().to_string_lossy(), &mat, &Vector::new())?;
    Ok(())
}

/// 写入一组纯色图片
pub fn write_images(dir: impl AsRef<Path>, images: &[(&str, [f64; 3])]) -> Result<()> {
    std::fs::create_dir_all(dir.as_ref())?;
    for (name, rgb) in images {
        write_image(dir.as_ref().join(name), *rgb)?;
    }
    Ok(())
}

pub const RED: [f64; 3] = [220., 20., 20.];
pub const GREEN: [f64; 3] = [20., 200., 40.];
pub const BLUE: [f64; 3] = [30., 40., 230.];
pub const YELLOW: [f64; 3] = [230., 220., 30.];
