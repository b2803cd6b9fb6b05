use std::path::Path;

use indicatif::ProgressStyle;
use opencv::core::{self, Mat};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::{Error, Result};

/// 读取图片文件，保留原始的通道数与位深（OpenCV 的 BGR 顺序）
pub fn imread<P: AsRef<Path>>(path: P) -> Result<Mat> {
    let filename = path.as_ref().to_string_lossy();
    let img = imgcodecs::imread(&filename, imgcodecs::IMREAD_UNCHANGED)?;
    if img.empty() {
        return Err(Error::ImageDecode(filename.into_owned()));
    }
    Ok(img)
}

/// 从内存中解码图片，保留原始的通道数与位深
pub fn imdecode(bytes: &[u8]) -> Result<Mat> {
    let mat = Mat::from_slice(bytes)?;
    let img = imgcodecs::imdecode(&mat, imgcodecs::IMREAD_UNCHANGED)?;
    if img.empty() {
        return Err(Error::ImageDecode(format!("<{} 字节的数据>", bytes.len())));
    }
    Ok(img)
}

/// 读取图片文件，并转换为 3 通道 RGB
pub fn imread_rgb<P: AsRef<Path>>(path: P) -> Result<Mat> {
    to_rgb(&imread(path)?)
}

/// 将任意通道数、位深的 OpenCV 图片（BGR 顺序）转换为 8 位 RGB
///
/// 灰度图复制到三个通道，透明通道直接丢弃
pub fn to_rgb(img: &Mat) -> Result<Mat> {
    if img.empty() {
        return Err(Error::ImageDecode(String::from("空图片")));
    }

    let code = match img.channels() {
        1 => imgproc::COLOR_GRAY2RGB,
        3 => imgproc::COLOR_BGR2RGB,
        4 => imgproc::COLOR_BGRA2RGB,
        n => return Err(Error::ImageDecode(format!("不支持 {} 通道的图片", n))),
    };

    let mut rgb = Mat::default();
    if img.depth() == core::CV_8U {
        imgproc::cvt_color_def(img, &mut rgb, code)?;
    } else {
        // 16 位图片缩放到 0~255，其余位深按原值截断
        let scale = if img.depth() == core::CV_16U { 1. / 257. } else { 1. };
        let mut img8 = Mat::default();
        img.convert_to(&mut img8, core::CV_8U, scale, 0.)?;
        imgproc::cvt_color_def(&img8, &mut rgb, code)?;
    }
    Ok(rgb)
}

/// 是否为支持的图片后缀名，不区分大小写
pub fn is_image_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            matches!(ext.as_str(), "png" | "jpg" | "jpeg")
        })
        .unwrap_or(false)
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
