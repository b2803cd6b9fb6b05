use std::ffi::{CStr, CString};
use std::io;
use std::path::Path;
use std::ptr;

use faiss_sys::*;
use log::debug;
use ndarray::{Array2, ArrayView2};

use super::faiss_try;
use super::types::*;
use crate::error::{Error, Result};

/// faiss 中 `METRIC_L2` 的取值
const METRIC_L2: u32 = 1;

/// 暴力搜索的 Faiss 索引（IndexFlatL2），距离为平方欧氏距离
pub struct FlatIndex {
    index: *mut FaissIndex,
    /// 向量维数
    d: usize,
}

impl FlatIndex {
    /// 创建一个新的空索引
    ///
    /// # Arguments
    ///
    /// * `d` - 向量维数
    pub fn new(d: usize) -> Result<Self> {
        let mut index = ptr::null_mut();
        unsafe {
            faiss_try(faiss_IndexFlatL2_new_with(&mut index, d as idx_t))?;
        }
        Ok(Self { index: index.cast(), d })
    }

    /// 从文件加载索引，只接受 IndexFlatL2
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fname = path_to_cstring(path)?;
        let mut index = ptr::null_mut();
        unsafe {
            faiss_try(faiss_read_index_fname(fname.as_ptr(), 0, &mut index))?;
        }
        let d = unsafe { faiss_Index_d(index) };
        // 之后出错时由 Drop 负责释放
        let this = Self { index, d: d.max(0) as usize };

        if unsafe { faiss_IndexFlat_cast(this.index) }.is_null() {
            return Err(Error::InvalidIndex(format!("{} 不是 Flat 索引", path.display())));
        }
        if unsafe { faiss_Index_metric_type(this.index) } as u32 != METRIC_L2 {
            return Err(Error::InvalidIndex(format!("{} 不是 L2 距离索引", path.display())));
        }
        if this.d == 0 {
            return Err(Error::InvalidIndex(format!("{} 的向量维数为 0", path.display())));
        }

        debug!("从 {} 加载索引: d = {}, ntotal = {}", path.display(), this.d, this.ntotal());
        Ok(this)
    }

    /// 向量维数
    pub fn dim(&self) -> usize {
        self.d
    }

    /// 该索引中的向量数量
    pub fn ntotal(&self) -> usize {
        unsafe { faiss_Index_ntotal(self.index) as usize }
    }

    /// 将索引写入到文件，考虑到中途打断的情况，使用临时文件写入再重命名
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("faiss.tmp");
        let fname = path_to_cstring(&tmp_path)?;
        unsafe {
            faiss_try(faiss_write_index_fname(self.index, fname.as_ptr()))?;
        }
        std::fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// 添加若干条向量到索引中，行号依次递增
    ///
    /// # Arguments
    ///
    /// * `v` - 向量，大小为 (n, d)
    pub fn add(&mut self, v: ArrayView2<f32>) -> Result<()> {
        self.check_dim(v.ncols())?;
        let v = v.as_standard_layout();
        unsafe {
            faiss_try(faiss_Index_add(self.index, v.nrows() as idx_t, v.as_ptr()))?;
        }
        Ok(())
    }

    /// 批量搜索 points 中的向量，对每个向量，返回 knn 个最近邻，按距离从近到远排列
    ///
    /// # Arguments
    ///
    /// * `points` - 需要搜索的向量数组，大小为 (n, d)
    /// * `knn` - 每个向量需要返回的最近邻数量
    pub fn search(&self, points: ArrayView2<f32>, knn: usize) -> Result<Vec<Vec<Neighbor>>> {
        self.check_dim(points.ncols())?;
        if knn == 0 || points.nrows() == 0 {
            return Ok(vec![vec![]; points.nrows()]);
        }

        let points = points.as_standard_layout();
        let mut distances = vec![0f32; points.nrows() * knn];
        let mut labels = vec![-1 as idx_t; points.nrows() * knn];
        unsafe {
            faiss_try(faiss_Index_search(
                self.index,
                points.nrows() as idx_t,
                points.as_ptr(),
                knn as idx_t,
                distances.as_mut_ptr(),
                labels.as_mut_ptr(),
            ))?;
        }

        // 不足 knn 个结果时 faiss 以 -1 填充
        let result = labels
            .chunks(knn)
            .zip(distances.chunks(knn))
            .map(|(labels, distances)| {
                labels
                    .iter()
                    .zip(distances)
                    .filter(|(index, _)| **index >= 0)
                    .map(|(index, distance)| Neighbor { index: *index, distance: *distance })
                    .collect()
            })
            .collect();
        Ok(result)
    }

    /// 取出索引中存储的全部向量，大小为 (ntotal, d)
    pub fn vectors(&self) -> Result<Array2<f32>> {
        let mut output = Array2::zeros((self.ntotal(), self.d));
        if output.is_empty() {
            return Ok(output);
        }
        unsafe {
            faiss_try(faiss_Index_reconstruct_n(
                self.index,
                0,
                self.ntotal() as idx_t,
                output.as_mut_ptr(),
            ))?;
        }
        Ok(output)
    }

    fn check_dim(&self, actual: usize) -> Result<()> {
        if actual != self.d {
            return Err(Error::DimensionMismatch { expected: self.d, actual });
        }
        Ok(())
    }
}

impl Drop for FlatIndex {
    fn drop(&mut self) {
        debug!("释放 faiss 索引");
        unsafe {
            faiss_Index_free(self.index);
        }
    }
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex").field("d", &self.d).field("ntotal", &self.ntotal()).finish()
    }
}

unsafe impl Sync for FlatIndex {}
unsafe impl Send for FlatIndex {}

fn path_to_cstring(path: &Path) -> Result<CString> {
    let s = path.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("路径不是 UTF-8: {}", path.display()))
    })?;
    CString::new(s).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e).into())
}

/// 获取 faiss 版本
pub fn faiss_version() -> String {
    let version = unsafe { faiss_get_version() };
    let version = unsafe { CStr::from_ptr(version) };
    version.to_string_lossy().to_string()
}
