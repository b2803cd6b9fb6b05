use std::fs;
use std::io::{BufWriter, Write};

use log::{debug, info};
use ndarray::{ArrayView1, Axis};
use serde::Serialize;
use utoipa::ToSchema;

use crate::database::DatabaseDir;
use crate::encoder::ModelVariant;
use crate::error::{Error, Result};
use crate::faiss::FlatIndex;

/// 一条搜索结果
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct SearchHit {
    /// 图片相对于图片目录的路径
    pub name: String,
    /// 相似度，范围 (0, 1]，等于 `1 / (1 + 距离)`
    pub score: f32,
}

/// 将平方欧氏距离转换为相似度
pub fn distance_to_score(distance: f32) -> f32 {
    1. / (1. + distance.max(0.))
}

/// 向量索引与名称列表，两者按行一一对应
#[derive(Debug)]
pub struct VectorStore {
    dir: DatabaseDir,
    index: FlatIndex,
    names: Vec<String>,
}

impl VectorStore {
    /// 组合索引与名称列表，行数不一致时返回 [`Error::Inconsistent`]
    pub fn new(dir: DatabaseDir, index: FlatIndex, names: Vec<String>) -> Result<Self> {
        if names.len() != index.ntotal() {
            return Err(Error::Inconsistent { names: names.len(), rows: index.ntotal() });
        }
        Ok(Self { dir, index, names })
    }

    /// 从数据库目录加载索引与名称列表
    ///
    /// 两个文件都读取并校验成功后才返回，不会修改磁盘上的任何内容
    pub fn load(dir: &DatabaseDir) -> Result<Self> {
        if !dir.is_ready() {
            return Err(Error::DatabaseNotFound(dir.path().to_path_buf()));
        }
        let index = FlatIndex::from_file(dir.index())?;
        let names: Vec<String> = serde_json::from_slice(&fs::read(dir.names())?)?;
        let store = Self::new(dir.clone(), index, names)?;
        info!(
            "已加载数据库 {}: {} 张图片，维数 {}",
            store.dir.name(),
            store.len(),
            store.dim()
        );
        Ok(store)
    }

    /// 保存到数据库目录
    ///
    /// 先写名称列表，最后写索引，两者都通过临时文件重命名的方式写入，
    /// 读取方只要能看到索引文件，就一定能看到与之对应的名称列表
    pub fn save(&self) -> Result<()> {
        let names_path = self.dir.names();
        let tmp_path = names_path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, &self.names)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &names_path)?;
        self.index.write_file(self.dir.index())?;
        debug!("已保存数据库 {}", self.dir.path().display());
        Ok(())
    }

    pub fn dir(&self) -> &DatabaseDir {
        &self.dir
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 向量维数
    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    /// 查询该数据库应使用的模型规格
    pub fn variant(&self) -> ModelVariant {
        ModelVariant::for_existing_index(self.dim())
    }

    /// 搜索与 query 最相近的 k 张图片，按相似度从高到低排列
    ///
    /// k 超过图片数量时只返回全部图片
    pub fn search(&self, query: ArrayView1<f32>, k: usize) -> Result<Vec<SearchHit>> {
        let k = k.min(self.len());
        let neighbors = self.index.search(query.insert_axis(Axis(0)), k)?;

        let mut result = neighbors
            .into_iter()
            .flatten()
            .map(|neighbor| {
                let name = self.names.get(neighbor.index as usize).ok_or(Error::Inconsistent {
                    names: self.names.len(),
                    rows: self.index.ntotal(),
                })?;
                Ok(SearchHit { name: name.clone(), score: distance_to_score(neighbor.distance) })
            })
            .collect::<Result<Vec<_>>>()?;
        result.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_one_at_zero_distance() {
        assert_eq!(distance_to_score(0.), 1.);
        assert!((distance_to_score(1.) - 0.5).abs() < 1e-6);
        assert!(distance_to_score(4.) < distance_to_score(2.));
        assert!(distance_to_score(1e6) > 0.);
    }

    #[test]
    fn rounding_below_zero_is_clamped() {
        assert_eq!(distance_to_score(-1e-7), 1.);
    }
}
