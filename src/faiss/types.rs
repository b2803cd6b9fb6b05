/// Faiss 搜索结果
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// 向量在索引中的行号
    pub index: i64,
    /// 向量与查询向量的平方欧氏距离
    pub distance: f32,
}
