//! 搜索会话
//!
//! [`SearchSession`] 持有模型缓存和当前活动数据库，所有会修改它们的操作都需要 `&mut self`。
//! 需要在多个线程间共享时使用 [`SharedSession`]，它用一把互斥锁串行化切换、建库和查询。

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, info};
use opencv::core::Mat;
use serde::Serialize;
use utoipa::ToSchema;

use crate::builder::{self, BuildReport};
use crate::database::{DatabaseDir, DatabaseRoot};
use crate::encoder::{ModelCache, ModelLoader, ModelVariant};
use crate::error::{Error, Result};
use crate::metrics;
use crate::store::{SearchHit, VectorStore};
use crate::utils;

/// 默认返回的结果数量
pub const DEFAULT_TOP_K: usize = 5;

/// 活动数据库的概况
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActiveStatus {
    pub name: String,
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// 图片目录的路径
    #[schema(value_type = String)]
    pub images_dir: PathBuf,
    pub images: usize,
    pub dim: usize,
    #[schema(value_type = String)]
    pub model: ModelVariant,
}

/// 搜索会话
#[derive(Debug)]
pub struct SearchSession {
    models: ModelCache,
    active: Option<VectorStore>,
}

impl SearchSession {
    /// 创建一个没有活动数据库的会话，模型在第一次使用时加载
    pub fn new<L: ModelLoader + 'static>(loader: L) -> Self {
        Self { models: ModelCache::new(Box::new(loader)), active: None }
    }

    /// 创建会话并打开指定数据库
    pub fn open<L: ModelLoader + 'static, P: AsRef<Path>>(loader: L, db_dir: P) -> Result<Self> {
        let mut session = Self::new(loader);
        session.switch(db_dir)?;
        Ok(session)
    }

    /// 当前活动数据库
    pub fn active(&self) -> Option<&VectorStore> {
        self.active.as_ref()
    }

    /// 当前活动数据库的概况
    pub fn status(&self) -> Option<ActiveStatus> {
        self.active.as_ref().map(|store| ActiveStatus {
            name: store.dir().name(),
            path: store.dir().path().to_path_buf(),
            images_dir: store.dir().images(),
            images: store.len(),
            dim: store.dim(),
            model: store.variant(),
        })
    }

    /// 当前已加载的模型规格
    pub fn loaded_model(&self) -> Option<ModelVariant> {
        self.models.loaded()
    }

    /// 新建数据库时会使用的模型规格
    pub fn variant_for_new_build(&self) -> ModelVariant {
        ModelVariant::for_new_build(self.models.accelerated())
    }

    /// 切换活动数据库
    ///
    /// 索引、名称列表和对应的模型都加载成功后才替换活动数据库，失败时保持原状
    pub fn switch<P: AsRef<Path>>(&mut self, db_dir: P) -> Result<()> {
        let db = DatabaseDir::new(db_dir.as_ref());
        let store = VectorStore::load(&db)?;
        self.models.encoder(store.variant())?;
        info!("切换到数据库 {} ({})", db.name(), store.variant());
        self.active = Some(store);
        Ok(())
    }

    /// 关闭活动数据库
    pub fn close(&mut self) {
        self.active = None;
    }

    /// 在 db_dir 中搜索与图片最相似的 k 张图片，db_dir 不是活动数据库时先切换过去
    pub fn query<P: AsRef<Path>>(
        &mut self,
        image: &Mat,
        db_dir: P,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let db_dir = db_dir.as_ref();
        let is_active = self.active.as_ref().map(|store| store.dir().path() == db_dir);
        if is_active != Some(true) {
            self.switch(db_dir)?;
        }
        self.search(image, k)
    }

    /// 在活动数据库中搜索
    ///
    /// image 为 [`utils::imread`] 等函数解码出的图片，任意通道数，会先转换为 RGB
    pub fn search(&mut self, image: &Mat, k: usize) -> Result<Vec<SearchHit>> {
        let store = self.active.as_ref().ok_or(Error::NotLoaded)?;
        let variant = store.variant();
        let start = Instant::now();

        let image = utils::to_rgb(image)?;
        let query = self.models.encoder(variant)?.encode(&image)?;
        let result = store.search(query.view(), k)?;

        let elapsed = start.elapsed().as_secs_f32();
        debug!("搜索耗时 {:.3}s，返回 {} 个结果", elapsed, result.len());
        metrics::observe_search(variant, elapsed, result.first().map(|hit| hit.score));
        Ok(result)
    }

    /// 解码图片数据后在活动数据库中搜索
    pub fn search_bytes(&mut self, bytes: &[u8], k: usize) -> Result<Vec<SearchHit>> {
        let image = utils::imdecode(bytes)?;
        self.search(&image, k)
    }

    /// 从 source 新建名为 name 的数据库，成功后新数据库成为活动数据库
    ///
    /// 模型规格由 [`ModelVariant::for_new_build`] 决定。
    /// 失败时活动数据库保持不变，即使覆盖的正是活动数据库
    pub fn build<P: AsRef<Path>>(
        &mut self,
        root: &DatabaseRoot,
        source: P,
        name: &str,
    ) -> Result<BuildReport> {
        let variant = self.variant_for_new_build();
        self.build_with(root, source, name, variant)
    }

    /// 使用指定的模型规格新建数据库
    pub fn build_with<P: AsRef<Path>>(
        &mut self,
        root: &DatabaseRoot,
        source: P,
        name: &str,
        variant: ModelVariant,
    ) -> Result<BuildReport> {
        let (store, report) =
            builder::build_database(&mut self.models, root, source.as_ref(), name, variant)?;
        metrics::observe_build(variant, report.images);
        info!("切换到新建的数据库 {}", name);
        self.active = Some(store);
        Ok(report)
    }

    /// 使用活动数据库自己的图片目录重新建立索引，模型规格保持不变
    pub fn rebuild(&mut self) -> Result<BuildReport> {
        let (db, variant) = match &self.active {
            Some(store) => (store.dir().clone(), store.variant()),
            None => return Err(Error::NotLoaded),
        };
        let (store, report) = builder::index_database(&mut self.models, &db, variant)?;
        metrics::observe_build(variant, report.images);
        self.active = Some(store);
        Ok(report)
    }
}

/// 线程间共享的搜索会话
///
/// 同一时间只有一个操作持有会话，切换数据库时查询会等待切换完成
#[derive(Debug, Clone)]
pub struct SharedSession(Arc<Mutex<SearchSession>>);

impl SharedSession {
    pub fn new(session: SearchSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// 独占会话
    pub fn lock(&self) -> Result<MutexGuard<'_, SearchSession>> {
        self.0.lock().map_err(|_| Error::Poisoned)
    }

    pub fn switch<P: AsRef<Path>>(&self, db_dir: P) -> Result<()> {
        self.lock()?.switch(db_dir)
    }

    pub fn query<P: AsRef<Path>>(&self, image: &Mat, db_dir: P, k: usize) -> Result<Vec<SearchHit>> {
        self.lock()?.query(image, db_dir, k)
    }

    pub fn search_bytes(&self, bytes: &[u8], k: usize) -> Result<Vec<SearchHit>> {
        self.lock()?.search_bytes(bytes, k)
    }

    pub fn build<P: AsRef<Path>>(
        &self,
        root: &DatabaseRoot,
        source: P,
        name: &str,
    ) -> Result<BuildReport> {
        self.lock()?.build(root, source, name)
    }

    pub fn status(&self) -> Result<Option<ActiveStatus>> {
        Ok(self.lock()?.status())
    }
}
