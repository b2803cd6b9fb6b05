//! 数据库目录结构
//!
//! ```text
//! <databases>/<name>/
//!   stickers/        源图片的副本
//!   stickers.faiss   序列化的 IndexFlatL2
//!   stickers.json    名称列表，第 i 项对应索引第 i 行
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use utoipa::ToSchema;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::utils::is_image_file;

pub const IMAGE_DIR: &str = "stickers";
pub const INDEX_FILE: &str = "stickers.faiss";
pub const NAMES_FILE: &str = "stickers.json";

/// 存放所有数据库的根目录
#[derive(Debug, Clone)]
pub struct DatabaseRoot {
    path: PathBuf,
}

impl DatabaseRoot {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 返回指定名称的数据库目录，不检查是否存在
    pub fn get(&self, name: &str) -> Result<DatabaseDir> {
        validate_name(name)?;
        Ok(DatabaseDir::new(self.path.join(name)))
    }

    /// 创建数据库目录及其图片目录，已存在时直接返回
    pub fn create(&self, name: &str) -> Result<DatabaseDir> {
        let db = self.get(name)?;
        fs::create_dir_all(db.images())?;
        Ok(db)
    }

    /// 按名称排序列出所有数据库
    pub fn list(&self) -> Result<Vec<DatabaseInfo>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let mut result = vec![];
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let db = DatabaseDir::new(entry.path());
            result.push(DatabaseInfo {
                name: db.name(),
                ready: db.is_ready(),
                images: db.count_images(),
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }
}

/// 数据库概况
#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
pub struct DatabaseInfo {
    pub name: String,
    /// 是否已经建立索引
    pub ready: bool,
    /// 图片目录中的图片数量
    pub images: usize,
}

/// 单个数据库的目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseDir {
    path: PathBuf,
}

impl DatabaseDir {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 数据库名称，即目录名
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// 返回图片目录的路径
    pub fn images(&self) -> PathBuf {
        self.path.join(IMAGE_DIR)
    }

    /// 返回索引文件的路径
    pub fn index(&self) -> PathBuf {
        self.path.join(INDEX_FILE)
    }

    /// 返回名称列表文件的路径
    pub fn names(&self) -> PathBuf {
        self.path.join(NAMES_FILE)
    }

    /// 索引文件是否存在
    pub fn is_ready(&self) -> bool {
        self.index().is_file()
    }

    fn count_images(&self) -> usize {
        list_images(self.images()).map(|images| images.len()).unwrap_or(0)
    }
}

/// 图片目录中的一张图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// 相对于图片目录的路径，使用 `/` 分隔
    pub name: String,
    pub path: PathBuf,
}

/// 递归列出目录中的图片（png/jpg/jpeg，不区分大小写），按相对路径排序并去重
pub fn list_images<P: AsRef<Path>>(dir: P) -> Result<Vec<ImageEntry>> {
    let dir = dir.as_ref();
    let mut images = vec![];
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_image_file(entry.path()) {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        images.push(ImageEntry { name: relative_name(relative), path: entry.into_path() });
    }
    // 按路径分量比较，`a/x.png` 排在 `a-b/x.png` 之前
    images.sort_by(|a, b| Path::new(&a.name).cmp(Path::new(&b.name)));
    images.dedup_by(|a, b| a.name == b.name);
    Ok(images)
}

/// 列出 source 目录第一层中的图片，按文件名排序
pub fn source_images<P: AsRef<Path>>(source: P) -> Result<Vec<PathBuf>> {
    let mut images = vec![];
    for entry in fs::read_dir(source)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// 复制 source 目录第一层中的图片到 target，同名文件会被覆盖，返回复制的数量
pub fn copy_images<P: AsRef<Path>, Q: AsRef<Path>>(source: P, target: Q) -> Result<usize> {
    let (source, target) = (source.as_ref(), target.as_ref());
    fs::create_dir_all(target)?;
    if fs::canonicalize(source)? == fs::canonicalize(target)? {
        return Ok(0);
    }

    let images = source_images(source)?;
    for path in &images {
        if let Some(file_name) = path.file_name() {
            fs::copy(path, target.join(file_name))?;
        }
    }
    debug!("从 {} 复制了 {} 张图片", source.display(), images.len());
    Ok(images.len())
}

fn relative_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// 数据库名称只能是单层目录名
fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_must_be_single_component() {
        let root = DatabaseRoot::new("/tmp/databases");
        assert!(root.get("memes").is_ok());
        assert!(root.get("表情包").is_ok());
        for name in ["", "  ", ".", "..", "a/b", "a\\b", "x\ny"] {
            assert!(matches!(root.get(name), Err(Error::InvalidName(_))), "{:?}", name);
        }
    }

    #[test]
    fn layout_uses_fixed_file_names() -> Result<()> {
        let db = DatabaseRoot::new("/data/databases").get("memes")?;
        assert_eq!(db.name(), "memes");
        assert_eq!(db.images(), Path::new("/data/databases/memes/stickers"));
        assert_eq!(db.index(), Path::new("/data/databases/memes/stickers.faiss"));
        assert_eq!(db.names(), Path::new("/data/databases/memes/stickers.json"));
        Ok(())
    }

    #[test]
    fn list_images_sorts_and_filters() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("sub"))?;
        for name in ["b.PNG", "a.jpg", "sub/c.jpeg", "notes.txt", "d.webp"] {
            fs::write(dir.path().join(name), b"")?;
        }
        let names: Vec<_> = list_images(dir.path())?.into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "sub/c.jpeg"]);
        Ok(())
    }

    #[test]
    fn list_images_compares_path_components() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for sub in ["a", "a-b"] {
            fs::create_dir(dir.path().join(sub))?;
            fs::write(dir.path().join(sub).join("x.png"), b"")?;
        }
        let names: Vec<_> = list_images(dir.path())?.into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a/x.png", "a-b/x.png"]);
        Ok(())
    }

    #[test]
    fn copy_images_only_takes_top_level_images() -> Result<()> {
        let source = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        fs::create_dir(source.path().join("nested"))?;
        for name in ["a.png", "b.txt", "nested/c.png"] {
            fs::write(source.path().join(name), b"x")?;
        }
        assert_eq!(copy_images(source.path(), target.path().join("stickers"))?, 1);
        assert!(target.path().join("stickers/a.png").is_file());
        assert!(!target.path().join("stickers/c.png").exists());
        Ok(())
    }
}
