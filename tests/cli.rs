mod common;

use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use common::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn list_empty_data_dir() -> Result<()> {
    let data_dir = TempDir::new()?;

    cargo_run!("picsearch", "-D", data_dir.path(), "list").success().stdout(predicate::str::is_empty());
    cargo_run!("picsearch", "-D", data_dir.path(), "list", "--output-format", "json")
        .success()
        .stdout(predicate::str::contains("[]"));

    Ok(())
}

#[test]
fn build_empty_folder_fails() -> Result<()> {
    let data_dir = TempDir::new()?;
    let source = TempDir::new()?;
    std::fs::write(source.path().join("readme.txt"), "no images")?;

    cargo_run!("picsearch", "-D", data_dir.path(), "--device", "cpu", "build", source.path(), "memes")
        .failure()
        .stderr(predicate::str::contains("没有找到图片"));
    assert!(!data_dir.path().join("databases/memes/stickers.faiss").exists());

    // 空数据库仍会出现在列表中，但没有索引
    cargo_run!("picsearch", "-D", data_dir.path(), "list")
        .success()
        .stdout(predicate::str::contains("memes\tempty\t0"));

    Ok(())
}

#[test]
fn search_missing_database_fails() -> Result<()> {
    let data_dir = TempDir::new()?;
    let image = data_dir.path().join("query.png");
    write_image(&image, RED)?;

    cargo_run!("picsearch", "-D", data_dir.path(), "--device", "cpu", "search", &image, "-d", "nothing")
        .failure()
        .stderr(predicate::str::contains("数据库不存在"));

    Ok(())
}

#[test]
fn invalid_database_name_is_rejected() -> Result<()> {
    let data_dir = TempDir::new()?;
    let image = data_dir.path().join("query.png");
    write_image(&image, RED)?;

    cargo_run!("picsearch", "-D", data_dir.path(), "search", &image, "-d", "../escape")
        .failure()
        .stderr(predicate::str::contains("无效的数据库名称"));

    Ok(())
}
