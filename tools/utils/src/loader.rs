//! 对 `brats-berry` 路径约定的一层封装.

use brats_berry::dataset;
use std::env;
use std::path::PathBuf;

/// 原始数据目录的环境变量名.
pub const SOURCE_DIR_ENV: &str = "BRATS_SOURCE_DIR";

/// 获取 BraTS 原始数据目录.
///
/// 1. 若环境变量 `$BRATS_SOURCE_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/BraTS21`;
/// 3. 无法确定用户主目录时返回 `None`.
pub fn source_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(SOURCE_DIR_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["BraTS21"]),
    }
}
