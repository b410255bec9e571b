//! 数据集操作.
//!
//! 将预处理产生的切片文件组织为可索引的数据集:
//! 单个病人的 [`PatientDataset`] 与按划分拼接而成的 [`BrainDataset`].

use crate::error::{BratsError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod brain;
mod concat;
mod patient;
pub mod transform;

pub use brain::{load_brats, BrainDataset, BrainDatasetConfig, Sample};
pub use concat::ConcatIndex;
pub use patient::{PatientDataset, Process, SkipCondition};
pub use transform::BrainSlice;

/// 数据集划分. 一个病人只属于其中之一.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Split {
    /// 训练集.
    Train,

    /// 验证集.
    #[default]
    Val,

    /// 测试集.
    Test,
}

impl Split {
    /// 按固定顺序排列的全部划分.
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// 划分名.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// 该划分的切片输出目录名, 形如 `npy_train`.
    #[inline]
    pub fn npy_dir_name(self) -> String {
        format!("npy_{}", self.name())
    }

    /// 是否为训练集.
    #[inline]
    pub fn is_train(self) -> bool {
        matches!(self, Split::Train)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Split {
    type Err = BratsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(BratsError::InvalidSplit(other.to_string())),
        }
    }
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
