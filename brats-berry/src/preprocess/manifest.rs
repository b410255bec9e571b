//! 病人划分清单.
//!
//! 清单在第一次预处理时以固定种子随机生成并写入磁盘, 此后每次运行都只读取,
//! 以保证不同运行之间划分一致. 清单存在与否是唯一的生成闸门,
//! 并发的首次运行之间没有互斥保护.

use crate::consts::names::MANIFEST_FILE;
use crate::consts::{TRAIN_FRACTION, VAL_FRACTION};
use crate::dataset::Split;
use crate::error::Result;
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::Path;

/// 训练 / 验证 / 测试三个划分各自包含的病人目录名.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SplitManifest {
    train: Vec<String>,
    val: Vec<String>,
    test: Vec<String>,
}

impl SplitManifest {
    /// 以 `seed` 打乱 `patients` 后按 80/5/15 划分.
    ///
    /// 训练集取 `floor(0.80 n)` 个, 验证集取 `floor(0.05 n)` 个, 其余为测试集.
    pub fn generate(patients: &[String], seed: u64) -> Self {
        let n = patients.len();
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let n_train = (n as f64 * TRAIN_FRACTION) as usize;
        let n_val = (n as f64 * VAL_FRACTION) as usize;
        let pick = |r: &[usize]| r.iter().map(|i| patients[*i].clone()).collect();

        Self {
            train: pick(&indices[..n_train]),
            val: pick(&indices[n_train..n_train + n_val]),
            test: pick(&indices[n_train + n_val..]),
        }
    }

    /// 获取划分 `split` 中的病人目录名.
    #[inline]
    pub fn patients(&self, split: Split) -> &[String] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    /// 病人总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// 清单是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 写入 `splits_dir/{train,val,test}/scans.csv`, 每行一个病人目录名, 末尾无换行.
    pub fn write<P: AsRef<Path>>(&self, splits_dir: P) -> Result<()> {
        for split in Split::ALL {
            let dir = splits_dir.as_ref().join(split.name());
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(MANIFEST_FILE), self.patients(split).join("\n"))?;
        }
        Ok(())
    }

    /// 从 `splits_dir` 读取清单. 每行首尾空白会被去掉, 空行被忽略.
    pub fn read<P: AsRef<Path>>(splits_dir: P) -> Result<Self> {
        let read_one = |split: Split| -> Result<Vec<String>> {
            let path = splits_dir.as_ref().join(split.name()).join(MANIFEST_FILE);
            Ok(fs::read_to_string(path)?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect())
        };
        Ok(Self {
            train: read_one(Split::Train)?,
            val: read_one(Split::Val)?,
            test: read_one(Split::Test)?,
        })
    }

    /// 若 `splits_dir` 不存在则生成并写入清单; 无论如何都从磁盘读回清单.
    pub fn load_or_create<P: AsRef<Path>>(splits_dir: P, patients: &[String], seed: u64) -> Result<Self> {
        let dir = splits_dir.as_ref();
        if !dir.exists() {
            info!("Creating data splits under {}", dir.display());
            Self::generate(patients, seed).write(dir)?;
        }
        let manifest = Self::read(dir)?;
        for split in Split::ALL {
            if manifest.patients(split).is_empty() {
                warn!("Split `{split}` has no patients");
            }
        }
        Ok(manifest)
    }
}
