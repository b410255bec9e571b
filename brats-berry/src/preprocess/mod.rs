//! 原始 BraTS 体数据到逐切片 npz 文件的预处理.
//!
//! 输出目录布局:
//!
//! ```text
//! <root>/preprocessed_data_<mod>_<pre><post>/
//!     data_splits/{train,val,test}/scans.csv
//!     npy_{train,val,test}/patient_<id>/slice_<idx>.npz
//! ```
//!
//! 其中 `<root>` 是原始数据目录的父目录.

use crate::consts::names::{PATIENT_PREFIX, SPLITS_DIR};
use crate::consts::SPLIT_SEED;
use crate::data::slice::slice_file_name;
use crate::data::{BratsVolume, Modality, NiftiHeaderAttr, SliceTrim};
use crate::dataset::Split;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

mod manifest;

pub use manifest::SplitManifest;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 预处理参数.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PreprocessConfig {
    /// 原始数据目录, 其下每个子目录是一个病人.
    pub source: PathBuf,

    /// 模态组合.
    pub modality: Modality,

    /// 首尾切片裁剪.
    pub trim: SliceTrim,

    /// 是否将切片缩放到 128x128.
    pub downsample: bool,
}

impl PreprocessConfig {
    /// 以默认的裁剪 (不裁剪) 和原分辨率初始化.
    pub fn new<P: AsRef<Path>>(source: P, modality: Modality) -> Self {
        Self {
            source: source.as_ref().to_owned(),
            modality,
            trim: SliceTrim::default(),
            downsample: false,
        }
    }

    /// 输出根目录 `<source 父目录>/preprocessed_data_<mod>_<pre><post>`.
    pub fn output_root(&self) -> PathBuf {
        let parent = self.source.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!(
            "preprocessed_data_{}_{}",
            self.modality,
            self.trim.tag()
        ))
    }

    /// 划分清单目录.
    #[inline]
    pub fn splits_dir(&self) -> PathBuf {
        self.output_root().join(SPLITS_DIR)
    }

    /// 划分 `split` 的切片输出目录.
    #[inline]
    pub fn split_dir(&self, split: Split) -> PathBuf {
        self.output_root().join(split.npy_dir_name())
    }
}

/// 单个病人的预处理结果.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessedPatient {
    /// 病人 id.
    pub patient: String,

    /// 输出目录.
    pub dir: PathBuf,

    /// 保留的切片范围 (相对裁剪后的体数据).
    pub range: Range<usize>,
}

/// 预处理单个病人, 把含脑组织的每一层切片写到 `target/patient_<id>/slice_<idx>.npz`.
///
/// 步骤依次为: 读取, 首尾裁剪, 标签二值化, 前景分位数归一化, 求脑组织范围,
/// (可选) 缩放, 保存. 切片序号相对裁剪后的体数据计数.
pub fn process_patient<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    target: Q,
    modality: Modality,
    trim: SliceTrim,
    downsample: bool,
) -> Result<ProcessedPatient> {
    let mut volume = BratsVolume::open(path.as_ref(), modality)?;
    volume.trim(trim);
    volume.binarize_label();

    volume.normalise_percentile()?;
    let range = volume.brain_range()?;
    debug_assert!(range.end <= volume.len_z());

    // 前面的步骤都成功后才建目录, 失败的病人不会留下空目录.
    let dir = target
        .as_ref()
        .join(format!("{PATIENT_PREFIX}{}", volume.patient()));
    fs::create_dir_all(&dir)?;

    for z in range.clone() {
        let record = volume.slice_at(z);
        let record = if downsample {
            record.downsample()
        } else {
            record
        };
        record.save_npz(dir.join(slice_file_name(z)))?;
    }

    Ok(ProcessedPatient {
        patient: volume.patient().to_string(),
        dir,
        range,
    })
}

/// 列出 `source` 下的所有病人目录名, 按名字排序.
pub fn list_patients<P: AsRef<Path>>(source: P) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source.as_ref())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// 整个数据集的预处理程序.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// 初始化.
    #[inline]
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// 获取参数.
    #[inline]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// 读取划分清单; 若不存在则先以固定种子生成.
    pub fn manifest(&self) -> Result<SplitManifest> {
        let patients = list_patients(&self.config.source)?;
        SplitManifest::load_or_create(self.config.splits_dir(), &patients, SPLIT_SEED)
    }

    /// 串行处理所有划分中的所有病人. 任一病人失败即终止.
    pub fn run(&self) -> Result<Vec<(Split, Vec<ProcessedPatient>)>> {
        let manifest = self.manifest()?;
        let mut ans = Vec::with_capacity(Split::ALL.len());
        for split in Split::ALL {
            let patients = manifest.patients(split);
            info!("Patients in {split}: {}", patients.len());

            let target = self.config.split_dir(split);
            let pb = progress_bar(patients.len());
            let mut done = Vec::with_capacity(patients.len());
            for p in patients {
                done.push(self.process_one(p, &target)?);
                pb.inc(1);
            }
            pb.finish();
            ans.push((split, done));
        }
        Ok(ans)
    }

    #[inline]
    fn process_one(&self, patient: &str, target: &Path) -> Result<ProcessedPatient> {
        let c = &self.config;
        process_patient(c.source.join(patient), target, c.modality, c.trim, c.downsample)
    }
}

/// `tqdm` 风格的进度条.
fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
        use rayon::ThreadPoolBuilder;
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl Preprocessor {
    /// 借助 `rayon`, 以 `jobs` 个线程并行处理病人.
    ///
    /// 病人之间没有共享状态; 返回结果中每个划分内的病人顺序与清单一致.
    pub fn par_run(&self, jobs: usize) -> Result<Vec<(Split, Vec<ProcessedPatient>)>> {
        let manifest = self.manifest()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build()
            .map_err(|e| crate::error::BratsError::Io(std::io::Error::other(e)))?;

        let mut ans = Vec::with_capacity(Split::ALL.len());
        for split in Split::ALL {
            let patients = manifest.patients(split);
            info!("Patients in {split}: {}", patients.len());

            let target = self.config.split_dir(split);
            let pb = progress_bar(patients.len());
            let done = pool.install(|| {
                patients
                    .par_iter()
                    .map(|p| {
                        let r = self.process_one(p, &target);
                        pb.inc(1);
                        r
                    })
                    .collect::<Result<Vec<_>>>()
            })?;
            pb.finish();
            ans.push((split, done));
        }
        Ok(ans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_layout() {
        let mut c = PreprocessConfig::new("/data/BraTS21", Modality::All);
        assert_eq!(
            c.output_root(),
            PathBuf::from("/data/preprocessed_data_all_-1-1")
        );
        c.trim = SliceTrim::new(0, 0);
        assert_eq!(
            c.split_dir(Split::Val),
            PathBuf::from("/data/preprocessed_data_all_00/npy_val")
        );
        assert_eq!(
            c.splits_dir(),
            PathBuf::from("/data/preprocessed_data_all_00/data_splits")
        );
    }

    #[test]
    fn test_list_patients_sorted_dirs_only() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["b", "a", "c"] {
            fs::create_dir(dir.path().join(n)).unwrap();
        }
        fs::write(dir.path().join("README"), "x").unwrap();
        assert_eq!(list_patients(dir.path()).unwrap(), ["a", "b", "c"]);
    }
}
