use super::patient::{PatientDataset, SkipCondition};
use super::transform::{self, BrainSlice};
use super::{ConcatIndex, Split};
use crate::error::{BratsError, Result};
use log::{info, warn};
use ndarray::Array3;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [`BrainDataset`] 的构造参数.
///
/// 默认值: 验证集, 不指定病人数, 肿瘤组保留健康切片, 健康组跳过肿瘤切片,
/// 分组模式, 不返回标签, 种子 0.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BrainDatasetConfig {
    /// 数据集划分.
    pub split: Split,

    /// "肿瘤" 组病人数.
    pub n_tumour_patients: Option<usize>,

    /// "健康" 组病人数.
    pub n_healthy_patients: Option<usize>,

    /// 是否跳过 "肿瘤" 组病人的健康切片.
    pub skip_healthy_in_tumour: bool,

    /// 是否跳过 "健康" 组病人的肿瘤切片.
    pub skip_tumour_in_healthy: bool,

    /// 混合模式: 不分组, 不跳过任何切片.
    pub mixed: bool,

    /// 训练集是否同时返回切片级标签.
    pub ret_lab: bool,

    /// 打乱病人顺序所用的种子.
    pub seed: u64,

    /// 混合模式下使用的病人数. `None` 表示全部.
    pub num_mix: Option<usize>,
}

impl Default for BrainDatasetConfig {
    fn default() -> Self {
        Self {
            split: Split::Val,
            n_tumour_patients: None,
            n_healthy_patients: None,
            skip_healthy_in_tumour: false,
            skip_tumour_in_healthy: true,
            mixed: false,
            ret_lab: false,
            seed: 0,
            num_mix: None,
        }
    }
}

/// 数据集输出的单个样本. 具体形态由划分和 `ret_lab` 决定.
#[derive(Clone, Debug, PartialEq)]
pub enum Sample {
    /// 训练集, 仅图像.
    Image(Array3<f32>),

    /// 训练集, 图像与切片级标签.
    Labelled(Array3<f32>, u8),

    /// 验证集/测试集: 图像, 二值标签图与切片级标签.
    Full {
        /// `(c, h, w)` 图像.
        image: Array3<f32>,
        /// `(1, h, w)` 标签图.
        mask: Array3<f32>,
        /// 切片级标签.
        label: u8,
    },
}

impl Sample {
    /// 图像部分.
    pub fn image(&self) -> &Array3<f32> {
        match self {
            Sample::Image(image) | Sample::Labelled(image, _) => image,
            Sample::Full { image, .. } => image,
        }
    }

    /// 切片级标签 (若有).
    pub fn label(&self) -> Option<u8> {
        match self {
            Sample::Image(_) => None,
            Sample::Labelled(_, label) | Sample::Full { label, .. } => Some(*label),
        }
    }
}

/// 某一划分下所有 (选中) 病人切片拼接成的数据集.
///
/// 分组模式下索引空间中 "肿瘤" 组病人排在 "健康" 组之前,
/// 每个病人内部保持切片序号顺序.
#[derive(Debug, Clone)]
pub struct BrainDataset {
    split: Split,
    ret_lab: bool,
    patients: Vec<PatientDataset<BrainSlice>>,
    index: ConcatIndex,
    n_tumour_patients: usize,
}

/// 列出 `dir` 下所有病人目录并按名称排序.
fn sorted_patient_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

type Plan = (PathBuf, usize, Option<SkipCondition<BrainSlice>>);

fn build_patient((dir, id, skip): Plan) -> Result<PatientDataset<BrainSlice>> {
    PatientDataset::new(dir, transform::process, Some(id), skip)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        fn build_all(plan: Vec<Plan>) -> Result<Vec<PatientDataset<BrainSlice>>> {
            plan.into_par_iter().map(build_patient).collect()
        }

        fn collect_labels(ds: &BrainDataset) -> Result<Vec<u8>> {
            (0..ds.len())
                .into_par_iter()
                .map(|i| ds.slice(i).map(|s| s.label))
                .collect()
        }
    } else {
        fn build_all(plan: Vec<Plan>) -> Result<Vec<PatientDataset<BrainSlice>>> {
            plan.into_iter().map(build_patient).collect()
        }

        fn collect_labels(ds: &BrainDataset) -> Result<Vec<u8>> {
            (0..ds.len()).map(|i| ds.slice(i).map(|s| s.label)).collect()
        }
    }
}

impl BrainDataset {
    /// 从 `datapath/npy_{split}` 构造数据集.
    pub fn new<P: AsRef<Path>>(datapath: P, config: &BrainDatasetConfig) -> Result<Self> {
        let dir = datapath.as_ref().join(config.split.npy_dir_name());
        let mut patient_dirs = sorted_patient_dirs(&dir)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        patient_dirs.shuffle(&mut rng);

        let available = patient_dirs.len();
        if available == 0 {
            warn!("No patient directories found in {}", dir.display());
        }

        let (n_tumour, plan): (usize, Vec<Plan>) = if config.mixed {
            let n = config.num_mix.unwrap_or(available);
            check_available(n, available)?;
            let plan = patient_dirs
                .into_iter()
                .take(n)
                .enumerate()
                .map(|(i, p)| (p, i, None))
                .collect();
            (n, plan)
        } else {
            let (n_tumour, n_healthy) = match (config.n_tumour_patients, config.n_healthy_patients) {
                (None, None) => return Err(BratsError::MissingPatientCounts),
                (Some(t), h) => (t, h.unwrap_or(available.saturating_sub(t))),
                (None, Some(h)) => (available, h),
            };
            check_available(n_tumour + n_healthy, available)?;

            let tumour_skip = config
                .skip_healthy_in_tumour
                .then_some(transform::skip_healthy as SkipCondition<BrainSlice>);
            let healthy_skip = config
                .skip_tumour_in_healthy
                .then_some(transform::skip_tumour as SkipCondition<BrainSlice>);
            let plan = patient_dirs
                .into_iter()
                .take(n_tumour + n_healthy)
                .enumerate()
                .map(|(i, p)| {
                    let skip = if i < n_tumour { tumour_skip } else { healthy_skip };
                    (p, i, skip)
                })
                .collect();
            (n_tumour, plan)
        };

        let patients = build_all(plan)?;

        let index = ConcatIndex::from_lens(patients.iter().map(PatientDataset::len));
        info!(
            "{} split: {} patients, {} slices",
            config.split,
            patients.len(),
            index.len()
        );
        Ok(Self {
            split: config.split,
            ret_lab: config.ret_lab,
            patients,
            index,
            n_tumour_patients: n_tumour,
        })
    }

    /// 样本总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 数据集划分.
    #[inline]
    pub fn split(&self) -> Split {
        self.split
    }

    /// 训练集是否返回标签.
    #[inline]
    pub fn ret_lab(&self) -> bool {
        self.ret_lab
    }

    /// 按索引顺序排列的各病人数据集.
    #[inline]
    pub fn patients(&self) -> &[PatientDataset<BrainSlice>] {
        &self.patients
    }

    /// "肿瘤" 组病人数. 混合模式下等于全部选中病人数.
    #[inline]
    pub fn n_tumour_patients(&self) -> usize {
        self.n_tumour_patients
    }

    /// 读取全局索引 `idx` 处的变换后切片.
    pub fn slice(&self, idx: usize) -> Result<BrainSlice> {
        let (part, local) = self.index.locate(idx).ok_or(BratsError::IndexOutOfRange {
            index: idx,
            len: self.len(),
        })?;
        self.patients[part].get(local)
    }

    /// 读取全局索引 `idx` 处的样本, 输出形态取决于划分.
    pub fn get(&self, idx: usize) -> Result<Sample> {
        let BrainSlice { image, mask, label } = self.slice(idx)?;
        Ok(match (self.split, self.ret_lab) {
            (Split::Train, false) => Sample::Image(image),
            (Split::Train, true) => Sample::Labelled(image, label),
            _ => Sample::Full { image, mask, label },
        })
    }

    /// 全部样本的切片级标签. 需要逐个读取切片.
    pub fn labels(&self) -> Result<Vec<u8>> {
        collect_labels(self)
    }
}

#[inline]
fn check_available(requested: usize, available: usize) -> Result<()> {
    if requested > available {
        Err(BratsError::NotEnoughPatients {
            requested,
            available,
        })
    } else {
        Ok(())
    }
}

/// 以固定种子 0 构造数据集. `num_mix` 只对非训练集生效.
pub fn load_brats<P: AsRef<Path>>(
    data_dir: P,
    split: Split,
    n_healthy_patients: Option<usize>,
    n_tumour_patients: Option<usize>,
    mixed: bool,
    ret_lab: bool,
    num_mix: Option<usize>,
) -> Result<BrainDataset> {
    let config = BrainDatasetConfig {
        split,
        n_tumour_patients,
        n_healthy_patients,
        mixed,
        ret_lab,
        num_mix: if split.is_train() { None } else { num_mix },
        ..Default::default()
    };
    BrainDataset::new(data_dir, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::slice::{slice_file_name, SliceRecord};

    /// 在 `root/npy_{split}` 下写入病人. `lesions[p][s]` 表示第 p 个病人第 s 张切片是否含病灶.
    fn write_split(root: &Path, split: Split, lesions: &[&[bool]]) {
        for (p, slices) in lesions.iter().enumerate() {
            let dir = root.join(split.npy_dir_name()).join(format!("patient_{p:02}"));
            fs::create_dir_all(&dir).unwrap();
            for (s, &lesion) in slices.iter().enumerate() {
                let mut x = Array3::zeros((1, 4, 4));
                x[(0, 0, 0)] = (p * 10 + s) as f32 + 1.0;
                let mut y = Array3::zeros((1, 4, 4));
                if lesion {
                    y[(0, 2, 2)] = 2.0;
                }
                SliceRecord::new(x, y)
                    .unwrap()
                    .save_npz(dir.join(slice_file_name(s + 5)))
                    .unwrap();
            }
        }
    }

    const LAYOUT: [&[bool]; 4] = [
        &[false, true, true],
        &[true, false],
        &[false, false, true, false],
        &[true],
    ];

    #[test]
    fn test_mixed_keeps_everything() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Test, &LAYOUT);
        let config = BrainDatasetConfig {
            split: Split::Test,
            mixed: true,
            ..Default::default()
        };
        let ds = BrainDataset::new(root.path(), &config).unwrap();
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.patients().len(), 4);
        for (i, p) in ds.patients().iter().enumerate() {
            assert_eq!(p.id(), Some(i));
            assert_eq!(p.len(), p.physical_len());
        }
        assert!(matches!(ds.get(0).unwrap(), Sample::Full { .. }));
        assert!(matches!(ds.get(10), Err(BratsError::IndexOutOfRange { index: 10, len: 10 })));

        let capped = BrainDatasetConfig { num_mix: Some(2), ..config.clone() };
        assert_eq!(BrainDataset::new(root.path(), &capped).unwrap().patients().len(), 2);
        let too_many = BrainDatasetConfig { num_mix: Some(5), ..config };
        assert!(matches!(
            BrainDataset::new(root.path(), &too_many),
            Err(BratsError::NotEnoughPatients { requested: 5, available: 4 })
        ));
    }

    #[test]
    fn test_grouped_filtering() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Val, &LAYOUT);
        let config = BrainDatasetConfig {
            n_tumour_patients: Some(2),
            seed: 3,
            ..Default::default()
        };
        let ds = BrainDataset::new(root.path(), &config).unwrap();
        assert_eq!(ds.n_tumour_patients(), 2);
        assert_eq!(ds.patients().len(), 4);

        let (tumour, healthy) = ds.patients().split_at(2);
        for p in tumour {
            assert_eq!(p.len(), p.physical_len());
        }
        for p in healthy {
            assert!(p.len() <= p.physical_len());
            for i in 0..p.len() {
                assert_eq!(p.get(i).unwrap().label, 0);
            }
        }
        let total: usize = ds.patients().iter().map(PatientDataset::len).sum();
        assert_eq!(ds.len(), total);

        let labels = ds.labels().unwrap();
        for (i, label) in labels.iter().enumerate() {
            let Sample::Full { mask, label: l, .. } = ds.get(i).unwrap() else {
                panic!("验证集应返回完整样本");
            };
            assert_eq!(*label, l);
            assert_eq!(l == 1, mask.sum() > 0.0);
        }
    }

    #[test]
    fn test_skip_healthy_in_tumour() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Val, &LAYOUT);
        let config = BrainDatasetConfig {
            n_tumour_patients: Some(4),
            skip_healthy_in_tumour: true,
            ..Default::default()
        };
        let ds = BrainDataset::new(root.path(), &config).unwrap();
        // 每个病人只保留含病灶的切片.
        assert_eq!(ds.len(), 5);
        assert!(ds.labels().unwrap().iter().all(|&l| l == 1));
    }

    #[test]
    fn test_patient_counts() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Val, &LAYOUT);
        let missing = BrainDatasetConfig::default();
        assert!(matches!(
            BrainDataset::new(root.path(), &missing),
            Err(BratsError::MissingPatientCounts)
        ));
        let only_healthy = BrainDatasetConfig {
            n_healthy_patients: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            BrainDataset::new(root.path(), &only_healthy),
            Err(BratsError::NotEnoughPatients { requested: 5, available: 4 })
        ));
    }

    #[test]
    fn test_seeded_shuffle_is_stable() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Train, &LAYOUT);
        let config = BrainDatasetConfig {
            split: Split::Train,
            mixed: true,
            seed: 42,
            ..Default::default()
        };
        let order = |c: &BrainDatasetConfig| -> Vec<PathBuf> {
            BrainDataset::new(root.path(), c)
                .unwrap()
                .patients()
                .iter()
                .map(|p| p.patient_dir().to_owned())
                .collect()
        };
        assert_eq!(order(&config), order(&config));
        let mut sorted = order(&config);
        sorted.sort();
        assert_eq!(sorted.len(), 4);

        // 病人足够多时, 打乱后的顺序既不等于排序结果, 也随种子变化.
        let many = tempfile::tempdir().unwrap();
        let layout: Vec<&[bool]> = vec![&[false][..]; 16];
        write_split(many.path(), Split::Train, &layout);
        let order_in = |c: &BrainDatasetConfig| -> Vec<PathBuf> {
            BrainDataset::new(many.path(), c)
                .unwrap()
                .patients()
                .iter()
                .map(|p| p.patient_dir().to_owned())
                .collect()
        };
        let shuffled = order_in(&config);
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(shuffled.len(), 16);
        assert_ne!(shuffled, sorted);
        let other_seed = BrainDatasetConfig { seed: 7, ..config.clone() };
        assert_ne!(order_in(&other_seed), shuffled);

        let ds = BrainDataset::new(root.path(), &config).unwrap();
        assert!(matches!(ds.get(0).unwrap(), Sample::Image(_)));
        let labelled = BrainDatasetConfig { ret_lab: true, ..config };
        let ds = BrainDataset::new(root.path(), &labelled).unwrap();
        assert!(ds.get(0).unwrap().label().is_some());
    }

    #[test]
    fn test_load_brats_ignores_num_mix_for_train() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Train, &LAYOUT);
        let ds = load_brats(root.path(), Split::Train, None, None, true, false, Some(1)).unwrap();
        assert_eq!(ds.patients().len(), 4);
    }
}
