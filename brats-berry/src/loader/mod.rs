//! 按划分组装批次迭代器.
//!
//! * `val`: 按类别样本数倒数加权, 有放回采样, 抽取数据集长度个样本;
//! * `train`: 在 [`WorkerTopology`] 给出的各进程间划分的打乱采样,
//!   每个进程的批大小为全局批大小除以进程数, 丢弃不足一批的尾部;
//! * `test`: 普通随机采样, 不丢弃尾部.

use crate::consts::NUM_WORKERS;
use crate::dataset::{load_brats, BrainDataset, Split};
use crate::error::{BratsError, Result};
use log::info;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod batch;
mod check;
mod sampler;

pub use batch::{collate, Batch};
pub use check::check_data;
pub use sampler::{DistributedSampler, RandomSampler, Sampler, WeightedRandomSampler, WorkerTopology};

/// 加载器通用参数.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderConfig {
    /// 全局批大小.
    pub batch_size: usize,

    /// 数据集划分.
    pub split: Split,

    /// 采样器种子.
    pub seed: u64,

    /// 并行读取样本的线程数.
    pub num_workers: usize,

    /// 仅作记录, 不影响行为.
    pub pin_memory: bool,

    /// 并行拓扑. 只影响训练集.
    pub topology: WorkerTopology,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            split: Split::Train,
            seed: 0,
            num_workers: NUM_WORKERS,
            pin_memory: true,
            topology: WorkerTopology::single(),
        }
    }
}

/// [`get_brats_data_iter`] 的参数.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BratsIterConfig {
    /// 加载器参数.
    pub loader: LoaderConfig,

    /// 训练集是否返回切片级标签.
    pub ret_lab: bool,

    /// "健康" 组病人数.
    pub n_healthy_patients: Option<usize>,

    /// "肿瘤" 组病人数.
    pub n_tumour_patients: Option<usize>,

    /// 混合模式.
    pub mixed: bool,

    /// 混合模式下的病人数.
    pub num_mix: Option<usize>,
}

/// 数据集 + 采样器 + 批大小.
pub struct DataLoader {
    dataset: BrainDataset,
    sampler: Box<dyn Sampler>,
    batch_size: usize,
    drop_last: bool,
    pin_memory: bool,
    #[cfg(feature = "rayon")]
    pool: rayon::ThreadPool,
}

impl DataLoader {
    /// `batch_size` 为本进程的批大小, 不能为 0.
    pub fn new(
        dataset: BrainDataset,
        sampler: Box<dyn Sampler>,
        batch_size: usize,
        drop_last: bool,
        num_workers: usize,
        pin_memory: bool,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(BratsError::ZeroBatchSize);
        }
        #[cfg(feature = "rayon")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers.max(1))
            .build()
            .map_err(|e| BratsError::Io(std::io::Error::other(e)))?;
        #[cfg(not(feature = "rayon"))]
        let _ = num_workers;

        Ok(Self {
            dataset,
            sampler,
            batch_size,
            drop_last,
            pin_memory,
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// 底层数据集.
    #[inline]
    pub fn dataset(&self) -> &BrainDataset {
        &self.dataset
    }

    /// 本进程的批大小.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 是否丢弃不足一批的尾部.
    #[inline]
    pub fn drop_last(&self) -> bool {
        self.drop_last
    }

    /// 是否要求锁页内存.
    #[inline]
    pub fn pin_memory(&self) -> bool {
        self.pin_memory
    }

    /// 每轮的批次数.
    pub fn len(&self) -> usize {
        let n = self.sampler.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            (n + self.batch_size - 1) / self.batch_size
        }
    }

    /// 每轮是否没有任何批次.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 设置采样器轮次. 训练集每轮开始前调用以重新打乱.
    pub fn set_epoch(&mut self, epoch: u64) {
        self.sampler.set_epoch(epoch);
    }

    /// 开始新的一轮, 返回批次迭代器.
    pub fn iter(&mut self) -> BatchIter<'_> {
        let indices = self.sampler.indices();
        BatchIter {
            loader: self,
            indices,
            pos: 0,
        }
    }

    fn fetch(&self, indices: &[usize]) -> Result<Batch> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                use rayon::prelude::*;
                let dataset = &self.dataset;
                let samples = self.pool.install(|| {
                    indices
                        .par_iter()
                        .map(|&i| dataset.get(i))
                        .collect::<Result<Vec<_>>>()
                })?;
            } else {
                let samples = indices
                    .iter()
                    .map(|&i| self.dataset.get(i))
                    .collect::<Result<Vec<_>>>()?;
            }
        }
        collate(samples)
    }
}

/// 一轮内的批次迭代器.
pub struct BatchIter<'a> {
    loader: &'a DataLoader,
    indices: Vec<usize>,
    pos: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.indices.len() - self.pos;
        let size = rest.min(self.loader.batch_size);
        if size == 0 || (self.loader.drop_last && size < self.loader.batch_size) {
            return None;
        }
        let chunk = &self.indices[self.pos..self.pos + size];
        self.pos += size;
        Some(self.loader.fetch(chunk))
    }
}

/// 构造 BraTS 批次迭代器. 数据集的病人打乱种子固定为 0.
///
/// 训练集的 [`DataLoader`] 可通过 [`DataLoader::set_epoch`] 在每轮重新打乱.
pub fn get_brats_data_iter<P: AsRef<Path>>(data_dir: P, config: &BratsIterConfig) -> Result<DataLoader> {
    let LoaderConfig {
        batch_size,
        split,
        seed,
        num_workers,
        pin_memory,
        topology,
    } = config.loader;
    let data = load_brats(
        data_dir,
        split,
        config.n_healthy_patients,
        config.n_tumour_patients,
        config.mixed,
        config.ret_lab,
        config.num_mix,
    )?;

    let (sampler, batch_size, drop_last): (Box<dyn Sampler>, usize, bool) = match split {
        Split::Val => {
            let labels = data.labels()?;
            (Box::new(WeightedRandomSampler::from_labels(&labels, seed)?), batch_size, false)
        }
        Split::Train => {
            let world_size = topology.world_size();
            let local = batch_size / world_size;
            if local == 0 {
                return Err(BratsError::InvalidBatchSize {
                    batch_size,
                    world_size,
                });
            }
            (Box::new(DistributedSampler::new(data.len(), topology, seed)), local, true)
        }
        Split::Test => (Box::new(RandomSampler::new(data.len(), seed)), batch_size, false),
    };

    info!("data_size: {}", data.len());
    DataLoader::new(data, sampler, batch_size, drop_last, num_workers, pin_memory)
}

/// 按数据集名称 (不区分大小写) 分发. 目前只支持 `brats`.
pub fn get_data_iter<P: AsRef<Path>>(name: &str, data_dir: P, config: &BratsIterConfig) -> Result<DataLoader> {
    if name.eq_ignore_ascii_case("brats") {
        get_brats_data_iter(data_dir, config)
    } else {
        Err(BratsError::Unimplemented(format!("数据集 `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::slice::{slice_file_name, SliceRecord};
    use ndarray::Array3;
    use std::fs;

    /// 每个病人 5 张切片, 第 0 个病人的切片 3, 4 含病灶.
    fn write_split(root: &Path, split: Split, patients: usize) {
        for p in 0..patients {
            let dir = root.join(split.npy_dir_name()).join(format!("patient_{p}"));
            fs::create_dir_all(&dir).unwrap();
            for s in 0..5 {
                let mut x = Array3::zeros((1, 8, 8));
                x[(0, 4, 4)] = 1.0;
                let mut y = Array3::zeros((1, 8, 8));
                if p == 0 && s >= 3 {
                    y[(0, 4, 4)] = 1.0;
                }
                SliceRecord::new(x, y)
                    .unwrap()
                    .save_npz(dir.join(slice_file_name(s)))
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_train_loader_drops_last() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Train, 3);
        let config = BratsIterConfig {
            loader: LoaderConfig {
                batch_size: 8,
                topology: WorkerTopology::new(2, 1).unwrap(),
                ..Default::default()
            },
            mixed: true,
            ..Default::default()
        };
        let mut loader = get_brats_data_iter(root.path(), &config).unwrap();
        // 15 张切片, 每个进程 8 张, 批大小 4.
        assert_eq!(loader.batch_size(), 4);
        assert_eq!(loader.len(), 2);
        loader.set_epoch(1);
        let batches: Vec<Batch> = loader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 2);
        for b in &batches {
            assert!(matches!(b, Batch::Images(_)));
            assert_eq!(b.images().dim(), (4, 1, 8, 8));
        }
    }

    #[test]
    fn test_val_and_test_loaders() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Val, 2);
        write_split(root.path(), Split::Test, 2);

        let mut config = BratsIterConfig {
            loader: LoaderConfig {
                batch_size: 4,
                split: Split::Val,
                ..Default::default()
            },
            mixed: true,
            ..Default::default()
        };
        let mut val = get_data_iter("BraTS", root.path(), &config).unwrap();
        assert_eq!(val.len(), 3);
        let sizes: Vec<usize> = val.iter().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, [4, 4, 2]);

        config.loader.split = Split::Test;
        let mut test = get_data_iter("brats", root.path(), &config).unwrap();
        let batch = test.iter().next().unwrap().unwrap();
        assert_eq!(batch.masks().unwrap().dim(), (4, 1, 8, 8));
        assert_eq!(batch.labels().unwrap().len(), 4);
    }

    #[test]
    fn test_unknown_dataset_and_bad_batch() {
        let root = tempfile::tempdir().unwrap();
        write_split(root.path(), Split::Train, 1);
        let config = BratsIterConfig {
            mixed: true,
            ..Default::default()
        };
        assert!(matches!(
            get_data_iter("cifar10", root.path(), &config),
            Err(BratsError::Unimplemented(_))
        ));

        let bad = BratsIterConfig {
            loader: LoaderConfig {
                batch_size: 1,
                topology: WorkerTopology::new(2, 0).unwrap(),
                ..Default::default()
            },
            ..config
        };
        assert!(matches!(
            get_brats_data_iter(root.path(), &bad),
            Err(BratsError::InvalidBatchSize { batch_size: 1, world_size: 2 })
        ));

        write_split(root.path(), Split::Test, 1);
        let zero = BratsIterConfig {
            loader: LoaderConfig {
                batch_size: 0,
                split: Split::Test,
                topology: WorkerTopology::new(4, 1).unwrap(),
                ..Default::default()
            },
            mixed: true,
            ..Default::default()
        };
        assert!(matches!(
            get_brats_data_iter(root.path(), &zero),
            Err(BratsError::ZeroBatchSize)
        ));
    }
}
