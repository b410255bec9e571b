//! 索引采样器.
//!
//! 每次调用 [`Sampler::indices`] 产生一轮 (epoch) 的样本索引序列.
//! 所有随机性都来自显式给定的种子.

use crate::error::{BratsError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一轮样本索引的产生者.
pub trait Sampler: Send {
    /// 每轮产生的索引数.
    fn len(&self) -> usize;

    /// 每轮是否不产生任何索引.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 产生下一轮的索引序列.
    fn indices(&mut self) -> Vec<usize>;

    /// 设置当前轮次. 只有依赖轮次播种的采样器才需要实现.
    fn set_epoch(&mut self, _epoch: u64) {}
}

/// 显式的并行拓扑: 进程总数与当前进程序号.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorkerTopology {
    world_size: usize,
    rank: usize,
}

impl WorkerTopology {
    /// 要求 `world_size >= 1` 且 `rank < world_size`.
    pub fn new(world_size: usize, rank: usize) -> Result<Self> {
        if world_size == 0 || rank >= world_size {
            return Err(BratsError::InvalidTopology { rank, world_size });
        }
        Ok(Self { world_size, rank })
    }

    /// 单进程.
    #[inline]
    pub const fn single() -> Self {
        Self {
            world_size: 1,
            rank: 0,
        }
    }

    /// 进程总数.
    #[inline]
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// 当前进程序号.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl Default for WorkerTopology {
    fn default() -> Self {
        Self::single()
    }
}

/// 无放回的均匀随机采样. 生成器状态跨轮延续.
#[derive(Clone, Debug)]
pub struct RandomSampler {
    len: usize,
    rng: ChaCha8Rng,
}

impl RandomSampler {
    /// 对 `0..len` 采样.
    pub fn new(len: usize, seed: u64) -> Self {
        Self {
            len,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn indices(&mut self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.len).collect();
        idx.shuffle(&mut self.rng);
        idx
    }
}

/// 有放回的加权随机采样, 每轮抽取 `num_samples` 个索引.
#[derive(Clone, Debug)]
pub struct WeightedRandomSampler {
    dist: WeightedIndex<f64>,
    num_samples: usize,
    rng: ChaCha8Rng,
}

impl WeightedRandomSampler {
    /// 按给定权重构造. 权重为空, 含负数或全为 0 时返回 [`BratsError::EmptyDataset`].
    pub fn new(weights: &[f64], num_samples: usize, seed: u64) -> Result<Self> {
        let dist = WeightedIndex::new(weights).map_err(|_| BratsError::EmptyDataset)?;
        Ok(Self {
            dist,
            num_samples,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// 类别均衡采样: 每个样本的权重为其所属类别样本数的倒数, 每轮抽取 `labels.len()` 个.
    pub fn from_labels(labels: &[u8], seed: u64) -> Result<Self> {
        let mut counts = [0usize; 256];
        for &l in labels {
            counts[l as usize] += 1;
        }
        let weights: Vec<f64> = labels
            .iter()
            .map(|&l| 1.0 / counts[l as usize] as f64)
            .collect();
        Self::new(&weights, labels.len(), seed)
    }
}

impl Sampler for WeightedRandomSampler {
    fn len(&self) -> usize {
        self.num_samples
    }

    fn indices(&mut self) -> Vec<usize> {
        (0..self.num_samples)
            .map(|_| self.dist.sample(&mut self.rng))
            .collect()
    }
}

/// 多进程训练下的打乱采样.
///
/// 每轮以 `seed + epoch` 播种生成排列, 用排列开头的索引循环补齐到
/// `world_size` 的整数倍, 然后当前进程取下标为 `rank, rank + world_size, ...` 的元素.
/// 所有进程上的长度相同, 且各进程所取索引的并集覆盖整个数据集.
#[derive(Clone, Debug)]
pub struct DistributedSampler {
    len: usize,
    topology: WorkerTopology,
    seed: u64,
    epoch: u64,
}

impl DistributedSampler {
    /// 对 `0..len` 采样.
    pub fn new(len: usize, topology: WorkerTopology, seed: u64) -> Self {
        Self {
            len,
            topology,
            seed,
            epoch: 0,
        }
    }

    /// 补齐后的总索引数.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.len() * self.topology.world_size()
    }

    /// 当前轮次.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Sampler for DistributedSampler {
    fn len(&self) -> usize {
        let world = self.topology.world_size();
        (self.len + world - 1) / world
    }

    fn indices(&mut self) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(self.epoch));
        let mut idx: Vec<usize> = (0..self.len).collect();
        idx.shuffle(&mut rng);

        let total = self.total_size();
        let padded: Vec<usize> = idx.iter().copied().cycle().take(total).collect();
        padded
            .into_iter()
            .skip(self.topology.rank())
            .step_by(self.topology.world_size())
            .collect()
    }

    fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }
}
