//! 运行时错误.
//!
//! 预处理与数据加载都是 "一次失败即终止" 的批处理流程,
//! 因此整个 crate 只使用一个错误类型, 并不区分可恢复与不可恢复.

use std::path::PathBuf;
use thiserror::Error;

/// 预处理或数据加载的运行时错误.
#[derive(Error, Debug)]
pub enum BratsError {
    /// 底层 I/O 错误.
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 读取 nifti 文件错误.
    #[error("读取 nifti 文件错误: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 读取 npz 切片文件错误.
    #[error("读取 npz 文件错误: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    /// 写入 npz 切片文件错误.
    #[error("写入 npz 文件错误: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// 图像导出错误.
    #[error("图像导出错误: {0}")]
    Image(#[from] image::ImageError),

    /// ndarray 形状错误.
    #[error("数组形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// 不支持的模态组合. 只允许 `all`, `flair`, `t1`, `t1ce`, `t2`.
    #[error("不支持的模态 `{0}`")]
    InvalidModality(String),

    /// 不支持的数据集划分. 只允许 `train`, `val`, `test`.
    #[error("不支持的数据集划分 `{0}`")]
    InvalidSplit(String),

    /// 切片文件名无法解析出切片序号.
    #[error("无法从 `{0}` 解析切片序号")]
    MalformedSliceName(PathBuf),

    /// 数组形状与期望不符.
    #[error("`{what}` 形状不符: 期望 {expected:?}, 实际 {actual:?}")]
    ShapeMismatch {
        /// 出错的对象.
        what: &'static str,
        /// 期望形状.
        expected: Vec<usize>,
        /// 实际形状.
        actual: Vec<usize>,
    },

    /// 某个通道不存在前景 (正值) 体素, 无法计算分位数.
    #[error("第 {channel} 个通道没有前景体素")]
    NoForeground {
        /// 通道序号.
        channel: usize,
    },

    /// 没有任何切片包含脑组织.
    #[error("病人 `{patient}` 没有任何包含脑组织的切片")]
    EmptyBrainRange {
        /// 病人目录名.
        patient: String,
    },

    /// 逻辑索引越界.
    #[error("索引 {index} 越界 (长度 {len})")]
    IndexOutOfRange {
        /// 请求的索引.
        index: usize,
        /// 数据集长度.
        len: usize,
    },

    /// 请求的病人数超过了目录中实际存在的病人数.
    #[error("请求 {requested} 个病人, 但只有 {available} 个")]
    NotEnoughPatients {
        /// 请求的病人数.
        requested: usize,
        /// 实际可用的病人数.
        available: usize,
    },

    /// 分组模式下两个病人数均未指定.
    #[error("分组模式下必须至少指定肿瘤病人数或健康病人数之一")]
    MissingPatientCounts,

    /// 数据集为空, 无法构造采样器.
    #[error("数据集为空")]
    EmptyDataset,

    /// 同一批次内的样本形状不一致, 无法堆叠.
    #[error("批次内样本形状不一致: {0:?} 与 {1:?}")]
    BatchShapeMismatch(Vec<usize>, Vec<usize>),

    /// 批大小不足以在每个进程上分到至少一个样本.
    #[error("批大小 {batch_size} 无法在 {world_size} 个进程间划分")]
    InvalidBatchSize {
        /// 全局批大小.
        batch_size: usize,
        /// 进程总数.
        world_size: usize,
    },

    /// 批大小为 0.
    #[error("批大小不能为 0")]
    ZeroBatchSize,

    /// 非法的并行拓扑.
    #[error("非法的并行拓扑: rank {rank}, world size {world_size}")]
    InvalidTopology {
        /// 当前进程序号.
        rank: usize,
        /// 进程总数.
        world_size: usize,
    },

    /// 未实现的操作.
    #[error("未实现: {0}")]
    Unimplemented(String),
}

/// 预处理 / 数据加载运行时结果.
pub type Result<T> = std::result::Result<T, BratsError>;
