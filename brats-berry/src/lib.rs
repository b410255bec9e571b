#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 BraTS 脑部 MRI 数据的切片预处理与训练数据集加载.
//!
//! 两条流水线经由磁盘上的切片文件 (每张切片一个压缩 npz) 相连:
//!
//! 1. 预处理: 读取病人的 nii 序列与分割标签, 强度归一化, 确定含脑组织的切片范围,
//!    按一次性生成并持久化的划分清单将每张切片写入 `npy_{train,val,test}` 目录;
//! 2. 加载: 按病人索引切片, 按 "肿瘤/健康" 分组过滤, 拼接为划分级数据集,
//!    再按划分选择采样方式组装批次.
//!
//! # 注意
//!
//! 1. 该 crate 只适配 BraTS 的组织方式: 每个病人一个目录,
//!   包含四个对齐的 MRI 序列 (flair, t1, t1ce, t2) 和一个分割标签.
//! 2. 任何读写或解码错误都会直接向上返回, 不做重试或部分恢复.
//!
//! # 功能
//!
//! ### 体数据读取与预处理 ✅
//!
//! 实现位于 `brats-berry/src/data` 与 `brats-berry/src/preprocess`.
//!
//! ### 划分清单 ✅
//!
//! 固定种子打乱, 80/5/15 划分, 一旦写入不再改变.
//!
//! ### 切片数据集与分组过滤 ✅
//!
//! 实现位于 `brats-berry/src/dataset`.
//!
//! ### 采样器与批次迭代 ✅
//!
//! 类别均衡加权采样 (验证集), 多进程打乱采样 (训练集), 随机采样 (测试集).
//!
//! 实现位于 `brats-berry/src/loader`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

/// 3D MRI nii 文件基础数据结构, 以及持久化的二维切片.
pub mod data;

pub mod dataset;
pub mod error;
pub mod loader;
pub mod preprocess;

pub mod prelude;

pub use error::{BratsError, Result};
