//! 通用常量.

/// 标签二值化阈值. 严格大于该值的体素视为病灶.
pub const LABEL_THRESHOLD: f32 = 0.5;

/// 强度归一化使用的前景分位数.
pub const NORM_QUANTILE: f64 = 0.99;

/// 切片前景判定阈值: 通道均值在切片平面上的和严格大于该值时, 视为含脑组织.
pub const BRAIN_SLICE_THRESHOLD: f32 = 0.5;

/// 切片级 min-max 重缩放时加到分母上的小量.
pub const RESCALE_EPS: f32 = 0.00001;

/// 下采样后的切片边长.
pub const RESIZE_SIDE: usize = 128;

/// 数据集划分清单的随机种子.
pub const SPLIT_SEED: u64 = 10;

/// 训练集所占比例.
pub const TRAIN_FRACTION: f64 = 0.80;

/// 验证集所占比例. 剩余部分全部划入测试集.
pub const VAL_FRACTION: f64 = 0.05;

/// 数据加载默认工作线程数.
pub const NUM_WORKERS: usize = 4;

/// 切片标签中病灶像素和的阈值. 严格大于该值的切片视为 "肿瘤切片".
pub const TUMOUR_SUM_THRESHOLD: f32 = 0.0;

/// 文件名约定.
pub mod names {
    /// 切片文件名前缀.
    pub const SLICE_PREFIX: &str = "slice_";

    /// 切片文件扩展名.
    pub const SLICE_EXT: &str = ".npz";

    /// 病人输出目录前缀.
    pub const PATIENT_PREFIX: &str = "patient_";

    /// 划分清单目录名.
    pub const SPLITS_DIR: &str = "data_splits";

    /// 划分清单文件名.
    pub const MANIFEST_FILE: &str = "scans.csv";

    /// npz 中图像数组的名字.
    pub const X_KEY: &str = "x";

    /// npz 中标签数组的名字.
    pub const Y_KEY: &str = "y";

    /// 原始 nifti 文件扩展名.
    pub const NII_EXT: &str = ".nii.gz";

    /// 分割标签序列后缀.
    pub const SEG_SUFFIX: &str = "seg";
}
