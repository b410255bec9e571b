//! MRI 序列与模态组合.

use crate::consts::names::{NII_EXT, SEG_SUFFIX};
use crate::error::{BratsError, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单个 MRI 采集序列. 预处理后每个序列对应一个图像通道.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Sequence {
    /// FLAIR.
    Flair,

    /// T1 加权.
    T1,

    /// T1 增强.
    T1ce,

    /// T2 加权.
    T2,
}

impl Sequence {
    /// 按通道顺序排列的全部序列.
    pub const ALL: [Sequence; 4] = [Sequence::Flair, Sequence::T1, Sequence::T1ce, Sequence::T2];

    /// 序列在文件名中的写法.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Sequence::Flair => "flair",
            Sequence::T1 => "t1",
            Sequence::T1ce => "t1ce",
            Sequence::T2 => "t2",
        }
    }

    /// 病人 `patient` 该序列的 nifti 文件名, 形如 `{patient}_flair.nii.gz`.
    #[inline]
    pub fn file_name(self, patient: &str) -> String {
        format!("{patient}_{}{NII_EXT}", self.name())
    }
}

/// 病人 `patient` 的分割标签文件名, 形如 `{patient}_seg.nii.gz`.
#[inline]
pub fn seg_file_name(patient: &str) -> String {
    format!("{patient}_{SEG_SUFFIX}{NII_EXT}")
}

/// 预处理选用的模态组合.
///
/// `All` 按 flair, t1, t1ce, t2 的顺序堆叠为四通道, 其余均为单通道.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Modality {
    /// 全部四个序列.
    All,

    /// 仅 FLAIR.
    #[default]
    Flair,

    /// 仅 T1.
    T1,

    /// 仅 T1ce.
    T1ce,

    /// 仅 T2.
    T2,
}

impl Modality {
    /// 该组合包含的序列, 即输出图像的通道顺序.
    pub fn sequences(self) -> &'static [Sequence] {
        match self {
            Modality::All => &Sequence::ALL,
            Modality::Flair => &[Sequence::Flair],
            Modality::T1 => &[Sequence::T1],
            Modality::T1ce => &[Sequence::T1ce],
            Modality::T2 => &[Sequence::T2],
        }
    }

    /// 输出图像通道数.
    #[inline]
    pub fn channels(self) -> usize {
        self.sequences().len()
    }

    /// 组合名, 也用于输出目录命名.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Modality::All => "all",
            Modality::Flair => "flair",
            Modality::T1 => "t1",
            Modality::T1ce => "t1ce",
            Modality::T2 => "t2",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modality {
    type Err = BratsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Modality::All),
            "flair" => Ok(Modality::Flair),
            "t1" => Ok(Modality::T1),
            "t1ce" => Ok(Modality::T1ce),
            "t2" => Ok(Modality::T2),
            other => Err(BratsError::InvalidModality(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_parse() {
        for m in ["all", "flair", "t1", "t1ce", "t2"] {
            assert_eq!(m.parse::<Modality>().unwrap().name(), m);
        }
        assert!(matches!(
            "T1".parse::<Modality>(),
            Err(BratsError::InvalidModality(s)) if s == "T1"
        ));
        assert!("dwi".parse::<Modality>().is_err());
    }

    #[test]
    fn test_channel_order() {
        assert_eq!(Modality::All.channels(), 4);
        assert_eq!(Modality::All.sequences()[2], Sequence::T1ce);
        assert_eq!(Modality::T2.sequences(), &[Sequence::T2]);
    }

    #[test]
    fn test_file_names() {
        let p = "BraTS2021_00000";
        assert_eq!(Sequence::T1ce.file_name(p), "BraTS2021_00000_t1ce.nii.gz");
        assert_eq!(seg_file_name(p), "BraTS2021_00000_seg.nii.gz");
    }
}
