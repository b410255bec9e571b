//! 将若干样本堆叠成批次.

use crate::dataset::Sample;
use crate::error::{BratsError, Result};
use ndarray::{stack, Array1, Array3, Array4, ArrayView3, Axis};

/// 一个批次. 形态与数据集的 [`Sample`] 一一对应.
#[derive(Clone, Debug, PartialEq)]
pub enum Batch {
    /// `(n, c, h, w)` 图像.
    Images(Array4<f32>),

    /// 图像与切片级标签.
    Labelled {
        /// `(n, c, h, w)` 图像.
        images: Array4<f32>,
        /// `(n,)` 标签.
        labels: Array1<i64>,
    },

    /// 图像, 标签图与切片级标签.
    Full {
        /// `(n, c, h, w)` 图像.
        images: Array4<f32>,
        /// `(n, 1, h, w)` 标签图.
        masks: Array4<f32>,
        /// `(n,)` 标签.
        labels: Array1<i64>,
    },
}

impl Batch {
    /// 批内样本数.
    pub fn len(&self) -> usize {
        self.images().len_of(Axis(0))
    }

    /// 是否为空批次.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 图像.
    pub fn images(&self) -> &Array4<f32> {
        match self {
            Batch::Images(images) => images,
            Batch::Labelled { images, .. } | Batch::Full { images, .. } => images,
        }
    }

    /// 标签图 (仅验证集/测试集).
    pub fn masks(&self) -> Option<&Array4<f32>> {
        match self {
            Batch::Full { masks, .. } => Some(masks),
            _ => None,
        }
    }

    /// 切片级标签.
    pub fn labels(&self) -> Option<&Array1<i64>> {
        match self {
            Batch::Images(_) => None,
            Batch::Labelled { labels, .. } | Batch::Full { labels, .. } => Some(labels),
        }
    }
}

fn stack3(items: &[ArrayView3<f32>]) -> Result<Array4<f32>> {
    if let Some(first) = items.first() {
        if let Some(bad) = items.iter().find(|a| a.shape() != first.shape()) {
            return Err(BratsError::BatchShapeMismatch(
                first.shape().to_vec(),
                bad.shape().to_vec(),
            ));
        }
    }
    Ok(stack(Axis(0), items)?)
}

fn views<'a>(arrays: &[&'a Array3<f32>]) -> Vec<ArrayView3<'a, f32>> {
    arrays.iter().map(|a| a.view()).collect()
}

/// 将同一形态的样本沿新的第 0 轴堆叠. `samples` 不能为空.
pub fn collate(samples: Vec<Sample>) -> Result<Batch> {
    let first = samples.first().ok_or(BratsError::EmptyDataset)?;
    let images: Vec<&Array3<f32>> = samples.iter().map(Sample::image).collect();
    let images = stack3(&views(&images))?;
    let labels = || -> Array1<i64> {
        samples
            .iter()
            .map(|s| s.label().map_or(0, i64::from))
            .collect()
    };
    Ok(match first {
        Sample::Image(_) => Batch::Images(images),
        Sample::Labelled(..) => Batch::Labelled {
            images,
            labels: labels(),
        },
        Sample::Full { .. } => {
            let masks: Vec<&Array3<f32>> = samples
                .iter()
                .filter_map(|s| match s {
                    Sample::Full { mask, .. } => Some(mask),
                    _ => None,
                })
                .collect();
            Batch::Full {
                images,
                masks: stack3(&views(&masks))?,
                labels: labels(),
            }
        }
    })
}
