//! 切片级变换与跳过谓词.

use crate::consts::{LABEL_THRESHOLD, RESCALE_EPS, TUMOUR_SUM_THRESHOLD};
use crate::data::SliceRecord;
use itertools::{Itertools, MinMaxResult};
use ndarray::{Array3, Axis};

/// 经过变换、可直接送入训练的切片.
#[derive(Clone, Debug, PartialEq)]
pub struct BrainSlice {
    /// 逐通道缩放到 `[-1, 1]` 的图像, `(c, h, w)`.
    pub image: Array3<f32>,

    /// 二值标签, `(1, h, w)`.
    pub mask: Array3<f32>,

    /// 切片级标签: 存在病灶像素为 1, 否则为 0.
    pub label: u8,
}

impl BrainSlice {
    /// 是否为含病灶的切片.
    #[inline]
    pub fn is_tumour(&self) -> bool {
        self.label == 1
    }
}

/// 将所有病灶类别合并为一类: 严格大于 0.5 为 1, 否则为 0.
pub fn binarize(y: &Array3<f32>) -> Array3<f32> {
    y.mapv(|v| if v > LABEL_THRESHOLD { 1.0 } else { 0.0 })
}

/// 用每个通道自身的最小/最大值, 将图像逐通道线性缩放到 `[-1, 1]`.
///
/// 分母额外加上 `RESCALE_EPS`, 因此常数通道会被映射为全 `-1`.
pub fn rescale_channels(mut x: Array3<f32>) -> Array3<f32> {
    for mut channel in x.axis_iter_mut(Axis(0)) {
        let (lo, hi) = match channel.iter().copied().minmax() {
            MinMaxResult::NoElements => continue,
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let scale = hi - lo + RESCALE_EPS;
        channel.mapv_inplace(|v| (v - lo) / scale * 2.0 - 1.0);
    }
    x
}

/// 数据集使用的标准切片变换.
pub fn process(_idx: usize, record: SliceRecord) -> BrainSlice {
    let SliceRecord { x, y } = record;
    let mask = binarize(&y);
    let label = u8::from(mask.sum() > TUMOUR_SUM_THRESHOLD);
    BrainSlice {
        image: rescale_channels(x),
        mask,
        label,
    }
}

/// 跳过含病灶的切片 (用于 "健康" 病人).
pub fn skip_tumour(s: &BrainSlice) -> bool {
    s.mask.sum() > TUMOUR_SUM_THRESHOLD
}

/// 跳过健康切片 (用于 "肿瘤" 病人).
pub fn skip_healthy(s: &BrainSlice) -> bool {
    s.mask.sum() <= TUMOUR_SUM_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};

    #[test]
    fn test_rescale_extremes() {
        let mut x = Array3::<f32>::zeros((2, 3, 3));
        x.slice_mut(s![0, .., ..]).assign(&ndarray::arr2(&[
            [0.0, 1.0, 2.0],
            [3.0, 4.0, 5.0],
            [6.0, 7.0, 8.0],
        ]));
        x.slice_mut(s![1, .., ..]).fill(-3.0);
        x[(1, 2, 2)] = 5.0;

        let y = rescale_channels(x);
        for c in 0..2 {
            let ch = y.index_axis(Axis(0), c);
            let lo = ch.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = ch.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            assert!((lo + 1.0).abs() < 1e-5);
            assert!((hi - 1.0).abs() < 1e-5);
        }
        assert!((y[(0, 1, 1)] - 0.0).abs() < 1e-5);
    }

    #[test]
    fn test_rescale_constant_channel() {
        let y = rescale_channels(Array3::from_elem((1, 4, 4), 0.7));
        assert!(y.iter().all(|v| *v == -1.0));
    }

    #[test]
    fn test_binarize_idempotent() {
        let y = Array3::from_shape_vec((1, 2, 2), vec![0.0, 0.5, 0.51, 2.0]).unwrap();
        let once = binarize(&y);
        assert_eq!(once.as_slice().unwrap(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(binarize(&once), once);
    }

    #[test]
    fn test_process_label_and_predicates() {
        let x = Array3::from_elem((1, 2, 2), 1.0);
        let healthy = process(0, SliceRecord::new(x.clone(), Array3::from_elem((1, 2, 2), 0.3)).unwrap());
        assert_eq!(healthy.label, 0);
        assert!(skip_healthy(&healthy) && !skip_tumour(&healthy));

        let mut y = Array3::zeros((1, 2, 2));
        y[(0, 0, 1)] = 4.0;
        let tumour = process(0, SliceRecord::new(x, y).unwrap());
        assert_eq!(tumour.label, 1);
        assert!(tumour.is_tumour());
        assert!(skip_tumour(&tumour) && !skip_healthy(&tumour));
        assert_eq!(tumour.mask.sum(), 1.0);
    }
}
