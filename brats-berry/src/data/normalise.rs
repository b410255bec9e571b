//! 强度归一化与脑组织切片范围检测.

use crate::consts::{BRAIN_SLICE_THRESHOLD, NORM_QUANTILE};
use crate::error::{BratsError, Result};
use ndarray::{ArrayView4, ArrayViewMut4, Axis};
use ordered_float::OrderedFloat;
use std::ops::Range;

/// 求 `values` 的 `q` 分位数 (`0 <= q <= 1`).
///
/// 在相邻的两个顺序统计量之间线性插值, 插值位置为 `q * (n - 1)`.
/// `values` 为空时返回 `None`.
pub fn quantile(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by_key(|v| OrderedFloat(*v));
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

/// 就地归一化四维体数据 `(c, z, h, w)` 的每个通道:
/// 将整个通道除以该通道前景 (严格正值) 体素的 99 分位数.
///
/// 该操作只缩放, 不平移. 返回每个通道使用的分位数.
/// 若某个通道没有任何前景体素则返回错误.
pub fn normalise_percentile(mut volume: ArrayViewMut4<f32>) -> Result<Vec<f32>> {
    let mut scales = Vec::with_capacity(volume.len_of(Axis(0)));
    for (channel, mut v) in volume.axis_iter_mut(Axis(0)).enumerate() {
        // 只用脑组织前景计算分位数.
        let mut fg: Vec<f64> = v.iter().filter(|p| **p > 0.0).map(|p| *p as f64).collect();
        let p99 = quantile(&mut fg, NORM_QUANTILE).ok_or(BratsError::NoForeground { channel })?;
        let p99 = p99 as f32;
        v.mapv_inplace(|p| p / p99);
        scales.push(p99);
    }
    Ok(scales)
}

/// 求四维体数据 `(c, z, h, w)` 中含脑组织的切片范围 `[first, last)`.
///
/// 对每个切片, 先在通道维求均值, 再对切片平面求和;
/// 和严格大于阈值的切片视为含脑组织. 没有任何这样的切片时返回 `None`.
pub fn brain_range(volume: ArrayView4<f32>) -> Option<Range<usize>> {
    let mean = volume.mean_axis(Axis(0))?;
    let flags: Vec<bool> = mean
        .axis_iter(Axis(0))
        .map(|s| s.sum() > BRAIN_SLICE_THRESHOLD)
        .collect();
    let first = flags.iter().position(|f| *f)?;
    let last = flags.iter().rposition(|f| *f)? + 1;
    Some(first..last)
}
