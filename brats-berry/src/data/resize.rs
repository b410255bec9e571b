//! 二维双线性插值缩放.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use num::Float;

/// 源图像上的一维采样位置: 两个相邻源索引及第二个的权重.
#[derive(Copy, Clone, Debug)]
struct Tap<F> {
    lo: usize,
    hi: usize,
    lambda: F,
}

/// 计算长度 `src` 映射到长度 `dst` 时每个输出位置的采样点.
///
/// 采用像素中心对齐 (即 `align_corners = false`), 越过左边界的坐标截断到 0.
fn taps<F: Float>(src: usize, dst: usize) -> Vec<Tap<F>> {
    let scale = F::from(src).unwrap() / F::from(dst).unwrap();
    let half = F::from(0.5).unwrap();
    (0..dst)
        .map(|i| {
            let real = ((F::from(i).unwrap() + half) * scale - half).max(F::zero());
            let lo = real.to_usize().unwrap_or(0).min(src - 1);
            let hi = if lo + 1 < src { lo + 1 } else { lo };
            Tap {
                lo,
                hi,
                lambda: real - F::from(lo).unwrap(),
            }
        })
        .collect()
}

/// 将单通道图像双线性缩放到 `(height, width)`.
///
/// 输入为空图时返回全零图.
pub fn resize_bilinear<F: Float>(img: ArrayView2<F>, (height, width): (usize, usize)) -> Array2<F> {
    let (src_h, src_w) = img.dim();
    if src_h == 0 || src_w == 0 {
        return Array2::zeros((height, width));
    }
    let ys = taps::<F>(src_h, height);
    let xs = taps::<F>(src_w, width);
    let one = F::one();
    Array2::from_shape_fn((height, width), |(h, w)| {
        let (ty, tx) = (ys[h], xs[w]);
        let top = img[(ty.lo, tx.lo)] * (one - tx.lambda) + img[(ty.lo, tx.hi)] * tx.lambda;
        let bottom = img[(ty.hi, tx.lo)] * (one - tx.lambda) + img[(ty.hi, tx.hi)] * tx.lambda;
        top * (one - ty.lambda) + bottom * ty.lambda
    })
}

/// 将多通道图像 `(c, h, w)` 的每个通道分别双线性缩放到 `(height, width)`.
pub fn resize_channels<F: Float>(img: ArrayView3<F>, size: (usize, usize)) -> Array3<F> {
    let (c, _, _) = img.dim();
    let mut out = Array3::zeros((c, size.0, size.1));
    for (src, mut dst) in img.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        dst.assign(&resize_bilinear(src, size));
    }
    out
}
