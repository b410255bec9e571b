use crate::consts::names::{SLICE_EXT, SLICE_PREFIX, X_KEY, Y_KEY};
use crate::consts::{LABEL_THRESHOLD, RESIZE_SIDE};
use crate::data::resize::resize_channels;
use crate::error::{BratsError, Result};
use ndarray::{Array3, ArrayD, Axis, Ix3, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// 单个切片的持久化单元: 图像 `x` 和标签 `y`.
///
/// `x` 形状为 `(c, h, w)`, `c` 为 1 或 4; `y` 形状为 `(1, h, w)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceRecord {
    /// 多通道图像.
    pub x: Array3<f32>,

    /// 单通道标签掩码.
    pub y: Array3<f32>,
}

/// 切片文件名, 形如 `slice_{index}.npz`.
#[inline]
pub fn slice_file_name(index: usize) -> String {
    format!("{SLICE_PREFIX}{index}{SLICE_EXT}")
}

/// 从切片文件路径中解析嵌入的切片序号.
///
/// 文件名必须形如 `slice_{index}.npz`, 否则返回错误.
pub fn parse_slice_index<P: AsRef<Path>>(path: P) -> Result<usize> {
    let path = path.as_ref();
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(SLICE_PREFIX))
        .and_then(|n| n.strip_suffix(SLICE_EXT))
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| BratsError::MalformedSliceName(path.to_owned()))
}

/// npz 归档中的条目名. numpy 会为每个数组名加上 `.npy` 后缀.
#[inline]
fn entry(key: &str) -> String {
    format!("{key}.npy")
}

/// 以 `f32` 读取条目; 若存储类型为 `f64` 则读取后转换.
fn read_f32<R: Read + Seek>(npz: &mut NpzReader<R>, key: &str) -> Result<ArrayD<f32>> {
    let name = entry(key);
    match npz.by_name::<OwnedRepr<f32>, IxDyn>(&name) {
        Ok(a) => Ok(a),
        Err(e32) => match npz.by_name::<OwnedRepr<f64>, IxDyn>(&name) {
            Ok(a) => Ok(a.mapv(|v| v as f32)),
            Err(_) => Err(e32.into()),
        },
    }
}

/// 去掉多余的前导单位维, 得到 `(c, h, w)`.
///
/// 接受 `(h, w)`, `(c, h, w)` 以及 `(1, c, h, w)` 三种布局.
fn squeeze_to_chw(mut a: ArrayD<f32>) -> Result<Array3<f32>> {
    if a.ndim() == 2 {
        a.insert_axis_inplace(Axis(0));
    }
    if a.ndim() == 4 && a.shape()[0] == 1 {
        a.index_axis_inplace(Axis(0), 0);
    }
    Ok(a.into_dimensionality::<Ix3>()?)
}

impl SliceRecord {
    /// 直接初始化. `x` 与 `y` 的平面尺寸必须一致, 且 `y` 必须为单通道.
    pub fn new(x: Array3<f32>, y: Array3<f32>) -> Result<Self> {
        let (_, h, w) = x.dim();
        if y.dim() != (1, h, w) {
            return Err(BratsError::ShapeMismatch {
                what: "y",
                expected: vec![1, h, w],
                actual: y.shape().to_vec(),
            });
        }
        Ok(Self { x, y })
    }

    /// 图像通道数.
    #[inline]
    pub fn channels(&self) -> usize {
        self.x.len_of(Axis(0))
    }

    /// 平面尺寸 (高, 宽).
    #[inline]
    pub fn plane(&self) -> (usize, usize) {
        let (_, h, w) = self.x.dim();
        (h, w)
    }

    /// 标签中是否存在严格大于二值化阈值的像素.
    #[inline]
    pub fn has_lesion(&self) -> bool {
        self.y.iter().any(|p| *p > LABEL_THRESHOLD)
    }

    /// 将图像与标签都双线性缩放到 `RESIZE_SIDE x RESIZE_SIDE`.
    ///
    /// 标签同样使用双线性插值, 因此缩放后不再严格二值.
    pub fn downsample(&self) -> Self {
        let size = (RESIZE_SIDE, RESIZE_SIDE);
        Self {
            x: resize_channels(self.x.view(), size),
            y: resize_channels(self.y.view(), size),
        }
    }

    /// 以压缩 npz 格式保存到 `path`. 归档内包含 `x` 和 `y` 两个数组.
    pub fn save_npz<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut npz = NpzWriter::new_compressed(File::create(path.as_ref())?);
        npz.add_array(entry(X_KEY), &self.x)?;
        npz.add_array(entry(Y_KEY), &self.y)?;
        npz.finish()?;
        Ok(())
    }

    /// 从 npz 文件读取切片.
    ///
    /// 兼容 `f32` / `f64` 存储, 也兼容带前导单位维的 `(1, c, h, w)` 布局.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut npz = NpzReader::new(File::open(path.as_ref())?)?;
        let x = squeeze_to_chw(read_f32(&mut npz, X_KEY)?)?;
        let y = squeeze_to_chw(read_f32(&mut npz, Y_KEY)?)?;
        Self::new(x, y)
    }
}
