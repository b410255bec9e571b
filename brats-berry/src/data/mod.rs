use std::ops::Range;
use std::path::Path;

use log::info;
use ndarray::{s, Array3, Array4, ArrayView3, ArrayView4, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::LABEL_THRESHOLD;
use crate::error::{BratsError, Result};
use crate::{Idx2d, Idx3d};

pub mod modality;
pub mod normalise;
pub mod resize;
pub mod slice;
pub mod trim;

pub use modality::{Modality, Sequence};
pub use slice::SliceRecord;
pub use trim::SliceTrim;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (X, Y, z) 转换成 (z, X, Y). 以后均按照该模式访问, 即 `h = X`, `w = Y`.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [X, Y, z]. 体素个数数组.
    let [_, x, y, z, ..] = h.dim;
    (z as usize, x as usize, y as usize)
}

/// 3D MRI nii 文件 header 的共用属性.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取单个体素分辨率 (毫米), 依次为 z, 高, 宽.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, x, y, z, ..] = self.header().pixdim;
        [z as f64, x as f64, y as f64]
    }
}

/// 读取 nifti 文件, 并将 [X, Y, z] 转换为 [z, X, Y]. 切片平面保持 nifti 原有的轴序.
fn read_volume(path: &Path) -> Result<(BoxedHeader, Array3<f32>)> {
    let obj = ReaderOptions::new().read_file(path)?;
    let header = Box::new(obj.header().clone());

    // hint: 切片的第一维为原 X 轴, 第二维为原 Y 轴.
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()?
        .permuted_axes([2, 0, 1].as_slice());
    let data = data.as_standard_layout().into_owned().into_dimensionality::<Ix3>()?;
    Ok((header, data))
}

/// nii 格式的单个 3D MRI 序列 (或分割标签), 体素以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct MriScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for MriScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl MriScan {
    /// 打开 nii (或 nii.gz) 文件. `path` 为文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (header, data) = read_volume(path.as_ref())?;
        Ok(Self { header, data })
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 消费自我, 获得底层 `(z, h, w)` 数据.
    #[inline]
    pub fn into_raw(self) -> Array3<f32> {
        self.data
    }
}

/// 单个病人的 3D MRI 数据: 选定模态堆叠成的多通道体数据和分割标签.
///
/// 图像按 `(c, z, h, w)` 组织, 标签按 `(z, h, w)` 组织.
/// 所有通道与标签在切片维上长度一致.
#[derive(Debug, Clone)]
pub struct BratsVolume {
    patient: String,
    header: BoxedHeader,
    channels: Array4<f32>,
    label: Array3<f32>,
}

impl NiftiHeaderAttr for BratsVolume {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// 裁剪后形状可能与 header 不一致, 以实际数据为准.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.label.dim()
    }
}

impl BratsVolume {
    /// 打开病人目录 `patient_dir` 下的指定模态序列和分割标签.
    ///
    /// 目录名即病人 id, 文件形如 `{id}_{flair,t1,t1ce,t2,seg}.nii.gz`.
    /// 只读取 `modality` 需要的序列. 任一文件缺失或形状不一致都返回错误.
    pub fn open<P: AsRef<Path>>(patient_dir: P, modality: Modality) -> Result<Self> {
        let dir = patient_dir.as_ref();
        let patient = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let seg = MriScan::open(dir.join(modality::seg_file_name(&patient)))?;
        let expected = seg.shape();
        let mut scans = Vec::with_capacity(modality.channels());
        for seq in modality.sequences() {
            let scan = MriScan::open(dir.join(seq.file_name(&patient)))?;
            if scan.shape() != expected {
                return Err(BratsError::ShapeMismatch {
                    what: seq.name(),
                    expected: vec![expected.0, expected.1, expected.2],
                    actual: scan.data.shape().to_vec(),
                });
            }
            scans.push(scan);
        }
        let views: Vec<_> = scans.iter().map(|s| s.data()).collect();
        let channels = ndarray::stack(Axis(0), &views)?;
        let MriScan { header, data: label } = seg;

        Ok(Self {
            patient,
            header,
            channels,
            label,
        })
    }

    /// 根据裸数据直接创建实体. 主要用于测试与合成数据.
    ///
    /// `channels` 为 `(c, z, h, w)`, `label` 为 `(z, h, w)`.
    pub fn from_raw(patient: &str, channels: Array4<f32>, label: Array3<f32>) -> Result<Self> {
        let (_, z, h, w) = channels.dim();
        if label.dim() != (z, h, w) {
            return Err(BratsError::ShapeMismatch {
                what: "label",
                expected: vec![z, h, w],
                actual: label.shape().to_vec(),
            });
        }
        Ok(Self {
            patient: patient.to_string(),
            header: Box::default(),
            channels,
            label,
        })
    }

    /// 病人 id.
    #[inline]
    pub fn patient(&self) -> &str {
        &self.patient
    }

    /// 图像通道数.
    #[inline]
    pub fn channel_len(&self) -> usize {
        self.channels.len_of(Axis(0))
    }

    /// 图像数据视图 `(c, z, h, w)`.
    #[inline]
    pub fn channels(&self) -> ArrayView4<'_, f32> {
        self.channels.view()
    }

    /// 标签数据视图 `(z, h, w)`.
    #[inline]
    pub fn label(&self) -> ArrayView3<'_, f32> {
        self.label.view()
    }

    /// 按 `trim` 策略裁剪首尾切片. 返回保留下来的原始切片范围.
    pub fn trim(&mut self, trim: SliceTrim) -> Range<usize> {
        let range = trim.range(self.len_z());
        let r = range.clone();
        self.channels = self.channels.slice(s![.., r.clone(), .., ..]).to_owned();
        self.label = self.label.slice(s![r, .., ..]).to_owned();
        range
    }

    /// 将标签二值化: 严格大于 0.5 的体素为 1, 其余为 0.
    pub fn binarize_label(&mut self) {
        self.label
            .mapv_inplace(|v| if v > LABEL_THRESHOLD { 1.0 } else { 0.0 });
    }

    /// 按前景 99 分位数逐通道归一化强度. 返回每个通道的缩放系数.
    pub fn normalise_percentile(&mut self) -> Result<Vec<f32>> {
        normalise::normalise_percentile(self.channels.view_mut())
    }

    /// 含脑组织的切片范围 `[first, last)`. 没有时返回错误.
    pub fn brain_range(&self) -> Result<Range<usize>> {
        let range = normalise::brain_range(self.channels.view()).ok_or_else(|| {
            BratsError::EmptyBrainRange {
                patient: self.patient.clone(),
            }
        })?;
        info!(
            "Patient {} has {} to {} slices with brain tissue.",
            self.patient, range.start, range.end
        );
        Ok(range)
    }

    /// 取出第 `z_index` 层切片. 当 `z_index` 越界时 panic.
    pub fn slice_at(&self, z_index: usize) -> SliceRecord {
        SliceRecord {
            x: self.channels.index_axis(Axis(1), z_index).to_owned(),
            y: self
                .label
                .index_axis(Axis(0), z_index)
                .insert_axis(Axis(0))
                .to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> BratsVolume {
        let channels = Array4::from_shape_fn((2, 6, 3, 3), |(c, z, _, _)| (c + z) as f32);
        let label = Array3::from_shape_fn((6, 3, 3), |(z, h, _)| if z == h { 2.0 } else { 0.4 });
        BratsVolume::from_raw("p0", channels, label).unwrap()
    }

    #[test]
    fn test_from_raw_shape_check() {
        let bad = BratsVolume::from_raw("p", Array4::zeros((1, 4, 3, 3)), Array3::zeros((5, 3, 3)));
        assert!(matches!(bad, Err(BratsError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_trim_keeps_alignment() {
        let mut v = volume();
        assert_eq!(v.trim(SliceTrim::new(1, 2)), 1..4);
        assert_eq!(v.shape(), (3, 3, 3));
        // 原第 1 层成为新的第 0 层.
        assert_eq!(v.slice_at(0).x[(1, 0, 0)], 2.0);
        assert_eq!(v.slice_at(0).y[(0, 1, 0)], 2.0);
    }

    #[test]
    fn test_binarize_idempotent() {
        let mut v = volume();
        v.binarize_label();
        let once = v.label().to_owned();
        v.binarize_label();
        assert_eq!(once, v.label());
        assert!(once.iter().all(|p| *p == 0.0 || *p == 1.0));
        assert_eq!(once.sum(), 3.0 * 3.0);
    }

    #[test]
    fn test_slice_record_shape() {
        let rec = volume().slice_at(5);
        assert_eq!(rec.x.dim(), (2, 3, 3));
        assert_eq!(rec.y.dim(), (1, 3, 3));
        assert_eq!(rec.x[(1, 2, 2)], 6.0);
    }
}
