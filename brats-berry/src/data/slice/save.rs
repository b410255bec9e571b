//! 切片的可视化导出.

use super::SliceRecord;
use image::ImageResult;
use ndarray::{s, Array2, ArrayView2, ArrayView4};
use std::path::Path;

/// 网格中相邻图像之间 (以及外边框) 的像素间距.
const GRID_PADDING: usize = 2;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 图像不会按原样保存, 而是先映射到 8-bit 灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 将 `[0, 1]` 范围内的浮点图保存为 8-bit 灰度图. 越界的值被截断.
pub fn save_gray<P: AsRef<Path>>(img: ArrayView2<f32>, path: P) -> ImageResult<()> {
    let (height, width) = img.dim();
    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in img.indexed_iter() {
        // 255, not 256.
        let gray = (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
    }
    buf.save(path)
}

/// 将一批单通道图像 `(n, 1, h, w)` 拼成网格, 每行 `nrow` 张.
///
/// 图像之间以及外边框留有 `GRID_PADDING` 像素的 0 值间距.
/// 多通道输入只取第一个通道.
pub fn make_grid(batch: ArrayView4<f32>, nrow: usize) -> Array2<f32> {
    let (n, _, h, w) = batch.dim();
    if n == 0 {
        return Array2::zeros((0, 0));
    }
    let cols = nrow.clamp(1, n);
    let rows = (n + cols - 1) / cols;
    let (cell_h, cell_w) = (h + GRID_PADDING, w + GRID_PADDING);
    let mut grid = Array2::zeros((rows * cell_h + GRID_PADDING, cols * cell_w + GRID_PADDING));
    for k in 0..n {
        let (r, c) = (k / cols, k % cols);
        let (top, left) = (r * cell_h + GRID_PADDING, c * cell_w + GRID_PADDING);
        grid.slice_mut(s![top..top + h, left..left + w])
            .assign(&batch.slice(s![k, 0, .., ..]));
    }
    grid
}

/// 每个通道占一列, 标签在最后一列; 图像值从 `[-1, 1]` 映射回 `[0, 1]`.
impl ImgWriteVis for SliceRecord {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (c, h, w) = self.x.dim();
        let mut tiles = ndarray::Array4::<f32>::zeros((c + 1, 1, h, w));
        for k in 0..c {
            tiles
                .slice_mut(s![k, 0, .., ..])
                .assign(&self.x.slice(s![k, .., ..]).mapv(|v| (v + 1.0) / 2.0));
        }
        tiles.slice_mut(s![c, 0, .., ..]).assign(&self.y.slice(s![0, .., ..]));
        save_gray(make_grid(tiles.view(), c + 1).view(), path)
    }
}
