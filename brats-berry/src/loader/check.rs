use super::{Batch, DataLoader};
use crate::data::slice::{make_grid, save_gray};
use crate::error::{BratsError, Result};
use ndarray::{s, Array4, Axis};
use std::fs;
use std::path::{Path, PathBuf};

/// 多通道输入时网格中最多保留的图块数.
const MAX_TILES: usize = 64;

/// 默认每行图块数.
const TILES_PER_ROW: usize = 8;

/// 将 `(n, c, h, w)` 展开为 `(n * c, 1, h, w)`, 取前 `MAX_TILES` 张并从 `[-1, 1]` 映射到 `[0, 1]`.
fn split_channels(images: &Array4<f32>) -> Result<Array4<f32>> {
    let (n, c, h, w) = images.dim();
    let flat = images
        .as_standard_layout()
        .into_owned()
        .into_shape((n * c, 1, h, w))?;
    let keep = (n * c).min(MAX_TILES);
    Ok(flat.slice(s![..keep, .., .., ..]).mapv(|v| (v + 1.0) / 2.0))
}

/// 取加载器的第一个批次, 导出为 PNG 网格以便目视检查.
///
/// 写出 `image_dir/real_{name}_{split}.png`; 非训练集还写出标签图
/// `image_dir/gt_{name}_{split}.png`. 返回写出的文件路径.
pub fn check_data<P: AsRef<Path>>(loader: &mut DataLoader, image_dir: P, name: &str) -> Result<Vec<PathBuf>> {
    let split = loader.dataset().split();
    let batch: Batch = loader.iter().next().ok_or(BratsError::EmptyDataset)??;

    let images = batch.images();
    let (samples, nrow) = if images.len_of(Axis(1)) == 4 {
        (split_channels(images)?, images.len_of(Axis(1)))
    } else {
        (images.clone(), TILES_PER_ROW)
    };

    let image_dir = image_dir.as_ref();
    fs::create_dir_all(image_dir)?;
    let mut written = Vec::with_capacity(2);

    let real = image_dir.join(format!("real_{name}_{split}.png"));
    save_gray(make_grid(samples.view(), nrow).view(), &real)?;
    written.push(real);

    if let Some(masks) = batch.masks() {
        let gt = image_dir.join(format!("gt_{name}_{split}.png"));
        save_gray(make_grid(masks.view(), nrow).view(), &gt)?;
        written.push(gt);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::slice::{slice_file_name, SliceRecord};
    use crate::dataset::Split;
    use crate::loader::{get_brats_data_iter, BratsIterConfig, LoaderConfig};
    use ndarray::Array3;

    #[test]
    fn test_split_channels() {
        let images = Array4::<f32>::from_elem((20, 4, 2, 2), -1.0);
        let tiles = split_channels(&images).unwrap();
        assert_eq!(tiles.dim(), (64, 1, 2, 2));
        assert!(tiles.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_check_data_writes_grids() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("npy_test").join("patient_0");
        fs::create_dir_all(&dir).unwrap();
        for s in 0..3 {
            let x = Array3::from_shape_fn((4, 6, 6), |(c, h, w)| (c + h + w + s) as f32);
            SliceRecord::new(x, Array3::zeros((1, 6, 6)))
                .unwrap()
                .save_npz(dir.join(slice_file_name(s)))
                .unwrap();
        }
        let config = BratsIterConfig {
            loader: LoaderConfig {
                batch_size: 2,
                split: Split::Test,
                ..Default::default()
            },
            mixed: true,
            ..Default::default()
        };
        let mut loader = get_brats_data_iter(root.path(), &config).unwrap();
        let out = root.path().join("images");
        let written = check_data(&mut loader, &out, "brats").unwrap();
        assert_eq!(written, [out.join("real_brats_test.png"), out.join("gt_brats_test.png")]);
        for p in &written {
            assert!(p.is_file());
        }
    }
}
