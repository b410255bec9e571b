use brats_berry::data::{Modality, SliceTrim};
use brats_berry::preprocess::PreprocessConfig;
use clap::Parser;
use std::path::PathBuf;

/// 将 BraTS 原始 nii 体数据预处理为逐切片 npz 文件.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// 原始数据目录. 缺省时取 `$BRATS_SOURCE_DIR`, 再缺省取 `$HOME/dataset/BraTS21`.
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// 模态组合: all, flair, t1, t1ce, t2.
    #[arg(short, long = "mod", default_value = "flair", value_parser = parse_modality)]
    pub modality: Modality,

    /// 裁掉开头的切片数. 非正数表示不裁剪开头.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub pre: i32,

    /// 裁掉结尾的切片数. 非正数表示不裁剪结尾.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub post: i32,

    /// 将切片缩放到 128x128.
    #[arg(long)]
    pub downsample: bool,

    /// 并行处理的病人数. 1 表示串行.
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,
}

fn parse_modality(s: &str) -> Result<Modality, String> {
    s.parse().map_err(|e: brats_berry::BratsError| e.to_string())
}

impl Cli {
    /// 转换为库的预处理参数. `source` 为已确定的原始数据目录.
    pub fn config(&self, source: PathBuf) -> PreprocessConfig {
        PreprocessConfig {
            source,
            modality: self.modality,
            trim: SliceTrim::new(self.pre, self.post),
            downsample: self.downsample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["brats-preprocess", "-s", "/data/BraTS21"]).unwrap();
        assert_eq!(cli.modality, Modality::Flair);
        assert_eq!((cli.pre, cli.post), (-1, -1));
        assert!(!cli.downsample);
        assert_eq!(cli.jobs, 1);
    }

    #[test]
    fn test_negative_trim_and_modality() {
        let cli = Cli::try_parse_from([
            "brats-preprocess",
            "--mod",
            "all",
            "--pre",
            "-1",
            "--post",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.modality, Modality::All);
        let config = cli.config(PathBuf::from("/data/src"));
        assert_eq!(config.trim, SliceTrim::new(-1, 5));

        assert!(Cli::try_parse_from(["brats-preprocess", "--mod", "dwi"]).is_err());
    }
}
