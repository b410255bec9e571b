//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::error::{BratsError, Result};

pub use crate::data::slice::{ImgWriteVis, SliceRecord};
pub use crate::data::{BratsVolume, Modality, MriScan, NiftiHeaderAttr, Sequence, SliceTrim};

pub use crate::preprocess::{process_patient, PreprocessConfig, Preprocessor, SplitManifest};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{load_brats, BrainDataset, BrainDatasetConfig, PatientDataset, Sample, Split};

pub use crate::loader::{
    check_data, get_brats_data_iter, get_data_iter, Batch, BratsIterConfig, DataLoader, LoaderConfig,
    Sampler, WorkerTopology,
};
