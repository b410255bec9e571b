//! 持久化的二维切片记录.

mod core;
mod save;

pub use self::core::{parse_slice_index, slice_file_name, SliceRecord};

pub use save::{make_grid, save_gray, ImgWriteVis};
