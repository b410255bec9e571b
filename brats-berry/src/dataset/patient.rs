use crate::data::slice::{parse_slice_index, SliceRecord};
use crate::error::{BratsError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// 切片变换. 参数依次为物理切片索引和原始切片记录.
pub type Process<T> = fn(usize, SliceRecord) -> T;

/// 跳过谓词. 返回 `true` 表示该切片 (变换后) 应被跳过.
pub type SkipCondition<T> = fn(&T) -> bool;

#[inline]
fn keep_raw(_: usize, record: SliceRecord) -> SliceRecord {
    record
}

/// 单个病人所有切片组成的数据集.
///
/// 切片文件按文件名中嵌入的切片序号 (而不是文件名字典序) 升序排列,
/// 该顺序即 "物理索引". 若构造时给出了跳过谓词, 则会立即扫描全部切片,
/// 仅保留谓词为假的那些, 并按原顺序压缩为 "逻辑索引".
///
/// 构造完成后数据集只读. 读取时每次都重新打开切片文件并重新变换,
/// 因此被保留的切片在构造扫描时和每次读取时各变换一次.
#[derive(Debug, Clone)]
pub struct PatientDataset<T> {
    patient_dir: PathBuf,
    slice_paths: Vec<PathBuf>,
    process: Process<T>,
    id: Option<usize>,

    /// 逻辑索引 -> 物理索引.
    idx_map: Vec<usize>,
}

impl PatientDataset<SliceRecord> {
    /// 不做变换也不跳过任何切片.
    pub fn raw<P: AsRef<Path>>(patient_dir: P, id: Option<usize>) -> Result<Self> {
        Self::new(patient_dir, keep_raw, id, None)
    }
}

impl<T> PatientDataset<T> {
    /// 索引 `patient_dir` 下的所有切片文件.
    ///
    /// 任一文件名无法解析出切片序号, 或扫描时任一切片读取失败, 都会返回错误.
    pub fn new<P: AsRef<Path>>(
        patient_dir: P,
        process: Process<T>,
        id: Option<usize>,
        skip_condition: Option<SkipCondition<T>>,
    ) -> Result<Self> {
        let patient_dir = patient_dir.as_ref().to_owned();
        let mut indexed = Vec::new();
        for entry in fs::read_dir(&patient_dir)? {
            let path = entry?.path();
            indexed.push((parse_slice_index(&path)?, path));
        }
        indexed.sort_by_key(|(idx, _)| *idx);
        let slice_paths: Vec<PathBuf> = indexed.into_iter().map(|(_, p)| p).collect();

        let idx_map = match skip_condition {
            None => (0..slice_paths.len()).collect(),
            Some(skip) => {
                let mut valid = Vec::with_capacity(slice_paths.len());
                for (idx, path) in slice_paths.iter().enumerate() {
                    let item = process(idx, SliceRecord::open(path)?);
                    if !skip(&item) {
                        valid.push(idx);
                    }
                }
                debug!(
                    "{}: kept {} of {} slices",
                    patient_dir.display(),
                    valid.len(),
                    slice_paths.len()
                );
                valid
            }
        };

        Ok(Self {
            patient_dir,
            slice_paths,
            process,
            id,
            idx_map,
        })
    }

    /// 逻辑长度, 即保留下来的切片数.
    #[inline]
    pub fn len(&self) -> usize {
        self.idx_map.len()
    }

    /// 是否没有任何保留切片.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx_map.is_empty()
    }

    /// 物理长度, 即目录下的切片文件数.
    #[inline]
    pub fn physical_len(&self) -> usize {
        self.slice_paths.len()
    }

    /// 逻辑索引对应的物理索引. 越界时返回 `None`.
    #[inline]
    pub fn physical_index(&self, idx: usize) -> Option<usize> {
        self.idx_map.get(idx).copied()
    }

    /// 病人目录.
    #[inline]
    pub fn patient_dir(&self) -> &Path {
        &self.patient_dir
    }

    /// 构造时指定的 id.
    #[inline]
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    /// 按物理顺序排列的切片文件路径.
    #[inline]
    pub fn slice_paths(&self) -> &[PathBuf] {
        &self.slice_paths
    }

    /// 逻辑索引 `idx` 对应切片的文件路径.
    pub fn slice_path(&self, idx: usize) -> Result<&Path> {
        let phys = self.resolve(idx)?;
        Ok(&self.slice_paths[phys])
    }

    /// 读取逻辑索引 `idx` 处的切片并变换.
    pub fn get(&self, idx: usize) -> Result<T> {
        let phys = self.resolve(idx)?;
        let record = SliceRecord::open(&self.slice_paths[phys])?;
        Ok((self.process)(phys, record))
    }

    #[inline]
    fn resolve(&self, idx: usize) -> Result<usize> {
        self.physical_index(idx).ok_or(BratsError::IndexOutOfRange {
            index: idx,
            len: self.len(),
        })
    }
}
