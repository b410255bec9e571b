/// 多个子数据集拼接后的全局索引表.
///
/// 保存各子数据集长度的前缀和, 将全局索引映射为 (子数据集序号, 局部索引).
/// 空的子数据集不占据任何全局索引.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConcatIndex {
    cumulative: Vec<usize>,
}

impl ConcatIndex {
    /// 由各子数据集的长度构造.
    pub fn from_lens<I: IntoIterator<Item = usize>>(lens: I) -> Self {
        let cumulative = lens
            .into_iter()
            .scan(0usize, |acc, l| {
                *acc += l;
                Some(*acc)
            })
            .collect();
        Self { cumulative }
    }

    /// 全局长度.
    #[inline]
    pub fn len(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 子数据集个数.
    #[inline]
    pub fn parts(&self) -> usize {
        self.cumulative.len()
    }

    /// 将全局索引映射为 (子数据集序号, 局部索引). 越界时返回 `None`.
    pub fn locate(&self, idx: usize) -> Option<(usize, usize)> {
        if idx >= self.len() {
            return None;
        }
        let part = self.cumulative.partition_point(|&c| c <= idx);
        let start = if part == 0 { 0 } else { self.cumulative[part - 1] };
        Some((part, idx - start))
    }
}
