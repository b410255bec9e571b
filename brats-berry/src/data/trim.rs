//! 首尾切片裁剪策略.

use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 首尾切片裁剪参数.
///
/// 是否裁剪由 `pre` 和 `post` 的符号共同决定:
///
/// | `pre` | `post` | 保留范围 |
/// |-------|--------|----------|
/// | `> 0` | `> 0`  | `[pre, len - post)` |
/// | `> 0` | `< 0`  | `[pre, len)` |
/// | `< 0` | `> 0`  | `[0, len - post)` |
/// | 其它  | 其它   | `[0, len)` |
///
/// 注意任一参数为 `0` 时均落入最后一种情况, 包括 `pre > 0, post == 0`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceTrim {
    /// 跳过的前部切片数.
    pub pre: i32,

    /// 跳过的后部切片数.
    pub post: i32,
}

impl Default for SliceTrim {
    #[inline]
    fn default() -> Self {
        Self { pre: -1, post: -1 }
    }
}

impl SliceTrim {
    /// 初始化.
    #[inline]
    pub const fn new(pre: i32, post: i32) -> Self {
        Self { pre, post }
    }

    /// 对长度为 `len` 的切片序列, 求裁剪后保留的索引范围.
    ///
    /// 裁剪量超过 `len` 时返回空范围.
    pub fn range(&self, len: usize) -> Range<usize> {
        let (pre, post) = (self.pre, self.post);
        let head = |p: i32| (p as usize).min(len);
        let tail = |p: i32| len.saturating_sub(p as usize);
        let (start, end) = if pre > 0 && post > 0 {
            (head(pre), tail(post))
        } else if pre > 0 && post < 0 {
            (head(pre), len)
        } else if pre < 0 && post > 0 {
            (0, tail(post))
        } else {
            (0, len)
        };
        start..end.max(start)
    }

    /// 用于输出目录命名的后缀, 即 `{pre}{post}` 直接拼接.
    #[inline]
    pub fn tag(&self) -> String {
        format!("{}{}", self.pre, self.post)
    }
}

#[cfg(test)]
mod tests {
    use super::SliceTrim;

    #[test]
    fn test_trim_four_cases() {
        assert_eq!(SliceTrim::new(10, 5).range(155), 10..150);
        assert_eq!(SliceTrim::new(10, -1).range(155), 10..155);
        assert_eq!(SliceTrim::new(-1, 5).range(155), 0..150);
        assert_eq!(SliceTrim::default().range(155), 0..155);
    }

    #[test]
    fn test_trim_zero_is_no_trim() {
        assert_eq!(SliceTrim::new(10, 0).range(155), 0..155);
        assert_eq!(SliceTrim::new(0, 10).range(155), 0..155);
        assert_eq!(SliceTrim::new(0, 0).range(155), 0..155);
    }

    #[test]
    fn test_trim_overflow_is_empty() {
        assert!(SliceTrim::new(100, 100).range(155).is_empty());
        assert!(SliceTrim::new(200, -1).range(155).is_empty());
        assert!(SliceTrim::new(-1, 200).range(155).is_empty());
    }

    #[test]
    fn test_trim_tag() {
        assert_eq!(SliceTrim::default().tag(), "-1-1");
        assert_eq!(SliceTrim::new(0, 0).tag(), "00");
        assert_eq!(SliceTrim::new(10, -1).tag(), "10-1");
    }
}
