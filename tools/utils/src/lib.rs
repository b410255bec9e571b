//! 命令行工具依赖的通用组件.

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 将用户请求的线程数限制在 `[1, cpus()]` 内.
#[inline]
pub fn clamp_jobs(jobs: usize) -> usize {
    jobs.clamp(1, cpus().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_jobs() {
        assert_eq!(clamp_jobs(0), 1);
        assert_eq!(clamp_jobs(1), 1);
        assert!(clamp_jobs(usize::MAX) <= cpus());
    }
}
