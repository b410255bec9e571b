//! 程序运行函数.

use crate::args::Cli;
use brats_berry::preprocess::Preprocessor;
use brats_berry::Result;
use log::info;
use std::io;
use utils::loader;

/// 实际运行.
pub fn run(cli: &Cli) -> Result<()> {
    let source = match cli.source.clone().or_else(loader::source_dir_from_env_or_home) {
        Some(s) if s.is_dir() => s,
        Some(s) => {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("原始数据目录 `{}` 不存在", s.display()),
            )
            .into())
        }
        None => {
            return Err(io::Error::new(io::ErrorKind::NotFound, "无法确定原始数据目录").into());
        }
    };

    let preprocessor = Preprocessor::new(cli.config(source));
    let config = preprocessor.config();
    info!(
        "Preprocessing {} ({}) into {}",
        config.source.display(),
        config.modality,
        config.output_root().display()
    );

    let jobs = utils::clamp_jobs(cli.jobs);
    let summary = if jobs > 1 {
        par_run(&preprocessor, jobs)?
    } else {
        preprocessor.run()?
    };

    utils::sep();
    for (split, patients) in &summary {
        let slices: usize = patients.iter().map(|p| p.range.len()).sum();
        println!("{split}: {} patients, {slices} slices", patients.len());
    }
    utils::sep();
    Ok(())
}

type Summary = Vec<(brats_berry::dataset::Split, Vec<brats_berry::preprocess::ProcessedPatient>)>;

#[cfg(feature = "rayon")]
fn par_run(p: &Preprocessor, jobs: usize) -> Result<Summary> {
    p.par_run(jobs)
}

#[cfg(not(feature = "rayon"))]
fn par_run(p: &Preprocessor, _jobs: usize) -> Result<Summary> {
    log::warn!("built without `rayon`, falling back to serial processing");
    p.run()
}
