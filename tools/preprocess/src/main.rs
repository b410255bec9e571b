use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod args;
mod runner;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;
    let cli = args::Cli::parse();
    runner::run(&cli)?;
    Ok(())
}
