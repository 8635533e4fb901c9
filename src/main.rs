use clap::Parser;

use cellgate::cli::{execute, Cli};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start = std::time::Instant::now();
    execute(Cli::parse())?;
    log::info!("Elapsed time: {:.3?}", start.elapsed());
    Ok(())
}
