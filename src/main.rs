use clap::Parser;
use helr::Args;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    helr::run(Args::parse())
}
