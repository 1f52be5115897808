use clap::Parser;
use ibc_e2e::{
    config::{ProcessEnv, TestConfig},
    logging,
    runner::TestRunner,
    suite::E2ETestSuite,
    suites::{self, SuiteName},
};
use std::{error::Error as StdError, panic, path::PathBuf, process, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// Which scenarios to run.
    #[arg(short, long, value_enum, default_value_t = SuiteName::All)]
    suite: SuiteName,

    /// Path to a YAML config. Defaults to `E2E_CONFIG_PATH` or the home directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run scenarios whose name contains this.
    #[arg(short, long)]
    filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError + Send + Sync>> {
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(1);
    }));

    logging::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TestConfig::load_file(path, &ProcessEnv)?,
        None => TestConfig::load()?,
    };

    let suite = Arc::new(E2ETestSuite::setup_chains(config, suites::CHAIN_COUNT).await?);

    let mut runner = TestRunner::new(suite.clone(), args.filter);
    runner.start()?;

    let res = suites::run(&mut runner, args.suite).await;

    info!("tearing down");
    suite.cancel();

    res?;
    runner.join()?;

    Ok(())
}
