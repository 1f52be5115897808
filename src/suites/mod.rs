use crate::{error::Error, runner::TestRunner};
use clap::ValueEnum;

/// Light client scenarios.
pub mod client;

/// Interchain accounts scenarios.
pub mod interchain_accounts;

/// ICS-20 transfer scenarios.
pub mod transfer;

/// Every suite runs against chains A and B.
pub const CHAIN_COUNT: usize = 2;

/// A group of scenarios selectable from the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteName {
    Transfer,
    Client,
    Ica,
    All,
}

impl SuiteName {
    /// Whether running `self` runs the scenarios of `other`.
    pub fn includes(self, other: SuiteName) -> bool {
        self == SuiteName::All || self == other
    }
}

/// Runs the scenarios of `suite` in order.
pub async fn run(runner: &mut TestRunner, suite: SuiteName) -> Result<(), Error> {
    if suite.includes(SuiteName::Transfer) {
        transfer::run(runner).await?;
    }
    if suite.includes(SuiteName::Client) {
        client::run(runner).await?;
    }
    if suite.includes(SuiteName::Ica) {
        interchain_accounts::run(runner).await?;
    }

    Ok(())
}
