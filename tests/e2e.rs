//! Tests against real containers. They need a Docker daemon and pull chain
//! and relayer images, so they only run with `--ignored`.

use ibc_e2e::{
    chain::{Chain, ChainSpec},
    config::{ProcessEnv, TestConfig},
    docker::{self, exec},
    logging,
    runner::TestRunner,
    suite::E2ETestSuite,
    suites::{self, SuiteName},
    testvalues,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn config() -> TestConfig {
    logging::init();

    TestConfig::load_from(&ProcessEnv).unwrap()
}

async fn single_chain() -> Chain {
    let config = config();
    let spec: ChainSpec = ibc_e2e::chain::default_chain_specs(&config, 1)
        .unwrap()
        .remove(0);

    Chain::start(spec, &docker::random_network_name(), CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_exec_in_chain_container() {
    let chain = single_chain().await;
    let node = &chain.nodes()[0];

    let res = exec(node, ["sh", "-c", "echo out; echo err >&2; exit 3"], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(res.stdout_str(), "out\n");
    assert_eq!(res.stderr_str(), "err\n");
    assert_eq!(res.exit_code, 3);
}

#[tokio::test]
#[ignore]
async fn test_chain_produces_blocks_and_funds_wallets() {
    let chain = single_chain().await;

    let start = chain.height().await.unwrap();
    let end = chain.wait_for_blocks(2).await.unwrap();
    assert!(end >= start + 2);

    let wallet = chain
        .create_wallet("e2e-user", testvalues::STARTING_TOKEN_AMOUNT)
        .await
        .unwrap();
    assert_eq!(
        chain.native_balance(&wallet).await.unwrap(),
        testvalues::STARTING_TOKEN_AMOUNT
    );
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn test_transfer_suite() {
    let suite = Arc::new(
        E2ETestSuite::setup_chains(config(), suites::CHAIN_COUNT)
            .await
            .unwrap(),
    );

    let mut runner = TestRunner::new(suite.clone(), Some("msg_transfer_succeeds".to_owned()));
    runner.start().unwrap();
    suites::run(&mut runner, SuiteName::Transfer).await.unwrap();

    assert_eq!(runner.outcomes().len(), 1);
    runner.join().unwrap();

    suite.cancel();
}
