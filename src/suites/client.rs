//! Light client status and updates.

use crate::{
    chain::Chain,
    error::{Error, QueryError},
    grpc::{CLIENT_STATUS_ACTIVE, CLIENT_STATUS_EXPIRED},
    ibc::{ChannelOptions, ClientOptions},
    runner::{TestContext, TestResult, TestRunner},
    util,
};
use ibc_proto::{google::protobuf::Any, ibc::lightclients::tendermint::v1::ClientState};
use prost::Message;
use std::time::Duration;
use tokio::time;
use tracing::info;

pub const TENDERMINT_CLIENT_STATE_TYPE_URL: &str = "/ibc.lightclients.tendermint.v1.ClientState";

/// Short enough for a client to expire during the test.
pub const SHORT_TRUSTING_PERIOD: Duration = Duration::from_secs(10);

/// The revision height a tendermint client state was last updated to.
pub fn latest_height(client_state: &Any) -> Result<u64, QueryError> {
    if client_state.type_url != TENDERMINT_CLIENT_STATE_TYPE_URL {
        return Err(QueryError::InvalidTypeName(client_state.type_url.clone()));
    }

    let state = ClientState::decode(client_state.value.as_slice())?;

    state
        .latest_height
        .map(|height| height.revision_height)
        .ok_or(QueryError::MissingField("latest_height"))
}

pub async fn run(runner: &mut TestRunner) -> Result<(), Error> {
    runner
        .run(
            client_update_advances_height,
            "client/client_update_advances_height",
            "Clients created for a path are active and updating them advances their latest height.",
        )
        .await?
        .run(
            client_expires_after_trusting_period,
            "client/client_expires_after_trusting_period",
            "A client that is not updated within its trusting period expires.",
        )
        .await?;

    Ok(())
}

async fn client_latest_height(chain: &Chain, client_id: &str) -> Result<u64, Error> {
    let state = chain.grpc().client_state(client_id).await?;

    Ok(latest_height(&state)?)
}

async fn client_update_advances_height(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let path = suite.relayer_path(&relayer, &ctx.name)?;

    for (chain, client_id) in [(chain_a, &path.client_a), (chain_b, &path.client_b)] {
        util::assert_eq(
            format!("status of {client_id} on {}", chain.chain_id()),
            &chain.grpc().client_status(client_id).await?,
            &CLIENT_STATUS_ACTIVE.to_owned(),
        )?;
    }

    let before = client_latest_height(chain_a, &path.client_a).await?;
    suite.wait_for_blocks(2, &[chain_a, chain_b]).await?;

    for path_name in suite.paths(&ctx.name)? {
        suite.update_clients(&relayer, &path_name).await?;
    }
    suite.wait_for_blocks(1, &[chain_a, chain_b]).await?;

    let after = client_latest_height(chain_a, &path.client_a).await?;
    info!("{} advanced from {before} to {after}", path.client_a);

    util::assert_err(
        format!("latest height of {} advanced past {before}, got {after}", path.client_a),
        after > before,
    )?;

    Ok(())
}

async fn client_expires_after_trusting_period(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, _) = suite.chain_pair()?;
    let relayer = suite.relayer_for_test(&ctx.name)?;

    let opts = ClientOptions {
        trusting_period: Some(format!("{}s", SHORT_TRUSTING_PERIOD.as_secs())),
    };
    let (_, path) = suite.create_clients(&relayer, 0, 1, &opts, &ctx.name).await?;

    util::assert_eq(
        "status of the new client",
        &chain_a.grpc().client_status(&path.client_a).await?,
        &CLIENT_STATUS_ACTIVE.to_owned(),
    )?;

    time::sleep(SHORT_TRUSTING_PERIOD * 2).await;
    chain_a.wait_for_blocks(1).await?;

    util::assert_eq(
        "status once the trusting period elapsed",
        &chain_a.grpc().client_status(&path.client_a).await?,
        &CLIENT_STATUS_EXPIRED.to_owned(),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibc_proto::ibc::core::client::v1::Height;

    #[test]
    fn test_latest_height() {
        let state = ClientState {
            chain_id: "chainB-1".to_owned(),
            latest_height: Some(Height {
                revision_number: 1,
                revision_height: 42,
            }),
            ..Default::default()
        };
        let any = Any {
            type_url: TENDERMINT_CLIENT_STATE_TYPE_URL.to_owned(),
            value: state.encode_to_vec(),
        };

        assert_eq!(latest_height(&any).unwrap(), 42);
    }

    #[test]
    fn test_latest_height_rejects_other_clients() {
        let any = Any {
            type_url: "/ibc.lightclients.solomachine.v3.ClientState".to_owned(),
            value: Vec::new(),
        };

        assert!(matches!(latest_height(&any), Err(QueryError::InvalidTypeName(_))));
    }
}
