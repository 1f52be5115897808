/*!
   Interchain accounts: a controller account on chain A registers an account
   on chain B and executes bank sends through it.

   Messages reach the host as a protobuf encoded `CosmosTx` inside the
   packet data, which `send-tx` reads as JSON.
*/

use crate::{
    chain::{Chain, Wallet},
    error::Error,
    ibc::{ChannelOptions, ClientOptions, ICA_CONTROLLER_PORT_PREFIX},
    runner::{TestContext, TestResult, TestRunner},
    testvalues::{self, IBC_TRANSFER_AMOUNT, STARTING_TOKEN_AMOUNT},
    util,
};
use cosmwasm_std::Binary;
use ibc_proto::{
    cosmos::{bank::v1beta1::MsgSend, base::v1beta1::Coin},
    google::protobuf::Any,
    ibc::applications::interchain_accounts::v1::{CosmosTx, Type},
};
use prost::Message;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time;
use tracing::info;

pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

/// How long a registered account may take to show up on the host.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(120);

const REGISTRATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Relative timeout of `send-tx` packets.
pub const PACKET_TIMEOUT: Duration = Duration::from_secs(3600);

/// Packet data executing a bank send of `amount` from `from` to `to` on the host.
pub fn bank_send_packet_data(from: &str, to: &str, amount: u128, denom: &str, memo: &str) -> Value {
    let msg = MsgSend {
        from_address: from.to_owned(),
        to_address: to.to_owned(),
        amount: vec![Coin {
            denom: denom.to_owned(),
            amount: amount.to_string(),
        }],
    };
    let tx = CosmosTx {
        messages: vec![Any {
            type_url: MSG_SEND_TYPE_URL.to_owned(),
            value: msg.encode_to_vec(),
        }],
    };

    json!({
        "type": Type::ExecuteTx.as_str_name(),
        "data": Binary::from(tx.encode_to_vec()).to_base64(),
        "memo": memo,
    })
}

pub async fn run(runner: &mut TestRunner) -> Result<(), Error> {
    runner
        .run(
            msg_send_tx_successful_transfer,
            "interchain_accounts/msg_send_tx_successful_transfer",
            "An interchain account executes a bank send on behalf of its owner.",
        )
        .await?
        .run(
            msg_send_tx_failed_transfer_insufficient_funds,
            "interchain_accounts/msg_send_tx_failed_transfer_insufficient_funds",
            "A bank send from an unfunded interchain account moves no tokens.",
        )
        .await?;

    Ok(())
}

/// Registers an interchain account for `owner` and waits for the host to create it.
async fn register_interchain_account(
    ctx: &TestContext,
    chain: &Chain,
    owner: &Wallet,
    connection_id: &str,
) -> Result<String, Error> {
    let suite = &ctx.suite;

    let mut args = vec![
        "interchain-accounts".to_owned(),
        "controller".to_owned(),
        "register".to_owned(),
        connection_id.to_owned(),
    ];
    if testvalues::ICA_CHANNEL_ORDERING.is_supported(chain.tag()) {
        args.extend(["--ordering".to_owned(), "ORDER_ORDERED".to_owned()]);
    }

    let resp = suite.broadcast(&ctx.name, chain, owner, args).await?;
    suite.assert_tx_success(&resp)?;

    let poll = async {
        loop {
            match chain.grpc().interchain_account(&owner.address, connection_id).await {
                Ok(address) if !address.is_empty() => return address,
                Ok(_) => info!("interchain account of {} is not registered yet", owner.address),
                Err(err) => info!("interchain account of {} is not registered yet: {err}", owner.address),
            }

            time::sleep(REGISTRATION_POLL_INTERVAL).await;
        }
    };

    time::timeout(REGISTRATION_TIMEOUT, poll).await.map_err(|_| {
        Error::Assertion(format!(
            "no interchain account registered for {} on {connection_id}",
            owner.address
        ))
    })
}

async fn send_tx(
    ctx: &TestContext,
    chain: &Chain,
    owner: &Wallet,
    connection_id: &str,
    packet_data: &Value,
) -> Result<(), Error> {
    let suite = &ctx.suite;

    let args = vec![
        "interchain-accounts".to_owned(),
        "controller".to_owned(),
        "send-tx".to_owned(),
        connection_id.to_owned(),
        packet_data.to_string(),
        "--packet-timeout-timestamp".to_owned(),
        PACKET_TIMEOUT.as_nanos().to_string(),
    ];

    let resp = suite.broadcast(&ctx.name, chain, owner, args).await?;
    suite.assert_tx_success(&resp)
}

async fn msg_send_tx_successful_transfer(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let path = suite.relayer_path(&relayer, &ctx.name)?;

    let controller = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let receiver = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    let host_address = register_interchain_account(&ctx, chain_a, &controller, &path.connection_a).await?;
    info!("registered interchain account {host_address}");

    let channels = relayer.query_channels(chain_a.chain_id(), chain_b.chain_id()).await?;
    util::assert_err(
        "an interchain accounts controller channel is open on chain A",
        channels
            .iter()
            .any(|channel| channel.port_id.starts_with(ICA_CONTROLLER_PORT_PREFIX)),
    )?;

    chain_b.fund(&host_address, STARTING_TOKEN_AMOUNT).await?;

    let packet_data = bank_send_packet_data(
        &host_address,
        &receiver.address,
        IBC_TRANSFER_AMOUNT,
        chain_b.denom(),
        "e2e",
    );
    send_tx(&ctx, chain_a, &controller, &path.connection_a, &packet_data).await?;
    suite.wait_for_blocks(10, &[chain_a, chain_b]).await?;

    util::assert_eq(
        "receiver balance",
        &chain_b.native_balance(&receiver).await?,
        &(STARTING_TOKEN_AMOUNT + IBC_TRANSFER_AMOUNT),
    )?;
    util::assert_eq(
        "interchain account balance",
        &chain_b.balance(&host_address, chain_b.denom()).await?,
        &(STARTING_TOKEN_AMOUNT - IBC_TRANSFER_AMOUNT),
    )?;

    Ok(())
}

async fn msg_send_tx_failed_transfer_insufficient_funds(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let path = suite.relayer_path(&relayer, &ctx.name)?;

    let controller = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let receiver = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    let host_address = register_interchain_account(&ctx, chain_a, &controller, &path.connection_a).await?;

    util::assert_eq(
        "interchain account starts empty",
        &chain_b.balance(&host_address, chain_b.denom()).await?,
        &0,
    )?;

    let packet_data = bank_send_packet_data(
        &host_address,
        &receiver.address,
        IBC_TRANSFER_AMOUNT,
        chain_b.denom(),
        "e2e",
    );
    send_tx(&ctx, chain_a, &controller, &path.connection_a, &packet_data).await?;
    suite.wait_for_blocks(10, &[chain_a, chain_b]).await?;

    util::assert_eq(
        "receiver balance is unchanged",
        &chain_b.native_balance(&receiver).await?,
        &STARTING_TOKEN_AMOUNT,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_send_packet_data() {
        let data = bank_send_packet_data("cosmos1host", "cosmos1receiver", 10_000, "atomb", "e2e");

        assert_eq!(data["type"], "TYPE_EXECUTE_TX");
        assert_eq!(data["memo"], "e2e");

        let bytes = Binary::from_base64(data["data"].as_str().unwrap()).unwrap();
        let tx = CosmosTx::decode(bytes.as_slice()).unwrap();
        assert_eq!(tx.messages.len(), 1);
        assert_eq!(tx.messages[0].type_url, MSG_SEND_TYPE_URL);

        let msg = MsgSend::decode(tx.messages[0].value.as_slice()).unwrap();
        assert_eq!(msg.from_address, "cosmos1host");
        assert_eq!(msg.to_address, "cosmos1receiver");
        assert_eq!(
            msg.amount,
            vec![Coin {
                denom: "atomb".to_owned(),
                amount: "10000".to_owned(),
            }]
        );
    }
}
