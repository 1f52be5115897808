//! ICS-20 token transfers between chains A and B.

use crate::{
    error::Error,
    ibc::{ChannelOptions, ClientOptions, IbcToken},
    runner::{TestContext, TestResult, TestRunner},
    suite::TransferArgs,
    testvalues::{self, IBC_TRANSFER_AMOUNT, STARTING_TOKEN_AMOUNT},
    tx, util,
};
use serde_json::{json, Value};
use tracing::info;

/// The transfer module's `MsgUpdateParams`, executed by governance.
pub fn transfer_params_update(authority: &str, send_enabled: bool, receive_enabled: bool) -> Value {
    json!({
        "@type": "/ibc.applications.transfer.v1.MsgUpdateParams",
        "signer": authority,
        "params": {
            "send_enabled": send_enabled,
            "receive_enabled": receive_enabled,
        },
    })
}

pub async fn run(runner: &mut TestRunner) -> Result<(), Error> {
    runner
        .run(
            msg_transfer_succeeds,
            "transfer/msg_transfer_succeeds",
            "A native token sent from chain A to chain B is received as a voucher and can be sent back.",
        )
        .await?
        .run(
            msg_transfer_fails_invalid_address,
            "transfer/msg_transfer_fails_invalid_address",
            "Tokens sent to an invalid receiver are refunded once the error acknowledgement is relayed.",
        )
        .await?
        .run(
            msg_transfer_fails_insufficient_funds,
            "transfer/msg_transfer_fails_insufficient_funds",
            "A transfer of more than the sender holds is rejected and nothing is escrowed.",
        )
        .await?
        .run(
            msg_transfer_timeout,
            "transfer/msg_transfer_timeout",
            "Tokens of a packet that timed out are refunded to the sender.",
        )
        .await?
        .run(
            msg_transfer_with_memo,
            "transfer/msg_transfer_with_memo",
            "A transfer carrying a memo is relayed like any other.",
        )
        .await?
        .run(
            msg_transfer_from_relayer_wallet,
            "transfer/msg_transfer_from_relayer_wallet",
            "A transfer signed by the relayer's own wallet succeeds while the relayer is running.",
        )
        .await?
        .run(
            receive_enabled_param,
            "transfer/receive_enabled_param",
            "Disabling receives through governance makes chain A reject incoming transfers.",
        )
        .await?;

    Ok(())
}

async fn msg_transfer_succeeds(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let channel_a = suite.channel_between(&ctx.name, chain_a, chain_b)?;

    let wallet_a = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let wallet_b = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    suite.wait_for_blocks(1, &[chain_a, chain_b]).await?;

    info!("native transfer from chain A to chain B");
    let transfer = TransferArgs::new(
        &channel_a,
        testvalues::default_transfer_amount(chain_a.denom()),
        &wallet_b.address,
    )
    .with_timeout_height(suite.timeout_height(chain_b).await?);
    let resp = suite.transfer(&ctx.name, chain_a, &wallet_a, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    util::assert_eq(
        "tokens are escrowed",
        &chain_a.native_balance(&wallet_a).await?,
        &(STARTING_TOKEN_AMOUNT - IBC_TRANSFER_AMOUNT),
    )?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    let voucher = IbcToken::received(
        channel_a.counterparty.port_id.as_str(),
        channel_a.counterparty.channel_id.as_str(),
        &IbcToken::native(chain_a.denom()),
    );

    suite
        .assert_packet_relayed(chain_a, &channel_a.port_id, &channel_a.channel_id, 1)
        .await?;
    util::assert_eq(
        "voucher received on chain B",
        &chain_b.balance(&wallet_b.address, &voucher.ibc_denom()).await?,
        &IBC_TRANSFER_AMOUNT,
    )?;
    suite
        .assert_packet_acknowledged(
            chain_b,
            &channel_a.counterparty.port_id,
            &channel_a.counterparty.channel_id,
            1,
        )
        .await?;

    if testvalues::TOKEN_METADATA.is_supported(chain_b.tag()) {
        suite
            .assert_human_readable_denom(chain_b, chain_a.denom(), &channel_a)
            .await?;
    }

    if testvalues::TOTAL_ESCROW.is_supported(chain_a.tag()) {
        // Other tests may hold escrowed tokens of the same denom.
        let escrowed = chain_a.grpc().total_escrow_for_denom(chain_a.denom()).await?;
        util::assert_err(
            format!("total escrow on chain A is {escrowed}, at least {IBC_TRANSFER_AMOUNT} expected"),
            escrowed >= IBC_TRANSFER_AMOUNT,
        )?;
    }

    info!("voucher transfer from chain B back to chain A");
    let channel_b = suite.channel_between(&ctx.name, chain_b, chain_a)?;
    let transfer = TransferArgs::new(
        &channel_b,
        testvalues::default_transfer_amount(voucher.ibc_denom()),
        &wallet_a.address,
    )
    .with_timeout_height(suite.timeout_height(chain_a).await?);
    let resp = suite.transfer(&ctx.name, chain_b, &wallet_b, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    util::assert_eq(
        "voucher is burned on chain B",
        &chain_b.balance(&wallet_b.address, &voucher.ibc_denom()).await?,
        &0,
    )?;

    suite.wait_for_blocks(5, &[chain_a, chain_b]).await?;

    suite
        .assert_packet_relayed(chain_b, &channel_b.port_id, &channel_b.channel_id, 1)
        .await?;
    util::assert_eq(
        "tokens are unescrowed on chain A",
        &chain_a.native_balance(&wallet_a).await?,
        &STARTING_TOKEN_AMOUNT,
    )?;

    Ok(())
}

async fn msg_transfer_fails_invalid_address(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let channel_a = suite.channel_between(&ctx.name, chain_a, chain_b)?;

    let wallet_a = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    suite.wait_for_blocks(1, &[chain_a, chain_b]).await?;

    let transfer = TransferArgs::new(
        &channel_a,
        testvalues::default_transfer_amount(chain_a.denom()),
        testvalues::INVALID_ADDRESS,
    )
    .with_timeout_height(suite.timeout_height(chain_b).await?);
    let resp = suite.transfer(&ctx.name, chain_a, &wallet_a, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    util::assert_eq(
        "tokens are escrowed",
        &chain_a.native_balance(&wallet_a).await?,
        &(STARTING_TOKEN_AMOUNT - IBC_TRANSFER_AMOUNT),
    )?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    suite
        .assert_packet_relayed(chain_a, &channel_a.port_id, &channel_a.channel_id, 1)
        .await?;
    util::assert_eq(
        "tokens are refunded",
        &chain_a.native_balance(&wallet_a).await?,
        &STARTING_TOKEN_AMOUNT,
    )?;

    Ok(())
}

async fn msg_transfer_fails_insufficient_funds(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let channel_a = suite.channel_between(&ctx.name, chain_a, chain_b)?;

    let wallet_a = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let wallet_b = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    suite.wait_for_blocks(1, &[chain_a, chain_b]).await?;

    let transfer = TransferArgs::new(
        &channel_a,
        testvalues::coin(STARTING_TOKEN_AMOUNT * 2, chain_a.denom()),
        &wallet_b.address,
    )
    .with_timeout_height(suite.timeout_height(chain_b).await?);
    let resp = suite.transfer(&ctx.name, chain_a, &wallet_a, &transfer).await?;
    suite.assert_tx_failure(&resp, &tx::ERR_INSUFFICIENT_FUNDS, &[])?;

    util::assert_eq(
        "nothing is escrowed",
        &chain_a.native_balance(&wallet_a).await?,
        &STARTING_TOKEN_AMOUNT,
    )?;

    Ok(())
}

async fn msg_transfer_timeout(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let channel_a = suite.channel_between(&ctx.name, chain_a, chain_b)?;

    let wallet_a = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let wallet_b = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;

    // Times out one nanosecond after it is sent.
    let transfer = TransferArgs::new(
        &channel_a,
        testvalues::default_transfer_amount(chain_a.denom()),
        &wallet_b.address,
    )
    .with_timeout_timestamp(1);
    let resp = suite.transfer(&ctx.name, chain_a, &wallet_a, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    util::assert_eq(
        "tokens are escrowed",
        &chain_a.native_balance(&wallet_a).await?,
        &(STARTING_TOKEN_AMOUNT - IBC_TRANSFER_AMOUNT),
    )?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    util::assert_eq(
        "nothing is received on chain B",
        &chain_b.native_balance(&wallet_b).await?,
        &STARTING_TOKEN_AMOUNT,
    )?;
    util::assert_eq(
        "tokens are refunded on chain A",
        &chain_a.native_balance(&wallet_a).await?,
        &STARTING_TOKEN_AMOUNT,
    )?;

    Ok(())
}

async fn msg_transfer_with_memo(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    if !testvalues::MEMO.is_supported(chain_a.tag()) {
        info!("memos are not supported by chain A ({}), skipping", chain_a.tag());
        return Ok(());
    }

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let channel_a = suite.channel_between(&ctx.name, chain_a, chain_b)?;

    let wallet_a = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let wallet_b = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    suite.wait_for_blocks(1, &[chain_a, chain_b]).await?;

    let transfer = TransferArgs::new(
        &channel_a,
        testvalues::default_transfer_amount(chain_a.denom()),
        &wallet_b.address,
    )
    .with_timeout_height(suite.timeout_height(chain_b).await?)
    .with_memo("memo");
    let resp = suite.transfer(&ctx.name, chain_a, &wallet_a, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    let voucher = IbcToken::received(
        channel_a.counterparty.port_id.as_str(),
        channel_a.counterparty.channel_id.as_str(),
        &IbcToken::native(chain_a.denom()),
    );

    suite
        .assert_packet_relayed(chain_a, &channel_a.port_id, &channel_a.channel_id, 1)
        .await?;
    util::assert_eq(
        "voucher received on chain B",
        &chain_b.balance(&wallet_b.address, &voucher.ibc_denom()).await?,
        &IBC_TRANSFER_AMOUNT,
    )?;

    Ok(())
}

async fn msg_transfer_from_relayer_wallet(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let channel_a = suite.channel_between(&ctx.name, chain_a, chain_b)?;

    let (relayer_a, relayer_b) = suite.relayer_users(&relayer, &ctx.name).await?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    // The relayer signs with the same account, so this may need retries.
    let transfer = TransferArgs::new(
        &channel_a,
        testvalues::default_transfer_amount(chain_a.denom()),
        &relayer_b.address,
    )
    .with_timeout_height(suite.timeout_height(chain_b).await?);
    let resp = suite.transfer(&ctx.name, chain_a, &relayer_a, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    suite.wait_for_blocks(5, &[chain_a, chain_b]).await?;

    let voucher = IbcToken::received(
        channel_a.counterparty.port_id.as_str(),
        channel_a.counterparty.channel_id.as_str(),
        &IbcToken::native(chain_a.denom()),
    );

    suite
        .assert_packet_relayed(chain_a, &channel_a.port_id, &channel_a.channel_id, 1)
        .await?;
    util::assert_eq(
        "voucher received by the relayer on chain B",
        &chain_b.balance(&relayer_b.address, &voucher.ibc_denom()).await?,
        &IBC_TRANSFER_AMOUNT,
    )?;

    Ok(())
}

async fn receive_enabled_param(ctx: TestContext) -> TestResult {
    let suite = &ctx.suite;
    let (chain_a, chain_b) = suite.chain_pair()?;

    if !testvalues::TRANSFER_SELF_PARAMS.is_supported(chain_a.tag()) {
        info!(
            "the transfer module of chain A ({}) does not manage its own params, skipping",
            chain_a.tag()
        );
        return Ok(());
    }

    suite
        .create_paths(&ClientOptions::default(), &ChannelOptions::transfer(), &ctx.name)
        .await?;
    let relayer = suite.relayer_for_test(&ctx.name)?;
    let channel_b = suite.channel_between(&ctx.name, chain_b, chain_a)?;

    let wallet_a = suite.create_user(0, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let wallet_b = suite.create_user(1, &ctx.name, STARTING_TOKEN_AMOUNT).await?;
    let authority = suite.gov_authority(chain_a).await?;
    suite.wait_for_blocks(1, &[chain_a, chain_b]).await?;

    util::assert_err(
        "receives are enabled on chain A",
        chain_a.grpc().transfer_params().await?.receive_enabled,
    )?;

    let voucher = IbcToken::received(
        channel_b.counterparty.port_id.as_str(),
        channel_b.counterparty.channel_id.as_str(),
        &IbcToken::native(chain_b.denom()),
    );

    info!("transfer from chain B is received while enabled");
    let transfer = TransferArgs::new(
        &channel_b,
        testvalues::default_transfer_amount(chain_b.denom()),
        &wallet_a.address,
    )
    .with_timeout_height(suite.timeout_height(chain_a).await?);
    let resp = suite.transfer(&ctx.name, chain_b, &wallet_b, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    suite
        .assert_packet_relayed(chain_b, &channel_b.port_id, &channel_b.channel_id, 1)
        .await?;
    util::assert_eq(
        "voucher received on chain A",
        &chain_a.balance(&wallet_a.address, &voucher.ibc_denom()).await?,
        &IBC_TRANSFER_AMOUNT,
    )?;

    suite.stop_relayer(&relayer).await?;

    info!("disabling receives on chain A");
    suite
        .execute_and_pass_gov_v1_proposal(
            &ctx.name,
            chain_a,
            &wallet_a,
            vec![transfer_params_update(&authority, false, false)],
        )
        .await?;

    util::assert_err(
        "receives are disabled on chain A",
        !chain_a.grpc().transfer_params().await?.receive_enabled,
    )?;

    let transfer = transfer.with_timeout_height(suite.timeout_height(chain_a).await?);
    let resp = suite.transfer(&ctx.name, chain_b, &wallet_b, &transfer).await?;
    suite.assert_tx_success(&resp)?;

    util::assert_eq(
        "second transfer is escrowed",
        &chain_b.native_balance(&wallet_b).await?,
        &(STARTING_TOKEN_AMOUNT - 2 * IBC_TRANSFER_AMOUNT),
    )?;

    suite.start_relayer(&relayer, &ctx.name).await?;

    util::assert_eq(
        "second transfer is refunded by the error acknowledgement",
        &chain_b.native_balance(&wallet_b).await?,
        &(STARTING_TOKEN_AMOUNT - IBC_TRANSFER_AMOUNT),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_params_update() {
        let msg = transfer_params_update("cosmos10d07y265gmmuvt4z0w9aw880jnsr700j6zn9kn", false, true);

        assert_eq!(msg["@type"], "/ibc.applications.transfer.v1.MsgUpdateParams");
        assert_eq!(msg["signer"], "cosmos10d07y265gmmuvt4z0w9aw880jnsr700j6zn9kn");
        assert_eq!(msg["params"], json!({"send_enabled": false, "receive_enabled": true}));
    }
}
