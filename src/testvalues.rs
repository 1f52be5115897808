/*!
   Shared values used across test scenarios, and the releases in which the
   features exercised by the harness shipped.
*/

use crate::semverutil::FeatureReleases;
use std::time::Duration;

/// Tokens every test wallet is funded with.
pub const STARTING_TOKEN_AMOUNT: u128 = 500_000_000_000;

/// The amount sent by a single transfer in a test.
pub const IBC_TRANSFER_AMOUNT: u128 = 10_000;

/// Deposit attached to governance proposals.
pub const DEFAULT_GOV_V1_PROPOSAL_TOKEN_AMOUNT: u128 = 500_000_000;

/// Governance voting period configured in genesis.
pub const VOTING_PERIOD: Duration = Duration::from_secs(30);

/// Maximum deposit period configured in genesis.
pub const MAX_DEPOSIT_PERIOD: Duration = Duration::from_secs(10);

/// Gas limit used for CLI transactions.
pub const DEFAULT_GAS: u64 = 500_000;

/// An address that no bech32 decoder accepts.
pub const INVALID_ADDRESS: &str = "<invalid-address>";

pub const TENDERMINT_CLIENT_ID: &str = "07-tendermint-0";

/// The first proposal id on a fresh chain.
pub const FIRST_PROPOSAL_ID: u64 = 1;

/// Formats a `<amount><denom>` coin string for the default transfer amount.
pub fn default_transfer_amount(denom: impl AsRef<str>) -> String {
    format!("{IBC_TRANSFER_AMOUNT}{}", denom.as_ref())
}

/// Formats a `<amount><denom>` coin string.
pub fn coin(amount: u128, denom: impl AsRef<str>) -> String {
    format!("{amount}{}", denom.as_ref())
}

/// The `genesis` subcommand replaced the top-level genesis commands.
pub const SIMD_NEW_GENESIS_COMMANDS: FeatureReleases = FeatureReleases::new("v8.0.0", &["v7.4.0"]);

/// Genesis uses the gov v1 `params` layout instead of the v1beta1 sub-params.
pub const GOV_GENESIS: FeatureReleases = FeatureReleases::new("v7.0.0", &[]);

/// Transactions are queried by events through the `--query` flag.
pub const TRANSACTION_EVENT_QUERY: FeatureReleases = FeatureReleases::new("v8.0.0", &[]);

/// The transfer module tracks the total amount in escrow per denom.
pub const TOTAL_ESCROW: FeatureReleases = FeatureReleases::new("v8.0.0", &["v7.1.0"]);

/// Transfers carry a memo.
pub const MEMO: FeatureReleases = FeatureReleases::new("v6.0.0", &["v2.5.0", "v3.4.0", "v4.2.0", "v5.1.0"]);

/// Transfers register denom metadata for received vouchers.
pub const TOKEN_METADATA: FeatureReleases = FeatureReleases::new("v8.0.0", &[]);

/// `allowed_clients` accepts the `*` wildcard.
pub const ALLOW_ALL_CLIENTS_WILDCARD: FeatureReleases = FeatureReleases::new("v8.1.0", &["v7.5.0"]);

/// The channel module has genesis params.
pub const CHANNEL_PARAMS: FeatureReleases = FeatureReleases::new("v8.1.0", &[]);

/// Genesis has a `channel_v2_genesis` section.
pub const CHANNELS_V2: FeatureReleases = FeatureReleases::new("v10.0.0", &[]);

/// Genesis has a `client_v2_genesis` section.
pub const CLIENT_V2: FeatureReleases = FeatureReleases::new("v10.0.0", &[]);

/// The chain binary marshals JSON with the standard library encoder.
pub const STDLIB_JSON_MARSHALLING: FeatureReleases = FeatureReleases::new("v8.0.0", &[]);

/// Fee escrow only locks the larger of recv and ack fees.
pub const CAPITAL_EFFICIENT_FEE_ESCROW: FeatureReleases = FeatureReleases::new("v9.0.0", &[]);

/// The localhost client is available.
pub const LOCALHOST_CLIENT: FeatureReleases = FeatureReleases::new("v7.1.0", &[]);

/// Transfer params are updated with `MsgUpdateParams` through governance.
pub const TRANSFER_SELF_PARAMS: FeatureReleases = FeatureReleases::new("v8.0.0", &[]);

/// `register` of the interchain accounts controller CLI takes `--ordering`.
pub const ICA_CHANNEL_ORDERING: FeatureReleases = FeatureReleases::new("v8.1.0", &[]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_strings() {
        assert_eq!(default_transfer_amount("atoma"), "10000atoma");
        assert_eq!(coin(STARTING_TOKEN_AMOUNT, "stake"), "500000000000stake");
    }

    #[test]
    fn test_feature_table() {
        assert!(GOV_GENESIS.is_supported("v7.0.0"));
        assert!(!GOV_GENESIS.is_supported("v6.2.0"));

        assert!(TOTAL_ESCROW.is_supported("v7.1.0"));
        assert!(!TOTAL_ESCROW.is_supported("v7.0.0"));

        assert!(CHANNEL_PARAMS.is_supported("v8.1.0"));
        assert!(!CHANNEL_PARAMS.is_supported("v8.0.0"));

        assert!(!CHANNELS_V2.is_supported("v9.0.0"));
        assert!(CLIENT_V2.is_supported("main"));
    }
}
