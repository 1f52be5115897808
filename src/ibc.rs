/*!
   Identifiers and helpers shared by IBC scenarios: chain id revisions,
   heights, voucher denoms and channels.
*/

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display};

pub const TRANSFER_PORT_ID: &str = "transfer";
pub const TRANSFER_VERSION: &str = "ics20-1";
pub const ICA_HOST_PORT_ID: &str = "icahost";
pub const ICA_CONTROLLER_PORT_PREFIX: &str = "icacontroller-";

const CHANNEL_PREFIX: &str = "channel-";

/// Blocks added to the current height for timeouts that must never be reached.
pub const TIMEOUT_HEIGHT_OFFSET: u64 = 1000;

/**
   Returns the revision number of a chain id in the `{chainID}-{revision}`
   format, or 0 if the chain id is not in that format.
*/
pub fn parse_chain_id(chain_id: &str) -> u64 {
    let Some((prefix, revision)) = chain_id.rsplit_once('-') else {
        return 0;
    };

    let prefix_ok = prefix
        .chars()
        .last()
        .is_some_and(|c| c != '-' && c != '\n');
    let revision_ok = revision.chars().all(|c| c.is_ascii_digit()) && !revision.starts_with('0');

    if !prefix_ok || !revision_ok {
        return 0;
    }

    revision.parse().unwrap_or(0)
}

/// An IBC height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Height {
    pub revision_number: u64,
    pub revision_height: u64,
}

impl Height {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }
}

impl Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

/// A height far enough above `current_height` on `chain_id` that it is never reached.
pub fn timeout_height(chain_id: &str, current_height: u64) -> Height {
    Height::new(parse_chain_id(chain_id), current_height + TIMEOUT_HEIGHT_OFFSET)
}

/// Derives the voucher denom for `trace_path/base_denom` (`ibc/<SHA256 HEX>`).
pub fn ibc_denom(full_path: &str) -> String {
    let hash = Sha256::digest(full_path.as_bytes());
    let hex = hash.iter().map(|b| format!("{b:02X}")).collect::<String>();

    format!("ibc/{hex}")
}

/**
   A token received over one or more channels.

   `trace` holds the `port/channel` hops, most recent first.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbcToken {
    pub base: String,
    pub trace: Vec<(String, String)>,
}

impl IbcToken {
    /// The token `denom` takes after crossing `port_id/channel_id`.
    pub fn received(port_id: impl Into<String>, channel_id: impl Into<String>, denom: &IbcToken) -> Self {
        let mut trace = vec![(port_id.into(), channel_id.into())];
        trace.extend(denom.trace.iter().cloned());

        Self {
            base: denom.base.clone(),
            trace,
        }
    }

    pub fn native(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            trace: Vec::new(),
        }
    }

    /**
       Parses a full denom path such as `transfer/channel-0/atoma`. Leading
       segments are consumed in `port/channel` pairs while the second segment
       looks like a channel id.
    */
    pub fn from_path(path: &str) -> Self {
        let segments = path.split('/').collect::<Vec<_>>();

        let mut trace = Vec::new();
        let mut idx = 0;
        while idx + 2 < segments.len() && channel_sequence(segments[idx + 1]).is_some() {
            trace.push((segments[idx].to_owned(), segments[idx + 1].to_owned()));
            idx += 2;
        }

        Self {
            base: segments[idx..].join("/"),
            trace,
        }
    }

    pub fn is_native(&self) -> bool {
        self.trace.is_empty()
    }

    /// The `port/channel/.../base` path.
    pub fn path(&self) -> String {
        self.trace
            .iter()
            .map(|(port, channel)| format!("{port}/{channel}/"))
            .chain(std::iter::once(self.base.clone()))
            .collect()
    }

    /// The `port/channel/...` trace without the base denom.
    pub fn trace_path(&self) -> String {
        self.trace
            .iter()
            .map(|(port, channel)| format!("{port}/{channel}"))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The on-chain denom: the base denom for native tokens, `ibc/<hash>` otherwise.
    pub fn ibc_denom(&self) -> String {
        if self.is_native() {
            self.base.clone()
        } else {
            ibc_denom(&self.path())
        }
    }
}

/// Returns `N` for a channel id of the form `channel-N`.
pub fn channel_sequence(channel_id: &str) -> Option<u64> {
    channel_id.strip_prefix(CHANNEL_PREFIX)?.parse().ok()
}

/// The port and channel on the far end of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounterparty {
    pub port_id: String,
    pub channel_id: String,
}

/// A channel as reported by a relayer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub state: String,
    pub ordering: String,
    pub version: String,
    pub port_id: String,
    pub channel_id: String,
    pub connection_hops: Vec<String>,
    pub counterparty: ChannelCounterparty,
}

/// The channel with the highest `channel-N` sequence.
pub fn latest_channel(channels: &[ChannelOutput]) -> Option<&ChannelOutput> {
    channels
        .iter()
        .max_by_key(|channel| channel_sequence(&channel.channel_id).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Unordered,
    Ordered,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unordered => "unordered",
            Self::Ordered => "ordered",
        }
    }
}

/// Options for opening a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub source_port: String,
    pub dest_port: String,
    pub order: Order,
    pub version: String,
}

impl ChannelOptions {
    /// An unordered ICS-20 channel between transfer ports.
    pub fn transfer() -> Self {
        Self {
            source_port: TRANSFER_PORT_ID.to_owned(),
            dest_port: TRANSFER_PORT_ID.to_owned(),
            order: Order::Unordered,
            version: TRANSFER_VERSION.to_owned(),
        }
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::transfer()
    }
}

/// Options for creating light clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Trusting period such as `336h`. The relayer default is used when unset.
    pub trusting_period: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("chainA-1"), 1);
        assert_eq!(parse_chain_id("cosmoshub-4"), 4);
        assert_eq!(parse_chain_id("evmos_9000-12"), 12);
        assert_eq!(parse_chain_id("chainA"), 0);
        assert_eq!(parse_chain_id("chainA-0"), 0);
        assert_eq!(parse_chain_id("chainA-01"), 0);
        assert_eq!(parse_chain_id("chainA--1"), 0);
        assert_eq!(parse_chain_id("-1"), 0);
        assert_eq!(parse_chain_id("chainA-"), 0);
    }

    #[test]
    fn test_timeout_height() {
        let height = timeout_height("chainB-2", 57);

        assert_eq!(height, Height::new(2, 1057));
        assert_eq!(height.to_string(), "2-1057");
    }

    #[test]
    fn test_ibc_denom() {
        // Well known voucher denom of uatom over channel-0.
        assert_eq!(
            ibc_denom("transfer/channel-0/uatom"),
            "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2"
        );
    }

    #[test]
    fn test_token_paths() {
        let native = IbcToken::native("atoma");
        assert_eq!(native.ibc_denom(), "atoma");

        let once = IbcToken::received("transfer", "channel-0", &native);
        assert_eq!(once.path(), "transfer/channel-0/atoma");
        assert_eq!(once.trace_path(), "transfer/channel-0");

        let twice = IbcToken::received("transfer", "channel-3", &once);
        assert_eq!(twice.path(), "transfer/channel-3/transfer/channel-0/atoma");
        assert_eq!(IbcToken::from_path(&twice.path()), twice);
        assert!(twice.ibc_denom().starts_with("ibc/"));
    }

    #[test]
    fn test_from_path_keeps_slashed_base() {
        let token = IbcToken::from_path("transfer/channel-1/factory/owner/token");

        assert_eq!(token.base, "factory/owner/token");
        assert_eq!(token.trace, vec![("transfer".to_owned(), "channel-1".to_owned())]);
    }

    #[test]
    fn test_latest_channel() {
        let channel = |id: &str| ChannelOutput {
            channel_id: id.to_owned(),
            ..Default::default()
        };
        let channels = vec![channel("channel-2"), channel("channel-10"), channel("channel-9")];

        assert_eq!(latest_channel(&channels).unwrap().channel_id, "channel-10");
        assert!(latest_channel(&[]).is_none());
    }
}
