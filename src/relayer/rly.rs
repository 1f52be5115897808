//! Command lines and output parsing for the Go relayer, `rly`.

use super::RelayerPath;
use crate::{
    error::RelayerError,
    ibc::{ChannelOptions, ChannelOutput, ClientOptions},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BINARY: &str = "rly";

pub const HOME: &str = "/tmp/rly";

/// Where the relayer process id is kept while it runs.
pub const PID_FILE: &str = "/tmp/rly/rly.pid";

/// The file holding the chain definition passed to `chains add`.
pub fn chain_file(chain_id: &str) -> String {
    format!("{HOME}/{chain_id}.json")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CosmosChainValue {
    pub key: String,
    pub chain_id: String,
    pub rpc_addr: String,
    pub account_prefix: String,
    keyring_backend: String,
    pub gas_adjustment: f64,
    pub gas_prices: String,
    debug: bool,
    timeout: String,
    output_format: String,
    sign_mode: String,
}

/// The `chains add` definition of a cosmos chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainDefinition {
    #[serde(rename = "type")]
    kind: String,
    pub value: CosmosChainValue,
}

impl ChainDefinition {
    pub fn cosmos(
        key: impl Into<String>,
        chain_id: impl Into<String>,
        rpc_addr: impl Into<String>,
        account_prefix: impl Into<String>,
        gas_prices: impl Into<String>,
        gas_adjustment: f64,
    ) -> Self {
        Self {
            kind: "cosmos".to_owned(),
            value: CosmosChainValue {
                key: key.into(),
                chain_id: chain_id.into(),
                rpc_addr: rpc_addr.into(),
                account_prefix: account_prefix.into(),
                keyring_backend: "test".to_owned(),
                gas_adjustment,
                gas_prices: gas_prices.into(),
                debug: true,
                timeout: "10s".to_owned(),
                output_format: "json".to_owned(),
                sign_mode: "direct".to_owned(),
            },
        }
    }
}

fn command<'a>(args: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    std::iter::once(BINARY)
        .chain(args)
        .chain(["--home", HOME])
        .map(str::to_owned)
        .collect()
}

pub fn config_init_cmd() -> Vec<String> {
    command(["config", "init"])
}

pub fn add_chain_cmd(chain_id: &str) -> Vec<String> {
    let file = chain_file(chain_id);

    command(["chains", "add", "--file", file.as_str(), chain_id])
}

pub fn restore_key_cmd(chain_id: &str, key_name: &str, mnemonic: &str) -> Vec<String> {
    command(["keys", "restore", chain_id, key_name, mnemonic])
}

pub fn new_path_cmd(chain_a: &str, chain_b: &str, path_name: &str) -> Vec<String> {
    command(["paths", "new", chain_a, chain_b, path_name])
}

pub fn show_path_cmd(path_name: &str) -> Vec<String> {
    command(["paths", "show", path_name, "--json"])
}

pub fn create_clients_cmd(path_name: &str, opts: &ClientOptions) -> Vec<String> {
    let mut cmd = command(["tx", "clients", path_name]);
    if let Some(trusting_period) = &opts.trusting_period {
        cmd.extend(["--client-tp".to_owned(), trusting_period.clone()]);
    }

    cmd
}

pub fn create_connection_cmd(path_name: &str) -> Vec<String> {
    command(["tx", "connection", path_name])
}

pub fn create_channel_cmd(path_name: &str, opts: &ChannelOptions) -> Vec<String> {
    command([
        "tx",
        "channel",
        path_name,
        "--src-port",
        opts.source_port.as_str(),
        "--dst-port",
        opts.dest_port.as_str(),
        "--order",
        opts.order.as_str(),
        "--version",
        opts.version.as_str(),
    ])
}

pub fn update_clients_cmd(path_name: &str) -> Vec<String> {
    command(["tx", "update-clients", path_name])
}

pub fn flush_cmd(path_name: &str, channel_id: &str) -> Vec<String> {
    command(["tx", "flush", path_name, channel_id])
}

pub fn query_channels_cmd(chain_id: &str) -> Vec<String> {
    command(["q", "channels", chain_id])
}

/// Starts relaying `paths` in the background, logging to the container output.
pub fn start_cmd(paths: &[String]) -> Vec<String> {
    vec![
        "sh".to_owned(),
        "-c".to_owned(),
        format!(
            "nohup {BINARY} start {} --home {HOME} -p events > /proc/1/fd/1 2> /proc/1/fd/2 & echo $! > {PID_FILE}",
            paths.join(" ")
        ),
    ]
}

/// Stops the background relayer if one is running.
pub fn stop_cmd() -> Vec<String> {
    vec![
        "sh".to_owned(),
        "-c".to_owned(),
        format!("if [ -f {PID_FILE} ]; then kill $(cat {PID_FILE}); rm -f {PID_FILE}; fi"),
    ]
}

/// `q channels` prints one JSON channel per line.
pub fn parse_channel_output(output: &str) -> Result<Vec<ChannelOutput>, RelayerError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).map_err(RelayerError::from))
        .collect()
}

#[derive(Debug, Deserialize)]
struct PathEnd {
    #[serde(rename = "chain-id")]
    chain_id: String,
    #[serde(rename = "client-id", default)]
    client_id: String,
    #[serde(rename = "connection-id", default)]
    connection_id: String,
}

/// Reads the client and connection ids of a path from `paths show --json`.
pub fn parse_path(output: &str) -> Result<RelayerPath, RelayerError> {
    let value: Value = serde_json::from_str(output.trim())?;
    let path = value.get("path").unwrap_or(&value);

    let src: PathEnd = serde_json::from_value(path.get("src").cloned().ok_or(RelayerError::MissingResult)?)?;
    let dst: PathEnd = serde_json::from_value(path.get("dst").cloned().ok_or(RelayerError::MissingResult)?)?;

    Ok(RelayerPath {
        chain_a: src.chain_id,
        chain_b: dst.chain_id,
        client_a: src.client_id,
        client_b: dst.client_id,
        connection_a: src.connection_id,
        connection_b: dst.connection_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibc::ChannelCounterparty;

    #[test]
    fn test_chain_definition() {
        let def = ChainDefinition::cosmos(
            "relayer-0",
            "chainA-1",
            "http://net-simapp-a-val-0:26657",
            "cosmos",
            "0.00atoma",
            1.3,
        );
        let value = serde_json::to_value(&def).unwrap();

        assert_eq!(value["type"], "cosmos");
        assert_eq!(value["value"]["chain-id"], "chainA-1");
        assert_eq!(value["value"]["rpc-addr"], "http://net-simapp-a-val-0:26657");
        assert_eq!(value["value"]["keyring-backend"], "test");
        assert_eq!(value["value"]["gas-prices"], "0.00atoma");
        assert_eq!(value["value"]["output-format"], "json");
    }

    #[test]
    fn test_parse_channel_output() {
        let output = r#"
{"state":"STATE_OPEN","ordering":"ORDER_UNORDERED","counterparty":{"port_id":"transfer","channel_id":"channel-0"},"connection_hops":["connection-0"],"version":"ics20-1","port_id":"transfer","channel_id":"channel-0"}
{"state":"STATE_OPEN","ordering":"ORDER_ORDERED","counterparty":{"port_id":"icahost","channel_id":"channel-1"},"connection_hops":["connection-0"],"version":"ics27-1","port_id":"icacontroller-cosmos1xyz","channel_id":"channel-1"}
"#;
        let channels = parse_channel_output(output).unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].port_id, "icacontroller-cosmos1xyz");
        assert_eq!(
            channels[1].counterparty,
            ChannelCounterparty {
                port_id: "icahost".to_owned(),
                channel_id: "channel-1".to_owned(),
            }
        );
        assert!(parse_channel_output("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_path() {
        let output = r#"{"name":"path-0","chains":{"src":"chainA-1","dst":"chainB-1"},"path":{"src":{"chain-id":"chainA-1","client-id":"07-tendermint-0","connection-id":"connection-0"},"dst":{"chain-id":"chainB-1","client-id":"07-tendermint-0","connection-id":"connection-0"}}}"#;
        let path = parse_path(output).unwrap();

        assert_eq!(path.chain_a, "chainA-1");
        assert_eq!(path.chain_b, "chainB-1");
        assert_eq!(path.client_a, "07-tendermint-0");
        assert_eq!(path.connection_b, "connection-0");
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(
            create_channel_cmd("path-0", &ChannelOptions::transfer()).join(" "),
            "rly tx channel path-0 --src-port transfer --dst-port transfer --order unordered --version ics20-1 --home /tmp/rly"
        );
        assert_eq!(
            add_chain_cmd("chainA-1").join(" "),
            "rly chains add --file /tmp/rly/chainA-1.json chainA-1 --home /tmp/rly"
        );
        assert!(start_cmd(&["path-0".to_owned(), "path-1".to_owned()])[2].starts_with("nohup rly start path-0 path-1 "));
    }
}
