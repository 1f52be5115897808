/*!
   Command lines and output parsing for the hermes relayer.

   Every command runs with `--json`, in which mode hermes logs one JSON
   object per line and finishes with a line holding `result` and `status`.
*/

use super::{config::HERMES_CONFIG_PATH, RelayerPath};
use crate::{
    error::RelayerError,
    ibc::{ChannelCounterparty, ChannelOptions, ChannelOutput, ClientOptions},
};
use serde::Deserialize;
use serde_json::Value;

pub const BINARY: &str = "hermes";

/// Where the relayer process id is kept while it runs.
pub const PID_FILE: &str = "/tmp/hermes/hermes.pid";

/// The file holding the mnemonic of the relayer key on `chain_id`.
pub fn mnemonic_file(chain_id: &str) -> String {
    format!("/tmp/hermes/{chain_id}.mnemonic")
}

fn command<'a>(args: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    [BINARY, "--config", HERMES_CONFIG_PATH, "--json"]
        .into_iter()
        .chain(args)
        .map(str::to_owned)
        .collect()
}

pub fn add_key_cmd(chain_id: &str, key_name: &str) -> Vec<String> {
    let file = mnemonic_file(chain_id);

    command([
        "keys",
        "add",
        "--chain",
        chain_id,
        "--mnemonic-file",
        file.as_str(),
        "--key-name",
        key_name,
        "--overwrite",
    ])
}

pub fn create_client_cmd(host_chain: &str, reference_chain: &str, opts: &ClientOptions) -> Vec<String> {
    let mut cmd = command([
        "create",
        "client",
        "--host-chain",
        host_chain,
        "--reference-chain",
        reference_chain,
    ]);
    if let Some(trusting_period) = &opts.trusting_period {
        cmd.extend(["--trusting-period".to_owned(), trusting_period.clone()]);
    }

    cmd
}

pub fn create_connection_cmd(path: &RelayerPath) -> Vec<String> {
    command([
        "create",
        "connection",
        "--a-chain",
        path.chain_a.as_str(),
        "--a-client",
        path.client_a.as_str(),
        "--b-client",
        path.client_b.as_str(),
    ])
}

pub fn create_channel_cmd(path: &RelayerPath, opts: &ChannelOptions) -> Vec<String> {
    command([
        "create",
        "channel",
        "--a-chain",
        path.chain_a.as_str(),
        "--a-connection",
        path.connection_a.as_str(),
        "--a-port",
        opts.source_port.as_str(),
        "--b-port",
        opts.dest_port.as_str(),
        "--order",
        opts.order.as_str(),
        "--channel-version",
        opts.version.as_str(),
    ])
}

pub fn update_client_cmd(host_chain: &str, client_id: &str) -> Vec<String> {
    command(["update", "client", "--host-chain", host_chain, "--client", client_id])
}

pub fn clear_packets_cmd(chain_id: &str, port_id: &str, channel_id: &str) -> Vec<String> {
    command([
        "clear",
        "packets",
        "--chain",
        chain_id,
        "--port",
        port_id,
        "--channel",
        channel_id,
    ])
}

pub fn query_channels_cmd(chain_id: &str, counterparty_chain_id: &str) -> Vec<String> {
    command([
        "query",
        "channels",
        "--chain",
        chain_id,
        "--counterparty-chain",
        counterparty_chain_id,
        "--show-counterparty",
        "--verbose",
    ])
}

/// Starts hermes in the background, logging to the container output.
pub fn start_cmd() -> Vec<String> {
    vec![
        "sh".to_owned(),
        "-c".to_owned(),
        format!(
            "nohup {BINARY} --config {HERMES_CONFIG_PATH} start > /proc/1/fd/1 2> /proc/1/fd/2 & echo $! > {PID_FILE}"
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

/// Returns the `result` of the last output line that carries one.
pub fn extract_json_result(output: &str) -> Result<Value, RelayerError> {
    output
        .lines()
        .rev()
        .filter(|line| line.contains("result"))
        .find_map(|line| {
            serde_json::from_str::<Value>(line.trim())
                .ok()
                .and_then(|mut value| value.get_mut("result").map(Value::take))
        })
        .ok_or(RelayerError::MissingResult)
}

fn string_at(value: &Value, pointer: &str) -> Result<String, RelayerError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(RelayerError::MissingResult)
}

/// The id of the client created by `create client`.
pub fn parse_client_id(output: &str) -> Result<String, RelayerError> {
    string_at(&extract_json_result(output)?, "/CreateClient/client_id")
}

/// The connection ids on both ends created by `create connection`.
pub fn parse_connection_ids(output: &str) -> Result<(String, String), RelayerError> {
    let result = extract_json_result(output)?;

    Ok((
        string_at(&result, "/a_side/connection_id")?,
        string_at(&result, "/b_side/connection_id")?,
    ))
}

#[derive(Debug, Deserialize)]
struct Remote {
    port_id: String,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelEnd {
    state: String,
    ordering: String,
    remote: Remote,
    #[serde(default)]
    connection_hops: Vec<String>,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct ChannelEnds {
    channel_end: ChannelEnd,
    counterparty_channel_end: ChannelEnd,
}

/// Maps hermes' `Open`-style enum names onto the protobuf names rly reports.
fn proto_enum(prefix: &str, name: &str) -> String {
    if name.starts_with(prefix) {
        name.to_owned()
    } else {
        format!("{prefix}{}", name.to_ascii_uppercase())
    }
}

/**
   Parses `query channels --show-counterparty --verbose`.

   The local port and channel are only reported as the remote end of the
   counterparty channel.
*/
pub fn parse_channel_output(output: &str) -> Result<Vec<ChannelOutput>, RelayerError> {
    let ends: Vec<ChannelEnds> = serde_json::from_value(extract_json_result(output)?)?;

    Ok(ends
        .into_iter()
        .map(|ends| ChannelOutput {
            state: proto_enum("STATE_", &ends.channel_end.state),
            ordering: proto_enum("ORDER_", &ends.channel_end.ordering),
            version: ends.channel_end.version,
            port_id: ends.counterparty_channel_end.remote.port_id,
            channel_id: ends.counterparty_channel_end.remote.channel_id.unwrap_or_default(),
            connection_hops: ends.channel_end.connection_hops,
            counterparty: ChannelCounterparty {
                port_id: ends.channel_end.remote.port_id,
                channel_id: ends.channel_end.remote.channel_id.unwrap_or_default(),
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibc::Order;

    const CREATE_CLIENT: &str = r#"{"timestamp":"Jan 01 00:00:00.000","level":"INFO","fields":{"message":"running Hermes v1.13.1"}}
{"timestamp":"Jan 01 00:00:01.000","level":"INFO","fields":{"message":"Creating new clients"}}
{"result":{"CreateClient":{"client_id":"07-tendermint-0","client_type":"Tendermint","consensus_height":{"revision_height":12,"revision_number":1}}},"status":"success"}"#;

    const CREATE_CONNECTION: &str = r#"{"timestamp":"Jan 01 00:00:00.000","level":"INFO","fields":{"message":"running Hermes v1.13.1"}}
{"result":{"a_side":{"client_id":"07-tendermint-0","connection_id":"connection-0"},"b_side":{"client_id":"07-tendermint-1","connection_id":"connection-3"},"delay_period":{"nanos":0,"secs":0}},"status":"success"}"#;

    const QUERY_CHANNELS: &str = r#"{"timestamp":"Jan 01 00:00:00.000","level":"INFO","fields":{"message":"running Hermes v1.13.1"}}
{"result":[{"channel_end":{"connection_hops":["connection-0"],"ordering":"Unordered","remote":{"channel_id":"channel-4","port_id":"transfer"},"state":"Open","version":"ics20-1"},"counterparty_channel_end":{"connection_hops":["connection-3"],"ordering":"Unordered","remote":{"channel_id":"channel-0","port_id":"transfer"},"state":"Open","version":"ics20-1"}}],"status":"success"}"#;

    fn path() -> RelayerPath {
        RelayerPath {
            chain_a: "chainA-1".to_owned(),
            chain_b: "chainB-1".to_owned(),
            client_a: "07-tendermint-0".to_owned(),
            client_b: "07-tendermint-1".to_owned(),
            connection_a: "connection-0".to_owned(),
            connection_b: "connection-3".to_owned(),
        }
    }

    #[test]
    fn test_parse_client_id() {
        assert_eq!(parse_client_id(CREATE_CLIENT).unwrap(), "07-tendermint-0");
    }

    #[test]
    fn test_parse_connection_ids() {
        assert_eq!(
            parse_connection_ids(CREATE_CONNECTION).unwrap(),
            ("connection-0".to_owned(), "connection-3".to_owned())
        );
    }

    #[test]
    fn test_parse_channel_output() {
        let channels = parse_channel_output(QUERY_CHANNELS).unwrap();

        assert_eq!(
            channels,
            vec![ChannelOutput {
                state: "STATE_OPEN".to_owned(),
                ordering: "ORDER_UNORDERED".to_owned(),
                version: "ics20-1".to_owned(),
                port_id: "transfer".to_owned(),
                channel_id: "channel-0".to_owned(),
                connection_hops: vec!["connection-0".to_owned()],
                counterparty: ChannelCounterparty {
                    port_id: "transfer".to_owned(),
                    channel_id: "channel-4".to_owned(),
                },
            }]
        );
    }

    #[test]
    fn test_missing_result() {
        let logs = r#"{"timestamp":"Jan 01 00:00:00.000","level":"ERROR","fields":{"message":"result not ready"}}"#;

        assert!(matches!(extract_json_result(logs), Err(RelayerError::MissingResult)));
        assert!(matches!(extract_json_result(""), Err(RelayerError::MissingResult)));
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(
            create_client_cmd("chainA-1", "chainB-1", &ClientOptions::default()).join(" "),
            "hermes --config /tmp/hermes/config.toml --json create client --host-chain chainA-1 --reference-chain chainB-1"
        );

        let opts = ClientOptions {
            trusting_period: Some("336h".to_owned()),
        };
        assert!(create_client_cmd("chainA-1", "chainB-1", &opts)
            .join(" ")
            .ends_with("--trusting-period 336h"));

        let opts = ChannelOptions {
            order: Order::Ordered,
            ..ChannelOptions::transfer()
        };
        assert_eq!(
            create_channel_cmd(&path(), &opts)[4..].join(" "),
            "create channel --a-chain chainA-1 --a-connection connection-0 --a-port transfer --b-port transfer --order ordered --channel-version ics20-1"
        );

        assert!(add_key_cmd("chainB-1", "relayer-0")
            .join(" ")
            .contains("--mnemonic-file /tmp/hermes/chainB-1.mnemonic --key-name relayer-0"));
    }
}
