use crate::{error::RelayerError, ibc::ChannelOutput};
use serde::Serialize;
use toml::{Table, Value};

/// Ports and channels every packet filter lets through besides the test's own.
pub const ALWAYS_ALLOWED: (&str, &str) = ("ica*", "*");

/// Where hermes reads its config inside the relayer container.
pub const HERMES_CONFIG_PATH: &str = "/tmp/hermes/config.toml";

#[derive(Debug, Clone, Serialize)]
struct Global {
    log_level: String,
}

#[derive(Debug, Clone, Serialize)]
struct Toggle {
    enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Clients {
    enabled: bool,
    refresh: bool,
    misbehaviour: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Packets {
    enabled: bool,
    clear_interval: u64,
    clear_on_start: bool,
    tx_confirmation: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Mode {
    clients: Clients,
    connections: Toggle,
    channels: Toggle,
    packets: Packets,
}

#[derive(Debug, Clone, Serialize)]
struct Service {
    enabled: bool,
    host: String,
    port: u16,
}

#[derive(Debug, Clone, Serialize)]
struct EventSource {
    mode: String,
    url: String,
    batch_delay: String,
}

#[derive(Debug, Clone, Serialize)]
struct GasPrice {
    price: f64,
    denom: String,
}

/// One `[[chains]]` entry of a hermes config.
#[derive(Debug, Clone, Serialize)]
pub struct HermesChain {
    pub id: String,
    #[serde(rename = "type")]
    kind: String,
    pub rpc_addr: String,
    pub grpc_addr: String,
    event_source: EventSource,
    rpc_timeout: String,
    trusted_node: bool,
    pub account_prefix: String,
    pub key_name: String,
    key_store_type: String,
    store_prefix: String,
    default_gas: u64,
    max_gas: u64,
    gas_price: GasPrice,
    gas_multiplier: f64,
    max_msg_num: u32,
    max_tx_size: u64,
    clock_drift: String,
    max_block_time: String,
}

impl HermesChain {
    /**
       A chain reachable at `rpc_addr` and `grpc_addr` from the relayer
       container, signing with `key_name` and paying fees in `denom`.
    */
    pub fn new(
        id: impl Into<String>,
        rpc_addr: impl Into<String>,
        grpc_addr: impl Into<String>,
        account_prefix: impl Into<String>,
        key_name: impl Into<String>,
        denom: impl Into<String>,
        gas_multiplier: f64,
    ) -> Self {
        let rpc_addr = rpc_addr.into();
        let websocket = format!("{}/websocket", rpc_addr.replacen("http", "ws", 1));

        Self {
            id: id.into(),
            kind: "CosmosSdk".to_owned(),
            rpc_addr,
            grpc_addr: grpc_addr.into(),
            event_source: EventSource {
                mode: "push".to_owned(),
                url: websocket,
                batch_delay: "500ms".to_owned(),
            },
            rpc_timeout: "10s".to_owned(),
            trusted_node: false,
            account_prefix: account_prefix.into(),
            key_name: key_name.into(),
            key_store_type: "Test".to_owned(),
            store_prefix: "ibc".to_owned(),
            default_gas: 100_000,
            max_gas: 400_000,
            gas_price: GasPrice {
                price: 0.0,
                denom: denom.into(),
            },
            gas_multiplier,
            max_msg_num: 30,
            max_tx_size: 180_000,
            clock_drift: "5s".to_owned(),
            max_block_time: "30s".to_owned(),
        }
    }
}

/// A complete hermes config.
#[derive(Debug, Clone, Serialize)]
pub struct HermesConfig {
    global: Global,
    mode: Mode,
    rest: Service,
    telemetry: Service,
    pub chains: Vec<HermesChain>,
}

impl HermesConfig {
    pub fn new(chains: Vec<HermesChain>) -> Self {
        Self {
            global: Global {
                log_level: "info".to_owned(),
            },
            mode: Mode {
                clients: Clients {
                    enabled: true,
                    refresh: true,
                    misbehaviour: false,
                },
                connections: Toggle { enabled: true },
                channels: Toggle { enabled: true },
                packets: Packets {
                    enabled: true,
                    clear_interval: 100,
                    clear_on_start: true,
                    tx_confirmation: false,
                },
            },
            rest: Service {
                enabled: false,
                host: "127.0.0.1".to_owned(),
                port: 3000,
            },
            telemetry: Service {
                enabled: false,
                host: "127.0.0.1".to_owned(),
                port: 3001,
            },
            chains,
        }
    }

    pub fn to_toml(&self) -> Result<String, RelayerError> {
        Ok(toml::to_string(self)?)
    }
}

/**
   Rewrites a hermes config so that `chain_id` relays exactly `channels`,
   plus every interchain accounts channel.

   Any previous filter of the chain is replaced. Other chains are untouched.
*/
pub fn apply_packet_filter(config: &str, chain_id: &str, channels: &[ChannelOutput]) -> Result<String, RelayerError> {
    let mut config: Table = toml::from_str(config)?;

    let chain = config
        .get_mut("chains")
        .and_then(Value::as_array_mut)
        .and_then(|chains| {
            chains
                .iter_mut()
                .filter_map(Value::as_table_mut)
                .find(|chain| chain.get("id").and_then(Value::as_str) == Some(chain_id))
        })
        .ok_or_else(|| RelayerError::UnknownChain(chain_id.to_owned()))?;

    let list = channels
        .iter()
        .map(|channel| (channel.port_id.as_str(), channel.channel_id.as_str()))
        .chain([ALWAYS_ALLOWED])
        .map(|(port, channel)| Value::Array(vec![port.into(), channel.into()]))
        .collect();

    let mut filter = Table::new();
    filter.insert("policy".to_owned(), "allow".into());
    filter.insert("list".to_owned(), Value::Array(list));
    chain.insert("packet_filter".to_owned(), Value::Table(filter));

    Ok(toml::to_string(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> String {
        HermesConfig::new(vec![
            HermesChain::new(
                "chainA-1",
                "http://net-simapp-a-val-0:26657",
                "http://net-simapp-a-val-0:9090",
                "cosmos",
                "relayer-0",
                "atoma",
                1.3,
            ),
            HermesChain::new(
                "chainB-1",
                "http://net-simapp-b-val-0:26657",
                "http://net-simapp-b-val-0:9090",
                "cosmos",
                "relayer-0",
                "atomb",
                1.3,
            ),
        ])
        .to_toml()
        .unwrap()
    }

    fn channel(port_id: &str, channel_id: &str) -> ChannelOutput {
        ChannelOutput {
            port_id: port_id.to_owned(),
            channel_id: channel_id.to_owned(),
            ..Default::default()
        }
    }

    fn chain<'a>(config: &'a Table, id: &str) -> &'a Table {
        config["chains"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_table)
            .find(|chain| chain["id"].as_str() == Some(id))
            .unwrap()
    }

    #[test]
    fn test_hermes_config() {
        let config: Table = toml::from_str(&config()).unwrap();

        assert_eq!(config["mode"]["packets"]["clear_on_start"].as_bool(), Some(true));

        let chain_a = chain(&config, "chainA-1");
        assert_eq!(chain_a["type"].as_str(), Some("CosmosSdk"));
        assert_eq!(
            chain_a["event_source"]["url"].as_str(),
            Some("ws://net-simapp-a-val-0:26657/websocket")
        );
        assert_eq!(chain_a["gas_price"]["denom"].as_str(), Some("atoma"));
        assert!(chain_a.get("packet_filter").is_none());
    }

    #[test]
    fn test_apply_packet_filter() {
        let filtered = apply_packet_filter(
            &config(),
            "chainB-1",
            &[channel("transfer", "channel-3"), channel("transfer", "channel-4")],
        )
        .unwrap();
        let config: Table = toml::from_str(&filtered).unwrap();

        let filter = &chain(&config, "chainB-1")["packet_filter"];
        assert_eq!(filter["policy"].as_str(), Some("allow"));
        assert_eq!(
            filter["list"],
            Value::Array(vec![
                Value::Array(vec!["transfer".into(), "channel-3".into()]),
                Value::Array(vec!["transfer".into(), "channel-4".into()]),
                Value::Array(vec!["ica*".into(), "*".into()]),
            ])
        );
        assert!(chain(&config, "chainA-1").get("packet_filter").is_none());
    }

    #[test]
    fn test_packet_filter_is_replaced() {
        let once = apply_packet_filter(&config(), "chainA-1", &[channel("transfer", "channel-0")]).unwrap();
        let twice = apply_packet_filter(&once, "chainA-1", &[]).unwrap();
        let config: Table = toml::from_str(&twice).unwrap();

        assert_eq!(
            chain(&config, "chainA-1")["packet_filter"]["list"],
            Value::Array(vec![Value::Array(vec!["ica*".into(), "*".into()])])
        );
    }

    #[test]
    fn test_packet_filter_unknown_chain() {
        let res = apply_packet_filter(&config(), "chainZ-1", &[]);

        assert!(matches!(res, Err(RelayerError::UnknownChain(id)) if id == "chainZ-1"));
    }
}
