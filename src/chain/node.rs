use super::ChainSpec;
use crate::{
    docker::{self, exec, Container, ContainerOptions, ExecResult, ExecTarget},
    error::{ChainError, ExecError},
    testvalues,
};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use toml::{Table, Value as TomlValue};
use tracing::debug;

pub const RPC_PORT: u16 = 26657;
pub const GRPC_PORT: u16 = 9090;
pub const P2P_PORT: u16 = 26656;
pub const API_PORT: u16 = 1317;

/// Parent of every node home directory inside a container.
pub const HOME_ROOT: &str = "/tmp/cosmos-chain";

/// The home directory of a node of the chain named `chain_name`. Each node has its own container.
pub fn node_home(chain_name: &str) -> String {
    format!("{HOME_ROOT}/{chain_name}")
}

/// Keyring backend used for every key.
pub const KEYRING_BACKEND: &str = "test";

/// The key each validator signs its gentx with.
pub const VALIDATOR_KEY: &str = "validator";

/// Stake delegated by each genesis validator.
pub const VALIDATOR_STAKE: u128 = 5_000_000_000;

/// Output of `keys add --output json`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyOutput {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub mnemonic: String,
}

/// One validator or full node of a chain, running in its own container.
pub struct ChainNode {
    container: Container,
    name: String,
    chain_name: String,
    chain_id: String,
    binary: String,
    tag: String,
    home: String,
    validator: bool,
    index: usize,
    cancel: CancellationToken,
}

impl ChainNode {
    /// Starts the container of a node. Nothing runs in it until [`ChainNode::start`].
    pub async fn create(
        spec: &ChainSpec,
        network: &str,
        index: usize,
        validator: bool,
        cancel: CancellationToken,
    ) -> Result<Self, ChainError> {
        let role = if validator { "val" } else { "fn" };
        let name = docker::container_name(network, &spec.name, role, index);

        let container = docker::start_container(ContainerOptions {
            image: spec.image.clone(),
            tag: spec.tag.clone(),
            name: name.clone(),
            network: network.to_owned(),
            exposed_ports: vec![RPC_PORT, GRPC_PORT, P2P_PORT, API_PORT],
            env: Vec::new(),
        })
        .await?;

        Ok(Self {
            container,
            name,
            chain_name: spec.name.clone(),
            chain_id: spec.chain_id.clone(),
            binary: spec.binary.clone(),
            tag: spec.tag.clone(),
            home: node_home(&spec.name),
            validator,
            index,
            cancel,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn is_validator(&self) -> bool {
        self.validator
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The node's RPC address as seen from the host.
    pub async fn host_rpc_address(&self) -> Result<String, ChainError> {
        Ok(format!("http://{}", docker::host_address(&self.container, RPC_PORT).await?))
    }

    /// The node's gRPC address as seen from the host.
    pub async fn host_grpc_address(&self) -> Result<String, ChainError> {
        Ok(format!("http://{}", docker::host_address(&self.container, GRPC_PORT).await?))
    }

    /// The node's RPC address as seen from other containers on the network.
    pub fn internal_rpc_address(&self) -> String {
        format!("http://{}:{RPC_PORT}", self.name)
    }

    pub fn internal_grpc_address(&self) -> String {
        format!("http://{}:{GRPC_PORT}", self.name)
    }

    /// Runs a command in the node's container, failing on a non-zero exit code.
    pub async fn exec(&self, cmd: Vec<String>) -> Result<ExecResult, ChainError> {
        Ok(exec(&self.container, cmd, &self.cancel).await?.check()?)
    }

    /// Runs the chain binary with `args`, always against this node's home.
    pub async fn exec_bin<I, S>(&self, args: I) -> Result<ExecResult, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = vec![self.binary.clone()];
        cmd.extend(args.into_iter().map(Into::into));
        cmd.extend(["--home".to_owned(), self.home.clone()]);

        self.exec(cmd).await
    }

    /// Like [`ChainNode::exec_bin`] but returns the output even for a non-zero exit code.
    pub async fn exec_bin_unchecked(&self, args: Vec<String>) -> Result<ExecResult, ChainError> {
        let mut cmd = vec![self.binary.clone()];
        cmd.extend(args);
        cmd.extend(["--home".to_owned(), self.home.clone()]);

        Ok(exec(&self.container, cmd, &self.cancel).await?)
    }

    /// `genesis <cmd>` on releases with the new genesis commands, `<cmd>` before.
    fn genesis_cmd(&self, cmd: &str) -> Vec<String> {
        genesis_subcommand(&self.tag, cmd)
    }

    pub async fn read_file(&self, relative: &str) -> Result<Vec<u8>, ChainError> {
        let path = format!("{}/{relative}", self.home);

        Ok(self.exec(vec!["cat".to_owned(), path]).await?.stdout)
    }

    /// Writes `contents` to a path relative to the node home.
    pub async fn write_file(&self, relative: &str, contents: &[u8]) -> Result<(), ChainError> {
        let path = format!("{}/{relative}", self.home);

        Ok(docker::write_file(&self.container, &path, contents, &self.cancel).await?)
    }

    pub async fn init(&self) -> Result<(), ChainError> {
        self.exec_bin(["init", self.name.as_str(), "--chain-id", self.chain_id.as_str()])
            .await?;

        Ok(())
    }

    /// Creates a new key in the node's keyring.
    pub async fn add_key(&self, key_name: &str) -> Result<KeyOutput, ChainError> {
        let res = self
            .exec_bin([
                "keys",
                "add",
                key_name,
                "--keyring-backend",
                KEYRING_BACKEND,
                "--output",
                "json",
            ])
            .await?;

        parse_key_output(&res)
    }

    /// Imports a key from its mnemonic.
    pub async fn recover_key(&self, key_name: &str, mnemonic: &str) -> Result<(), ChainError> {
        self.exec(vec![
            "sh".to_owned(),
            "-c".to_owned(),
            format!(
                "echo \"{mnemonic}\" | {} keys add {key_name} --recover --keyring-backend {KEYRING_BACKEND} --home {}",
                self.binary, self.home
            ),
        ])
        .await?;

        Ok(())
    }

    pub async fn add_genesis_account(&self, address: &str, coins: &str) -> Result<(), ChainError> {
        let mut args = self.genesis_cmd("add-genesis-account");
        args.extend([address.to_owned(), coins.to_owned()]);
        self.exec_bin(args).await?;

        Ok(())
    }

    pub async fn gentx(&self, stake: &str) -> Result<(), ChainError> {
        let mut args = self.genesis_cmd("gentx");
        args.extend([
            VALIDATOR_KEY.to_owned(),
            stake.to_owned(),
            "--chain-id".to_owned(),
            self.chain_id.clone(),
            "--keyring-backend".to_owned(),
            KEYRING_BACKEND.to_owned(),
        ]);
        self.exec_bin(args).await?;

        Ok(())
    }

    /// The contents of every gentx in the node's home.
    pub async fn gentxs(&self) -> Result<Vec<Vec<u8>>, ChainError> {
        let res = self
            .exec(vec![
                "sh".to_owned(),
                "-c".to_owned(),
                format!("ls {}/config/gentx", self.home),
            ])
            .await?;

        let mut gentxs = Vec::new();
        for file in res.stdout_str().split_whitespace() {
            gentxs.push(self.read_file(&format!("config/gentx/{file}")).await?);
        }

        Ok(gentxs)
    }

    pub async fn collect_gentxs(&self) -> Result<(), ChainError> {
        self.exec_bin(self.genesis_cmd("collect-gentxs")).await?;

        Ok(())
    }

    pub async fn node_id(&self) -> Result<String, ChainError> {
        let res = self.exec_bin(["tendermint", "show-node-id"]).await?;

        Ok(res.stdout_str().trim().to_owned())
    }

    /// Patches `config.toml` and `app.toml` for a local test network.
    pub async fn configure(&self, spec: &ChainSpec, peers: &str) -> Result<(), ChainError> {
        let config = String::from_utf8(self.read_file("config/config.toml").await?).map_err(ExecError::from)?;
        let config = patch_config_toml(&config, &spec.log_level, peers)?;
        self.write_file("config/config.toml", config.as_bytes()).await?;

        let app = String::from_utf8(self.read_file("config/app.toml").await?).map_err(ExecError::from)?;
        let app = patch_app_toml(&app, &spec.gas_prices())?;
        self.write_file("config/app.toml", app.as_bytes()).await?;

        Ok(())
    }

    /**
       Starts the node in the background.

       Output goes to the container's own stdout and stderr so that it shows
       up in the container logs.
    */
    pub async fn start(&self) -> Result<(), ChainError> {
        debug!("starting node {}", self.name);

        self.exec(vec![
            "sh".to_owned(),
            "-c".to_owned(),
            format!(
                "nohup {} start --home {} > /proc/1/fd/1 2> /proc/1/fd/2 &",
                self.binary, self.home
            ),
        ])
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ExecTarget for ChainNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exec_raw(&self, cmd: Vec<String>) -> Result<ExecResult, ExecError> {
        self.container.exec_raw(cmd).await
    }
}

/// The arguments of a genesis subcommand for a chain at `tag`.
pub fn genesis_subcommand(tag: &str, cmd: &str) -> Vec<String> {
    if testvalues::SIMD_NEW_GENESIS_COMMANDS.is_supported(tag) {
        vec!["genesis".to_owned(), cmd.to_owned()]
    } else {
        vec![cmd.to_owned()]
    }
}

/// Parses `keys add` output. Older releases print the JSON on stderr.
pub fn parse_key_output(res: &ExecResult) -> Result<KeyOutput, ChainError> {
    let stdout = res.stdout_str();
    let output = if stdout.trim().is_empty() {
        res.stderr_str()
    } else {
        stdout
    };

    let json = output
        .lines()
        .find(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| ChainError::MissingField("key output".to_owned()))?;

    Ok(serde_json::from_str(json)?)
}

fn table_mut<'a>(table: &'a mut Table, key: &str) -> Result<&'a mut Table, ChainError> {
    if !table.get(key).is_some_and(TomlValue::is_table) {
        table.insert(key.to_owned(), TomlValue::Table(Table::new()));
    }

    table
        .get_mut(key)
        .and_then(TomlValue::as_table_mut)
        .ok_or_else(|| ChainError::MissingField(key.to_owned()))
}

/// Sets the CometBFT options of a test node.
pub fn patch_config_toml(contents: &str, log_level: &str, peers: &str) -> Result<String, ChainError> {
    let mut config: Table = toml::from_str(contents)?;

    config.insert("log_level".to_owned(), log_level.into());

    let rpc = table_mut(&mut config, "rpc")?;
    rpc.insert("laddr".to_owned(), format!("tcp://0.0.0.0:{RPC_PORT}").into());
    rpc.insert("cors_allowed_origins".to_owned(), TomlValue::Array(vec!["*".into()]));

    let p2p = table_mut(&mut config, "p2p")?;
    p2p.insert("persistent_peers".to_owned(), peers.into());
    p2p.insert("addr_book_strict".to_owned(), false.into());
    p2p.insert("allow_duplicate_ip".to_owned(), true.into());

    let consensus = table_mut(&mut config, "consensus")?;
    consensus.insert("timeout_commit".to_owned(), "1s".into());
    consensus.insert("timeout_propose".to_owned(), "1s".into());

    Ok(toml::to_string(&config)?)
}

/// Sets the app options of a test node.
pub fn patch_app_toml(contents: &str, gas_prices: &str) -> Result<String, ChainError> {
    let mut app: Table = toml::from_str(contents)?;

    app.insert("minimum-gas-prices".to_owned(), gas_prices.into());

    let grpc = table_mut(&mut app, "grpc")?;
    grpc.insert("enable".to_owned(), true.into());
    grpc.insert("address".to_owned(), format!("0.0.0.0:{GRPC_PORT}").into());

    let api = table_mut(&mut app, "api")?;
    api.insert("enable".to_owned(), true.into());
    api.insert("address".to_owned(), format!("tcp://0.0.0.0:{API_PORT}").into());

    Ok(toml::to_string(&app)?)
}

/// The persistent peers of the node in container `own_host`, given every node's `(node id, container name)`.
pub fn persistent_peers<'a>(nodes: impl IntoIterator<Item = (&'a str, &'a str)>, own_host: &str) -> String {
    itertools::join(
        nodes
            .into_iter()
            .filter(|(_, host)| *host != own_host)
            .map(|(id, host)| format!("{id}@{host}:{P2P_PORT}")),
        ",",
    )
}

/// The stake each genesis validator self-delegates.
pub fn validator_stake(denom: &str) -> String {
    testvalues::coin(VALIDATOR_STAKE, denom)
}
