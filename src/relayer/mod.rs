/*!
   Relayers running in their own containers.

   Both hermes and rly are driven through their CLIs. A [`Relayer`] knows
   every chain of a suite and holds one funded wallet on each of them. Paths
   are created with [`Relayer::generate_path`] and then linked step by step,
   clients first, or at once with [`Relayer::link_path`].
*/

use crate::{
    chain::{Chain, Wallet},
    config::{RelayerConfig, HERMES_RELAYER_ID, RLY_RELAYER_ID},
    docker::{self, exec, Container, ContainerOptions, ExecResult, ExecTarget},
    error::{ExecError, RelayerError},
    ibc::{ChannelOptions, ChannelOutput, ClientOptions},
    testvalues,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod config;
pub mod hermes;
pub mod rly;
pub mod wallets;

pub use wallets::RelayerWallets;

/// Relayers created when a single test runs.
pub const DEFAULT_POOL_SIZE: usize = 1;

/// Relayers created when a whole suite runs, so that tests get their own.
pub const SUITE_POOL_SIZE: usize = 10;

pub fn pool_size(running_suite: bool) -> usize {
    if running_suite {
        SUITE_POOL_SIZE
    } else {
        DEFAULT_POOL_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayerKind {
    Hermes,
    Rly,
}

impl RelayerKind {
    pub fn from_id(id: &str) -> Result<Self, RelayerError> {
        match id {
            HERMES_RELAYER_ID => Ok(Self::Hermes),
            RLY_RELAYER_ID => Ok(Self::Rly),
            other => Err(RelayerError::UnknownRelayer(other.to_owned())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Hermes => HERMES_RELAYER_ID,
            Self::Rly => RLY_RELAYER_ID,
        }
    }
}

/// The clients and connections of a path between two chains, as far as they exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayerPath {
    pub chain_a: String,
    pub chain_b: String,
    pub client_a: String,
    pub client_b: String,
    pub connection_a: String,
    pub connection_b: String,
}

impl RelayerPath {
    pub fn new(chain_a: impl Into<String>, chain_b: impl Into<String>) -> Self {
        Self {
            chain_a: chain_a.into(),
            chain_b: chain_b.into(),
            ..Default::default()
        }
    }
}

/// A relayer container with a wallet on every chain it serves.
pub struct Relayer {
    kind: RelayerKind,
    container: Container,
    name: String,
    key_name: String,
    wallets: HashMap<String, Wallet>,
    paths: Mutex<HashMap<String, RelayerPath>>,
    cancel: CancellationToken,
}

impl Relayer {
    /**
       Starts the `index`th relayer container of `config` on `network`.

       A wallet is created and funded on each of `chains`, and the relayer is
       configured to sign with it.
    */
    pub async fn start(
        config: &RelayerConfig,
        network: &str,
        index: usize,
        chains: &[Chain],
        cancel: CancellationToken,
    ) -> Result<Self, RelayerError> {
        let kind = RelayerKind::from_id(&config.id)?;
        let name = docker::container_name(network, kind.id(), "relayer", index);
        let key_name = format!("relayer-{index}");

        info!("starting relayer {name} ({}:{})", config.image, config.tag);

        let container = docker::start_container(ContainerOptions {
            image: config.image.clone(),
            tag: config.tag.clone(),
            name: name.clone(),
            network: network.to_owned(),
            ..Default::default()
        })
        .await?;

        let mut wallets = HashMap::with_capacity(chains.len());
        for chain in chains {
            let wallet = chain
                .create_wallet(&key_name, testvalues::STARTING_TOKEN_AMOUNT)
                .await?;
            wallets.insert(chain.chain_id().to_owned(), wallet);
        }

        let relayer = Self {
            kind,
            container,
            name,
            key_name,
            wallets,
            paths: Mutex::new(HashMap::new()),
            cancel,
        };

        match kind {
            RelayerKind::Hermes => relayer.configure_hermes(chains).await?,
            RelayerKind::Rly => relayer.configure_rly(chains).await?,
        }

        Ok(relayer)
    }

    async fn configure_hermes(&self, chains: &[Chain]) -> Result<(), RelayerError> {
        let hermes_chains = chains
            .iter()
            .map(|chain| {
                let spec = chain.spec();

                config::HermesChain::new(
                    spec.chain_id.as_str(),
                    chain.internal_rpc_address(),
                    chain.internal_grpc_address(),
                    spec.bech32_prefix.as_str(),
                    self.key_name.as_str(),
                    spec.denom.as_str(),
                    spec.gas_adjustment,
                )
            })
            .collect();
        let config = config::HermesConfig::new(hermes_chains).to_toml()?;
        self.write_file(config::HERMES_CONFIG_PATH, config.as_bytes())
            .await?;

        for (chain_id, wallet) in &self.wallets {
            self.write_file(&hermes::mnemonic_file(chain_id), wallet.mnemonic.as_bytes())
                .await?;
            self.exec(hermes::add_key_cmd(chain_id, &self.key_name))
                .await?;
        }

        Ok(())
    }

    async fn configure_rly(&self, chains: &[Chain]) -> Result<(), RelayerError> {
        self.exec(rly::config_init_cmd()).await?;

        for chain in chains {
            let spec = chain.spec();
            let definition = rly::ChainDefinition::cosmos(
                self.key_name.as_str(),
                spec.chain_id.as_str(),
                chain.internal_rpc_address(),
                spec.bech32_prefix.as_str(),
                spec.gas_prices(),
                spec.gas_adjustment,
            );

            self.write_file(&rly::chain_file(&spec.chain_id), &serde_json::to_vec(&definition)?)
                .await?;
            self.exec(rly::add_chain_cmd(&spec.chain_id)).await?;
        }

        for (chain_id, wallet) in &self.wallets {
            self.exec(rly::restore_key_cmd(chain_id, &self.key_name, &wallet.mnemonic))
                .await?;
        }

        Ok(())
    }

    pub fn kind(&self) -> RelayerKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The wallet the relayer signs with on `chain_id`.
    pub fn wallet(&self, chain_id: &str) -> Option<&Wallet> {
        self.wallets.get(chain_id)
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    /// The path named `path_name`, with the ids known so far.
    pub fn path(&self, path_name: &str) -> Result<RelayerPath, RelayerError> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path_name)
            .cloned()
            .ok_or_else(|| RelayerError::UnknownPath(path_name.to_owned()))
    }

    fn set_path(&self, path_name: &str, path: RelayerPath) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path_name.to_owned(), path);
    }

    /// Runs a command in the relayer container, failing on a non-zero exit code.
    async fn exec(&self, cmd: Vec<String>) -> Result<ExecResult, RelayerError> {
        Ok(exec(&self.container, cmd, &self.cancel).await?.check()?)
    }

    /// Runs a command and returns everything it printed.
    async fn exec_output(&self, cmd: Vec<String>) -> Result<String, RelayerError> {
        let res = self.exec(cmd).await?;

        Ok(format!("{}\n{}", res.stdout_str(), res.stderr_str()))
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), RelayerError> {
        Ok(docker::write_file(&self.container, path, contents, &self.cancel).await?)
    }

    async fn read_file(&self, path: &str) -> Result<String, RelayerError> {
        let res = self.exec(vec!["cat".to_owned(), path.to_owned()]).await?;

        Ok(String::from_utf8(res.stdout).map_err(ExecError::from)?)
    }

    /// Registers a path between two chains.
    pub async fn generate_path(&self, chain_a: &str, chain_b: &str, path_name: &str) -> Result<(), RelayerError> {
        debug!("{}: generating path {path_name} between {chain_a} and {chain_b}", self.name);

        if self.kind == RelayerKind::Rly {
            self.exec(rly::new_path_cmd(chain_a, chain_b, path_name))
                .await?;
        }

        self.set_path(path_name, RelayerPath::new(chain_a, chain_b));

        Ok(())
    }

    async fn refresh_rly_path(&self, path_name: &str) -> Result<RelayerPath, RelayerError> {
        let path = rly::parse_path(&self.exec(rly::show_path_cmd(path_name)).await?.stdout_str())?;
        self.set_path(path_name, path.clone());

        Ok(path)
    }

    /// Creates a light client of each chain of the path on the other one.
    pub async fn create_clients(&self, path_name: &str, opts: &ClientOptions) -> Result<RelayerPath, RelayerError> {
        let mut path = self.path(path_name)?;

        match self.kind {
            RelayerKind::Hermes => {
                let output = self
                    .exec_output(hermes::create_client_cmd(&path.chain_a, &path.chain_b, opts))
                    .await?;
                path.client_a = hermes::parse_client_id(&output)?;

                let output = self
                    .exec_output(hermes::create_client_cmd(&path.chain_b, &path.chain_a, opts))
                    .await?;
                path.client_b = hermes::parse_client_id(&output)?;

                self.set_path(path_name, path.clone());
            }
            RelayerKind::Rly => {
                self.exec(rly::create_clients_cmd(path_name, opts)).await?;
                path = self.refresh_rly_path(path_name).await?;
            }
        }

        info!(
            "{}: created clients {} on {} and {} on {}",
            self.name, path.client_a, path.chain_a, path.client_b, path.chain_b
        );

        Ok(path)
    }

    /// Opens a connection on top of the path's clients.
    pub async fn create_connections(&self, path_name: &str) -> Result<RelayerPath, RelayerError> {
        let mut path = self.path(path_name)?;

        match self.kind {
            RelayerKind::Hermes => {
                let output = self
                    .exec_output(hermes::create_connection_cmd(&path))
                    .await?;
                (path.connection_a, path.connection_b) = hermes::parse_connection_ids(&output)?;

                self.set_path(path_name, path.clone());
            }
            RelayerKind::Rly => {
                self.exec(rly::create_connection_cmd(path_name)).await?;
                path = self.refresh_rly_path(path_name).await?;
            }
        }

        info!(
            "{}: created connections {} on {} and {} on {}",
            self.name, path.connection_a, path.chain_a, path.connection_b, path.chain_b
        );

        Ok(path)
    }

    /// Opens a channel on the path's connection.
    pub async fn create_channel(&self, path_name: &str, opts: &ChannelOptions) -> Result<(), RelayerError> {
        let path = self.path(path_name)?;

        info!(
            "{}: creating {} channel {}/{} on {path_name}",
            self.name,
            opts.order.as_str(),
            opts.source_port,
            opts.dest_port
        );

        let cmd = match self.kind {
            RelayerKind::Hermes => hermes::create_channel_cmd(&path, opts),
            RelayerKind::Rly => rly::create_channel_cmd(path_name, opts),
        };
        self.exec(cmd).await?;

        Ok(())
    }

    /// Clients, connection and a channel for a generated path.
    pub async fn link_path(
        &self,
        path_name: &str,
        client_opts: &ClientOptions,
        channel_opts: &ChannelOptions,
    ) -> Result<RelayerPath, RelayerError> {
        self.create_clients(path_name, client_opts).await?;
        let path = self.create_connections(path_name).await?;
        self.create_channel(path_name, channel_opts).await?;

        Ok(path)
    }

    /// Updates the clients on both ends of the path.
    pub async fn update_clients(&self, path_name: &str) -> Result<(), RelayerError> {
        let path = self.path(path_name)?;

        match self.kind {
            RelayerKind::Hermes => {
                self.exec(hermes::update_client_cmd(&path.chain_a, &path.client_a))
                    .await?;
                self.exec(hermes::update_client_cmd(&path.chain_b, &path.client_b))
                    .await?;
            }
            RelayerKind::Rly => {
                self.exec(rly::update_clients_cmd(path_name)).await?;
            }
        }

        Ok(())
    }

    /// Starts relaying in the background. Hermes relays every configured chain.
    pub async fn start_relaying(&self, path_names: &[String]) -> Result<(), RelayerError> {
        info!("{}: starting to relay {}", self.name, itertools::join(path_names, ", "));

        let cmd = match self.kind {
            RelayerKind::Hermes => hermes::start_cmd(),
            RelayerKind::Rly => rly::start_cmd(path_names),
        };
        self.exec(cmd).await?;

        Ok(())
    }

    pub async fn stop_relaying(&self) -> Result<(), RelayerError> {
        info!("{}: stopping", self.name);

        let cmd = match self.kind {
            RelayerKind::Hermes => hermes::stop_cmd(),
            RelayerKind::Rly => rly::stop_cmd(),
        };
        self.exec(cmd).await?;

        Ok(())
    }

    /// Relays every pending packet of `channel_id` on the first chain of the path.
    pub async fn flush(&self, path_name: &str, channel_id: &str) -> Result<(), RelayerError> {
        let path = self.path(path_name)?;

        match self.kind {
            RelayerKind::Hermes => {
                let channels = self.query_channels(&path.chain_a, &path.chain_b).await?;
                let channel = channels
                    .iter()
                    .find(|channel| channel.channel_id == channel_id)
                    .ok_or_else(|| RelayerError::NoChannels(path.chain_a.clone()))?;

                self.exec(hermes::clear_packets_cmd(&path.chain_a, &channel.port_id, channel_id))
                    .await?;
            }
            RelayerKind::Rly => {
                self.exec(rly::flush_cmd(path_name, channel_id)).await?;
            }
        }

        Ok(())
    }

    /// The channels of `chain_id`. Hermes only reports those towards `counterparty_chain_id`.
    pub async fn query_channels(
        &self,
        chain_id: &str,
        counterparty_chain_id: &str,
    ) -> Result<Vec<ChannelOutput>, RelayerError> {
        match self.kind {
            RelayerKind::Hermes => {
                let output = self
                    .exec_output(hermes::query_channels_cmd(chain_id, counterparty_chain_id))
                    .await?;

                hermes::parse_channel_output(&output)
            }
            RelayerKind::Rly => {
                let res = self.exec(rly::query_channels_cmd(chain_id)).await?;

                rly::parse_channel_output(&res.stdout_str())
            }
        }
    }

    /**
       Restricts the packets relayed on `chain_id` to `channels` and
       interchain accounts channels. Only hermes supports packet filters,
       for rly this does nothing.
    */
    pub async fn apply_packet_filter(&self, chain_id: &str, channels: &[ChannelOutput]) -> Result<(), RelayerError> {
        match self.kind {
            RelayerKind::Hermes => {
                let current = self.read_file(config::HERMES_CONFIG_PATH).await?;
                let filtered = config::apply_packet_filter(&current, chain_id, channels)?;

                self.write_file(config::HERMES_CONFIG_PATH, filtered.as_bytes())
                    .await
            }
            RelayerKind::Rly => {
                warn!("{}: packet filters are not supported by rly, relaying every channel", self.name);

                Ok(())
            }
        }
    }
}

#[async_trait]
impl ExecTarget for Relayer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exec_raw(&self, cmd: Vec<String>) -> Result<ExecResult, ExecError> {
        self.container.exec_raw(cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relayer_kind_from_id() {
        assert_eq!(RelayerKind::from_id("hermes").unwrap(), RelayerKind::Hermes);
        assert_eq!(RelayerKind::from_id("rly").unwrap(), RelayerKind::Rly);
        assert!(matches!(
            RelayerKind::from_id("go-relayer"),
            Err(RelayerError::UnknownRelayer(id)) if id == "go-relayer"
        ));
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(false), 1);
        assert_eq!(pool_size(true), 10);
    }
}
