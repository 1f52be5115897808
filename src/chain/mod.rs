/*!
   Cosmos SDK chains started in Docker and driven through their CLI.

   A chain is bootstrapped from a [`ChainSpec`] the way a local testnet is
   set up by hand: every node is initialised, validators create gentxs that
   are collected on the first validator, the resulting genesis is adjusted by
   [`genesis::modify_genesis`] and copied to every node, and the nodes are
   started once their configs point at each other.
*/

use crate::{
    error::{ChainError, TxError},
    grpc::{GrpcClient, QueryPathRegistry},
    ibc::{self, Height},
    testvalues,
    tx::{self, TxResponse},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod genesis;
pub mod node;
pub mod spec;

pub use node::ChainNode;
pub use spec::{default_chain_specs, ChainSpec, ChainSpecBuilder, ChainSpecBuilderError};

/// Name of the key that funds test wallets.
pub const FAUCET_KEY: &str = "faucet";

/// How long a chain may take to produce its first block.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound on the time a single block may take.
pub const BLOCK_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Funds of the faucet account in genesis.
const FAUCET_FUNDS: u128 = testvalues::STARTING_TOKEN_AMOUNT * 1_000;

/// A key held in a node's keyring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Wallet {
    pub key_name: String,
    pub address: String,
    pub mnemonic: String,
}

impl From<node::KeyOutput> for Wallet {
    fn from(key: node::KeyOutput) -> Self {
        Self {
            key_name: key.name,
            address: key.address,
            mnemonic: key.mnemonic,
        }
    }
}

/// Reads the latest block height out of a CometBFT `/status` response.
pub fn parse_status_height(status: &Value) -> Result<u64, ChainError> {
    let sync_info = status
        .get("result")
        .unwrap_or(status)
        .get("sync_info")
        .ok_or_else(|| ChainError::MissingField("sync_info".to_owned()))?;

    sync_info
        .get("latest_block_height")
        .and_then(Value::as_str)
        .and_then(|height| height.parse().ok())
        .ok_or_else(|| ChainError::MissingField("latest_block_height".to_owned()))
}

/// A running chain.
pub struct Chain {
    spec: ChainSpec,
    nodes: Vec<ChainNode>,
    validators: Vec<Wallet>,
    faucet: Wallet,
    faucet_lock: Mutex<()>,
    rpc_address: String,
    grpc: GrpcClient,
    http: reqwest::Client,
}

impl Chain {
    /// Starts every node of `spec` on `network` and waits for the first block.
    pub async fn start(spec: ChainSpec, network: &str, cancel: CancellationToken) -> Result<Self, ChainError> {
        info!(
            "starting chain {} ({}) with {} validators and {} full nodes",
            spec.name, spec.chain_id, spec.num_validators, spec.num_full_nodes
        );

        spec.check_topology()?;

        let mut nodes = Vec::with_capacity(spec.num_nodes());
        for i in 0..spec.num_validators {
            nodes.push(ChainNode::create(&spec, network, i, true, cancel.clone()).await?);
        }
        for i in 0..spec.num_full_nodes {
            nodes.push(ChainNode::create(&spec, network, i, false, cancel.clone()).await?);
        }

        for node in &nodes {
            node.init().await?;
        }

        let validators = Self::create_genesis(&spec, &nodes).await?;
        let faucet: Wallet = nodes[0].add_key(FAUCET_KEY).await?.into();
        nodes[0]
            .add_genesis_account(&faucet.address, &testvalues::coin(FAUCET_FUNDS, &spec.denom))
            .await?;
        nodes[0].collect_gentxs().await?;

        let genesis = nodes[0].read_file("config/genesis.json").await?;
        let genesis = genesis::modify_genesis_bytes(&genesis, &spec.denom, &spec.binary, &spec.tag)?;

        let mut node_ids = Vec::with_capacity(nodes.len());
        for node in &nodes {
            node_ids.push((node.node_id().await?, node.name().to_owned()));
        }

        for node in &nodes {
            let peers = node::persistent_peers(
                node_ids.iter().map(|(id, host)| (id.as_str(), host.as_str())),
                node.name(),
            );
            node.write_file("config/genesis.json", &genesis).await?;
            node.configure(&spec, &peers).await?;
        }

        for node in &nodes {
            node.start().await?;
        }

        let rpc_address = nodes[0].host_rpc_address().await?;
        let grpc_address = nodes[0].host_grpc_address().await?;

        let chain = Self {
            spec,
            nodes,
            validators,
            faucet,
            faucet_lock: Mutex::new(()),
            rpc_address,
            grpc: GrpcClient::new(grpc_address, Arc::new(QueryPathRegistry::with_defaults())),
            http: reqwest::Client::new(),
        };

        chain.wait_for_height(1, STARTUP_TIMEOUT).await?;

        info!("chain {} produced its first block", chain.spec.chain_id);

        Ok(chain)
    }

    /// Creates validator keys and gentxs, gathering them on the first validator.
    async fn create_genesis(spec: &ChainSpec, nodes: &[ChainNode]) -> Result<Vec<Wallet>, ChainError> {
        let stake = node::validator_stake(&spec.denom);
        let funds = testvalues::coin(testvalues::STARTING_TOKEN_AMOUNT, &spec.denom);

        let mut validators = Vec::new();
        for node in nodes.iter().filter(|node| node.is_validator()) {
            let wallet: Wallet = node.add_key(node::VALIDATOR_KEY).await?.into();
            node.add_genesis_account(&wallet.address, &funds).await?;
            node.gentx(&stake).await?;

            validators.push(wallet);
        }

        let (first, others) = nodes.split_first().ok_or(ChainError::NoValidators)?;
        for (node, wallet) in others.iter().zip(validators.iter().skip(1)) {
            first.add_genesis_account(&wallet.address, &funds).await?;

            for (i, gentx) in node.gentxs().await?.into_iter().enumerate() {
                first
                    .write_file(&format!("config/gentx/{}-{i}.json", node.name()), &gentx)
                    .await?;
            }
        }

        Ok(validators)
    }

    /// Replaces the query registry used by [`Chain::grpc`].
    pub fn set_query_registry(&mut self, registry: Arc<QueryPathRegistry>) {
        self.grpc = GrpcClient::new(self.grpc.endpoint().to_owned(), registry);
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn chain_id(&self) -> &str {
        &self.spec.chain_id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn denom(&self) -> &str {
        &self.spec.denom
    }

    pub fn tag(&self) -> &str {
        &self.spec.tag
    }

    pub fn nodes(&self) -> &[ChainNode] {
        &self.nodes
    }

    /// Validator wallets, the `i`th held by the `i`th node.
    pub fn validators(&self) -> &[Wallet] {
        &self.validators
    }

    pub fn grpc(&self) -> &GrpcClient {
        &self.grpc
    }

    /// RPC address of the first node reachable from other containers.
    pub fn internal_rpc_address(&self) -> String {
        self.nodes[0].internal_rpc_address()
    }

    pub fn internal_grpc_address(&self) -> String {
        self.nodes[0].internal_grpc_address()
    }

    pub async fn height(&self) -> Result<u64, ChainError> {
        let status: Value = self
            .http
            .get(format!("{}/status", self.rpc_address))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_status_height(&status)
    }

    async fn wait_for_height(&self, target: u64, timeout: Duration) -> Result<u64, ChainError> {
        let wait = async {
            loop {
                match self.height().await {
                    Ok(height) if height >= target => return height,
                    Ok(_) => {}
                    Err(err) => debug!("{} is not ready yet: {err}", self.spec.chain_id),
                }

                time::sleep(POLL_INTERVAL).await;
            }
        };

        time::timeout(timeout, wait)
            .await
            .map_err(|_| ChainError::Timeout(format!("height {target} on {}", self.spec.chain_id)))
    }

    /// Waits until `n` more blocks have been produced.
    pub async fn wait_for_blocks(&self, n: u64) -> Result<u64, ChainError> {
        let target = self.height().await? + n;
        let timeout = BLOCK_TIMEOUT * u32::try_from(n.max(1)).unwrap_or(u32::MAX);

        self.wait_for_height(target, timeout).await
    }

    /// A timeout height far enough ahead to never be reached.
    pub async fn timeout_height(&self) -> Result<Height, ChainError> {
        Ok(ibc::timeout_height(&self.spec.chain_id, self.height().await?))
    }

    /// Creates a key on the first node and funds it from the faucet.
    pub async fn create_wallet(&self, key_name: &str, amount: u128) -> Result<Wallet, ChainError> {
        let wallet: Wallet = self.nodes[0].add_key(key_name).await?.into();

        if amount > 0 {
            self.fund(&wallet.address, amount).await?;
        }

        debug!("created wallet {} ({}) on {}", key_name, wallet.address, self.spec.chain_id);

        Ok(wallet)
    }

    /// Sends `amount` of the native denom from the faucet to `address`.
    pub async fn fund(&self, address: &str, amount: u128) -> Result<(), ChainError> {
        let _faucet = self.faucet_lock.lock().await;
        let coins = testvalues::coin(amount, &self.spec.denom);

        let resp = self
            .exec_tx(
                &self.faucet,
                ["bank", "send", self.faucet.address.as_str(), address, coins.as_str()],
            )
            .await?;
        tx::assert_tx_success(&resp)?;

        Ok(())
    }

    /// Imports a key into the first node's keyring.
    pub async fn recover_key(&self, key_name: &str, mnemonic: &str) -> Result<(), ChainError> {
        self.nodes[0].recover_key(key_name, mnemonic).await
    }

    /// Signs and broadcasts `tx <args>` with a key held by the first node.
    pub async fn exec_tx<I, S>(&self, wallet: &Wallet, args: I) -> Result<TxResponse, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exec_tx_on(0, wallet, args).await
    }

    /**
       Signs and broadcasts `tx <args>` from node `node_idx`.

       CheckTx failures are returned as is. Otherwise the response of the
       delivered transaction is queried after waiting for blocks, so that its
       events and result code are known.
    */
    pub async fn exec_tx_on<I, S>(&self, node_idx: usize, wallet: &Wallet, args: I) -> Result<TxResponse, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = self
            .nodes
            .get(node_idx)
            .ok_or_else(|| ChainError::MissingField(format!("node {node_idx}")))?;

        let mut cmd = vec!["tx".to_owned()];
        cmd.extend(args.into_iter().map(Into::into));
        cmd.extend(
            [
                "--from",
                wallet.key_name.as_str(),
                "--chain-id",
                self.spec.chain_id.as_str(),
                "--keyring-backend",
                node::KEYRING_BACKEND,
                "--gas-prices",
                self.spec.gas_prices().as_str(),
                "--gas",
                testvalues::DEFAULT_GAS.to_string().as_str(),
                "--node",
                local_rpc().as_str(),
                "--output",
                "json",
                "-y",
            ]
            .map(str::to_owned),
        );

        let res = node.exec_bin_unchecked(cmd).await?;
        let resp = match TxResponse::parse(&res.stdout_str()) {
            Ok(resp) => resp,
            Err(err) => {
                res.check()?;
                return Err(err.into());
            }
        };

        if !resp.is_success() {
            return Ok(resp);
        }

        self.wait_for_blocks(tx::BLOCKS_AFTER_BROADCAST).await?;

        self.query_tx(&resp.txhash).await
    }

    /// The delivered response of the transaction with `hash`.
    pub async fn query_tx(&self, hash: &str) -> Result<TxResponse, ChainError> {
        let value = self.query_json(["tx", hash]).await?;

        Ok(serde_json::from_value(value).map_err(TxError::from)?)
    }

    /// Runs `q <args>` on the first node and parses its JSON output.
    pub async fn query_json<I, S>(&self, args: I) -> Result<Value, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = vec!["q".to_owned()];
        cmd.extend(args.into_iter().map(Into::into));
        cmd.extend(["--node".to_owned(), local_rpc(), "--output".to_owned(), "json".to_owned()]);

        let res = self.nodes[0].exec_bin(cmd).await?;

        Ok(serde_json::from_slice(&res.stdout)?)
    }

    /// The balance of `denom` held by `address`.
    pub async fn balance(&self, address: &str, denom: &str) -> Result<u128, ChainError> {
        Ok(self.grpc.balance(address, denom).await?)
    }

    /// The native balance of `wallet`.
    pub async fn native_balance(&self, wallet: &Wallet) -> Result<u128, ChainError> {
        self.balance(&wallet.address, &self.spec.denom).await
    }
}

fn local_rpc() -> String {
    format!("tcp://localhost:{}", node::RPC_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_status_height() {
        let status = json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {"sync_info": {"latest_block_height": "123", "catching_up": false}},
        });
        assert_eq!(parse_status_height(&status).unwrap(), 123);

        let bare = json!({"sync_info": {"latest_block_height": "7"}});
        assert_eq!(parse_status_height(&bare).unwrap(), 7);

        assert!(parse_status_height(&json!({"result": {}})).is_err());
        assert!(parse_status_height(&json!({"sync_info": {"latest_block_height": 5}})).is_err());
    }

    #[test]
    fn test_wallet_from_key_output() {
        let key: node::KeyOutput =
            serde_json::from_str(r#"{"name":"user","type":"local","address":"cosmos1xyz","mnemonic":"a b c"}"#).unwrap();
        let wallet = Wallet::from(key);

        assert_eq!(wallet.key_name, "user");
        assert_eq!(wallet.address, "cosmos1xyz");
        assert_eq!(wallet.mnemonic, "a b c");
    }
}
