/*!
   Shared state of an E2E run: the chains, a pool of relayers handed out one
   per test, and the paths and channels each test created.

   Chains are started once by [`E2ETestSuite::setup_chains`] and reused by
   every test. Tests isolate themselves by creating their own paths and
   channels, which are recorded under the test's name.
*/

use crate::{
    chain::{self, Chain, Wallet},
    config::{self, ProcessEnv, TestConfig},
    diagnostics::{self, DiagnosticSource},
    docker,
    error::{Error, RelayerError},
    grpc::{register_known_queries, QueryPathRegistry},
    ibc::{self, ChannelOptions, ChannelOutput, ClientOptions, Height, IbcToken},
    relayer::{self, Relayer, RelayerPath, RelayerWallets},
    testvalues,
    tx::{self, AbciError, TxResponse},
    util,
};
use ibc_proto::cosmos::gov::v1::ProposalStatus;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Prefix of the names of relayer keys recovered into chain keyrings.
pub const RELAYER_KEY_PREFIX: &str = "rly";

/// Blocks every chain must produce after a relayer starts, before it is used.
pub const BLOCKS_AFTER_RELAYER_START: u64 = 10;

/// How often a proposal's status is checked while waiting for it to pass.
pub const PROPOSAL_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// The error returned when querying the commitment of a relayed packet.
pub const PACKET_COMMITMENT_NOT_FOUND: &str = "packet commitment hash not found";

/// The name of the `idx`th path created by a suite.
pub fn path_name(idx: usize) -> String {
    format!("path-{idx}")
}

/// Test names as they may appear in key names.
fn key_safe(name: &str) -> String {
    name.replace(['/', ' ', '_'], "-")
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An ICS-20 transfer to send with [`E2ETestSuite::transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferArgs {
    pub port_id: String,
    pub channel_id: String,
    /// Coins such as `10000atoma`.
    pub amount: String,
    pub receiver: String,
    /// Absolute timeout height. A relative timestamp is used when unset.
    pub timeout_height: Option<Height>,
    /// Timeout timestamp in nanoseconds, relative unless a height is set.
    pub timeout_timestamp: u64,
    pub memo: String,
}

impl TransferArgs {
    pub fn new(channel: &ChannelOutput, amount: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            port_id: channel.port_id.clone(),
            channel_id: channel.channel_id.clone(),
            amount: amount.into(),
            receiver: receiver.into(),
            timeout_height: None,
            timeout_timestamp: 0,
            memo: String::new(),
        }
    }

    pub fn with_timeout_height(mut self, height: Height) -> Self {
        self.timeout_height = Some(height);
        self
    }

    pub fn with_timeout_timestamp(mut self, nanos: u64) -> Self {
        self.timeout_timestamp = nanos;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// The arguments of `tx ibc-transfer transfer`.
    pub fn to_args(&self) -> Vec<String> {
        let height = self.timeout_height.unwrap_or_default();

        let mut args = vec![
            "ibc-transfer".to_owned(),
            "transfer".to_owned(),
            self.port_id.clone(),
            self.channel_id.clone(),
            self.receiver.clone(),
            self.amount.clone(),
            "--packet-timeout-height".to_owned(),
            height.to_string(),
            "--packet-timeout-timestamp".to_owned(),
            self.timeout_timestamp.to_string(),
        ];
        if self.timeout_height.is_some() {
            args.push("--absolute-timeouts".to_owned());
        }
        if !self.memo.is_empty() {
            args.extend(["--memo".to_owned(), self.memo.clone()]);
        }

        args
    }
}

/// A v1 governance proposal executing `messages`, as read by `tx gov submit-proposal`.
pub fn gov_v1_proposal(messages: Vec<Value>, deposit: &str, proposal_id: u64) -> Value {
    json!({
        "messages": messages,
        "metadata": "",
        "deposit": deposit,
        "title": format!("e2e gov proposal: {proposal_id}"),
        "summary": format!("executing gov proposal {proposal_id}"),
    })
}

/// Chains, relayers and per-test bookkeeping of a run.
pub struct E2ETestSuite {
    config: TestConfig,
    network: String,
    chains: Vec<Chain>,
    relayer_pool: Mutex<Vec<Arc<Relayer>>>,
    test_relayers: Mutex<HashMap<String, Arc<Relayer>>>,
    relayer_wallets: Mutex<RelayerWallets>,
    /// Held while creating a channel and reading it back, so that tests do not see each other's channels.
    channel_lock: tokio::sync::Mutex<()>,
    channels: Mutex<HashMap<(String, String, String), ChannelOutput>>,
    paths_by_test: Mutex<HashMap<String, Vec<String>>>,
    paths_by_chains: Mutex<HashMap<(String, String), String>>,
    path_index: AtomicUsize,
    proposal_ids: Mutex<HashMap<String, u64>>,
    cancel: CancellationToken,
}

impl E2ETestSuite {
    /**
       Starts `chain_count` chains on a fresh network and a pool of relayers
       serving all of them.

       The query registry of each chain is filled from its reflection
       service, falling back to the conventional paths of known queries.
    */
    pub async fn setup_chains(config: TestConfig, chain_count: usize) -> Result<Self, Error> {
        info!("setting up {chain_count} chains");

        if config.debug_config.keep_containers {
            docker::keep_containers();
        }

        let cancel = CancellationToken::new();
        let network = docker::random_network_name();
        let specs = chain::default_chain_specs(&config, chain_count)?;

        let mut chains = Vec::with_capacity(chain_count);
        for spec in specs {
            let mut chain = Chain::start(spec, &network, cancel.clone()).await?;
            chain.set_query_registry(Arc::new(Self::query_registry(&chain).await?));

            chains.push(chain);
        }

        let relayer_config = config
            .active_relayer_config()
            .cloned()
            .ok_or_else(|| RelayerError::UnknownRelayer(config.active_relayer.clone()))?;
        let pool_size = relayer::pool_size(config::is_running_suite(&ProcessEnv));

        let mut relayer_pool = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            relayer_pool.push(Arc::new(
                Relayer::start(&relayer_config, &network, i, &chains, cancel.clone()).await?,
            ));
        }

        let proposal_ids = chains
            .iter()
            .map(|chain| (chain.chain_id().to_owned(), testvalues::FIRST_PROPOSAL_ID))
            .collect();

        Ok(Self {
            config,
            network,
            chains,
            relayer_pool: Mutex::new(relayer_pool),
            test_relayers: Mutex::new(HashMap::new()),
            relayer_wallets: Mutex::new(RelayerWallets::default()),
            channel_lock: tokio::sync::Mutex::new(()),
            channels: Mutex::new(HashMap::new()),
            paths_by_test: Mutex::new(HashMap::new()),
            paths_by_chains: Mutex::new(HashMap::new()),
            path_index: AtomicUsize::new(0),
            proposal_ids: Mutex::new(proposal_ids),
            cancel,
        })
    }

    async fn query_registry(chain: &Chain) -> Result<QueryPathRegistry, Error> {
        let mut registry = QueryPathRegistry::with_defaults();

        match registry.populate_from_reflection(chain.grpc().endpoint()).await {
            Ok(n) => info!("registered {n} query paths of {} from reflection", chain.chain_id()),
            Err(err) => {
                warn!(
                    "reflection is unavailable on {}, using known query paths: {err}",
                    chain.chain_id()
                );
                register_known_queries(&mut registry)?;
            }
        }

        Ok(registry)
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain(&self, idx: usize) -> Result<&Chain, Error> {
        self.chains
            .get(idx)
            .ok_or_else(|| Error::UnrecognizedChain(util::chain_label(idx).to_string()))
    }

    /// Chains A and B.
    pub fn chain_pair(&self) -> Result<(&Chain, &Chain), Error> {
        Ok((self.chain(0)?, self.chain(1)?))
    }

    /// Cancels every command still running in the suite's containers.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /**
       The relayer of `test_name`, taken from the pool on first use and
       cached for the rest of the test.
    */
    pub fn relayer_for_test(&self, test_name: &str) -> Result<Arc<Relayer>, Error> {
        let mut test_relayers = lock(&self.test_relayers);
        if let Some(relayer) = test_relayers.get(test_name) {
            return Ok(relayer.clone());
        }

        let mut pool = lock(&self.relayer_pool);
        if pool.is_empty() {
            return Err(RelayerError::EmptyPool.into());
        }
        let relayer = pool.remove(0);

        info!("assigned relayer {} to {test_name}", relayer.name());
        test_relayers.insert(test_name.to_owned(), relayer.clone());

        Ok(relayer)
    }

    /// The relayer already assigned to `test_name`, if any.
    pub fn assigned_relayer(&self, test_name: &str) -> Option<Arc<Relayer>> {
        lock(&self.test_relayers).get(test_name).cloned()
    }

    /// A path name no other test of the suite uses.
    pub fn generate_path_name(&self) -> String {
        path_name(self.path_index.fetch_add(1, Ordering::SeqCst))
    }

    /// Creates a path with a channel between each chain and the next one.
    pub async fn create_paths(
        &self,
        client_opts: &ClientOptions,
        channel_opts: &ChannelOptions,
        test_name: &str,
    ) -> Result<(), Error> {
        info!("setting up paths for {test_name}");

        let relayer = self.relayer_for_test(test_name)?;
        for i in 0..self.chains.len().saturating_sub(1) {
            self.create_path(&relayer, i, i + 1, client_opts, channel_opts, test_name)
                .await?;
        }

        Ok(())
    }

    /// Creates clients, a connection and a channel between two chains.
    pub async fn create_path(
        &self,
        relayer: &Relayer,
        a_idx: usize,
        b_idx: usize,
        client_opts: &ClientOptions,
        channel_opts: &ChannelOptions,
        test_name: &str,
    ) -> Result<(ChannelOutput, ChannelOutput), Error> {
        let chain_a = self.chain(a_idx)?;
        let chain_b = self.chain(b_idx)?;

        let (path_name, _) = self
            .create_clients(relayer, a_idx, b_idx, client_opts, test_name)
            .await?;

        relayer.create_connections(&path_name).await?;
        self.wait_for_blocks(1, &[chain_a, chain_b]).await?;

        let channels = self
            .create_channel_with_lock(relayer, &path_name, test_name, channel_opts, chain_a, chain_b)
            .await?;

        let mut paths_by_chains = lock(&self.paths_by_chains);
        paths_by_chains.insert(
            (chain_a.chain_id().to_owned(), chain_b.chain_id().to_owned()),
            path_name.clone(),
        );
        paths_by_chains.insert((chain_b.chain_id().to_owned(), chain_a.chain_id().to_owned()), path_name);

        Ok(channels)
    }

    /**
       Generates a path between two chains for `test_name` and creates a
       light client of each chain on the other.
    */
    pub async fn create_clients(
        &self,
        relayer: &Relayer,
        a_idx: usize,
        b_idx: usize,
        client_opts: &ClientOptions,
        test_name: &str,
    ) -> Result<(String, RelayerPath), Error> {
        let chain_a = self.chain(a_idx)?;
        let chain_b = self.chain(b_idx)?;
        let path_name = self.generate_path_name();

        lock(&self.paths_by_test)
            .entry(test_name.to_owned())
            .or_default()
            .push(path_name.clone());

        info!(
            "establishing path {path_name} between {} and {}",
            chain_a.chain_id(),
            chain_b.chain_id()
        );

        relayer
            .generate_path(chain_a.chain_id(), chain_b.chain_id(), &path_name)
            .await?;

        let path = relayer.create_clients(&path_name, client_opts).await?;
        self.wait_for_blocks(1, &[chain_a, chain_b]).await?;

        Ok((path_name, path))
    }

    async fn create_channel_with_lock(
        &self,
        relayer: &Relayer,
        path_name: &str,
        test_name: &str,
        channel_opts: &ChannelOptions,
        chain_a: &Chain,
        chain_b: &Chain,
    ) -> Result<(ChannelOutput, ChannelOutput), Error> {
        let _guard = self.channel_lock.lock().await;

        relayer.create_channel(path_name, channel_opts).await?;
        self.wait_for_blocks(1, &[chain_a, chain_b]).await?;

        let channel_a = self.latest_channel(relayer, chain_a, chain_b).await?;
        self.map_channel(test_name, chain_a, chain_b, channel_a.clone());

        let channel_b = self.latest_channel(relayer, chain_b, chain_a).await?;
        self.map_channel(test_name, chain_b, chain_a, channel_b.clone());

        relayer
            .apply_packet_filter(chain_b.chain_id(), &[channel_a.clone(), channel_b.clone()])
            .await?;

        Ok((channel_a, channel_b))
    }

    async fn latest_channel(&self, relayer: &Relayer, chain: &Chain, counterparty: &Chain) -> Result<ChannelOutput, Error> {
        let channels = relayer
            .query_channels(chain.chain_id(), counterparty.chain_id())
            .await?;

        ibc::latest_channel(&channels)
            .cloned()
            .ok_or_else(|| RelayerError::NoChannels(chain.chain_id().to_owned()).into())
    }

    fn map_channel(&self, test_name: &str, from: &Chain, to: &Chain, channel: ChannelOutput) {
        lock(&self.channels).insert(
            (test_name.to_owned(), from.chain_id().to_owned(), to.chain_id().to_owned()),
            channel,
        );
    }

    /// The channel `test_name` created on `chain_a` towards `chain_b`.
    pub fn channel_between(&self, test_name: &str, chain_a: &Chain, chain_b: &Chain) -> Result<ChannelOutput, Error> {
        lock(&self.channels)
            .get(&(test_name.to_owned(), chain_a.chain_id().to_owned(), chain_b.chain_id().to_owned()))
            .cloned()
            .ok_or_else(|| Error::ChannelLookup(chain_a.chain_id().to_owned(), chain_b.chain_id().to_owned()))
    }

    pub fn paths(&self, test_name: &str) -> Result<Vec<String>, Error> {
        lock(&self.paths_by_test)
            .get(test_name)
            .cloned()
            .ok_or_else(|| Error::NoRelayer(test_name.to_owned()))
    }

    /// The latest path created between two chains, in either direction.
    pub fn path_between(&self, chain_a: &Chain, chain_b: &Chain) -> Result<String, Error> {
        lock(&self.paths_by_chains)
            .get(&(chain_a.chain_id().to_owned(), chain_b.chain_id().to_owned()))
            .cloned()
            .ok_or_else(|| Error::ChannelLookup(chain_a.chain_id().to_owned(), chain_b.chain_id().to_owned()))
    }

    /// The clients and connections of the first path `test_name` created.
    pub fn relayer_path(&self, relayer: &Relayer, test_name: &str) -> Result<RelayerPath, Error> {
        let path_name = self
            .paths(test_name)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoRelayer(test_name.to_owned()))?;

        Ok(relayer.path(&path_name)?)
    }

    pub async fn update_clients(&self, relayer: &Relayer, path_name: &str) -> Result<(), Error> {
        Ok(relayer.update_clients(path_name).await?)
    }

    /**
       Imports the relayer's wallets on chains A and B into those chains'
       keyrings, so that tests can sign with them.

       Transactions signed by these wallets are retried on sequence
       mismatches, see [`E2ETestSuite::broadcast`].
    */
    pub async fn relayer_users(&self, relayer: &Relayer, test_name: &str) -> Result<(Wallet, Wallet), Error> {
        let (chain_a, chain_b) = self.chain_pair()?;

        let mut users = Vec::with_capacity(2);
        for (idx, chain) in [chain_a, chain_b].into_iter().enumerate() {
            let wallet = relayer
                .wallet(chain.chain_id())
                .ok_or_else(|| RelayerError::UnknownChain(chain.chain_id().to_owned()))?;
            let key_name = format!("{RELAYER_KEY_PREFIX}{}-{}", util::chain_label(idx), key_safe(test_name));

            chain.recover_key(&key_name, &wallet.mnemonic).await?;

            users.push(Wallet {
                key_name,
                ..wallet.clone()
            });
        }

        lock(&self.relayer_wallets).add_relayer(test_name, users.iter().cloned());

        let user_b = users.pop().ok_or_else(|| Error::NoRelayer(test_name.to_owned()))?;
        let user_a = users.pop().ok_or_else(|| Error::NoRelayer(test_name.to_owned()))?;

        Ok((user_a, user_b))
    }

    /// Starts relaying every path of `test_name` and lets the chains make progress.
    pub async fn start_relayer(&self, relayer: &Relayer, test_name: &str) -> Result<(), Error> {
        relayer.start_relaying(&self.paths(test_name)?).await?;

        let chains = self.chains.iter().collect::<Vec<_>>();
        self.wait_for_blocks(BLOCKS_AFTER_RELAYER_START, &chains).await
    }

    pub async fn stop_relayer(&self, relayer: &Relayer) -> Result<(), Error> {
        Ok(relayer.stop_relaying().await?)
    }

    /// Flushes packets along `chains` in order, then acknowledgements back.
    pub async fn flush_packets(&self, relayer: &Relayer, test_name: &str, chains: &[&Chain]) -> Result<(), Error> {
        let hops = chains
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .chain(chains.windows(2).rev().map(|pair| (pair[1], pair[0])));

        for (from, to) in hops {
            info!("flushing packets between {} and {}", from.chain_id(), to.chain_id());

            let path_name = self.path_between(from, to)?;
            let channel = self.channel_between(test_name, from, to)?;
            relayer.flush(&path_name, &channel.channel_id).await?;

            self.wait_for_blocks(1, &[from, to]).await?;
        }

        Ok(())
    }

    /// Waits until each of `chains` has produced `n` more blocks.
    pub async fn wait_for_blocks(&self, n: u64, chains: &[&Chain]) -> Result<(), Error> {
        for chain in chains {
            chain.wait_for_blocks(n).await?;
        }

        Ok(())
    }

    /// Creates a wallet on the chain at `chain_idx` holding `amount` of the native denom.
    pub async fn create_user(&self, chain_idx: usize, test_name: &str, amount: u128) -> Result<Wallet, Error> {
        let chain = self.chain(chain_idx)?;
        let suffix = docker::rand_lower_case_letters(6);
        let key_name = format!("{}-{suffix}", key_safe(test_name));

        let wallet = chain.create_wallet(&key_name, amount).await?;
        chain.wait_for_blocks(tx::BLOCKS_AFTER_BROADCAST).await?;

        Ok(wallet)
    }

    /**
       Broadcasts `tx <args>` on `chain` signed by `wallet`.

       Relayer wallets of `test_name` are retried on sequence mismatches, as
       the relayer may be signing with the same account.
    */
    pub async fn broadcast(
        &self,
        test_name: &str,
        chain: &Chain,
        wallet: &Wallet,
        args: Vec<String>,
    ) -> Result<TxResponse, Error> {
        let signer_is_relayer = lock(&self.relayer_wallets).contains_relayer(test_name, &wallet.address);

        let resp = tx::broadcast_with_retry(signer_is_relayer, || chain.exec_tx(wallet, args.clone())).await?;

        Ok(resp)
    }

    pub async fn transfer(
        &self,
        test_name: &str,
        chain: &Chain,
        wallet: &Wallet,
        transfer: &TransferArgs,
    ) -> Result<TxResponse, Error> {
        self.broadcast(test_name, chain, wallet, transfer.to_args()).await
    }

    pub fn assert_tx_success(&self, resp: &TxResponse) -> Result<(), Error> {
        Ok(tx::assert_tx_success(resp)?)
    }

    /// Codes are only compared when chains A and B run the same release.
    pub fn assert_tx_failure(&self, resp: &TxResponse, expected: &AbciError, alternatives: &[AbciError]) -> Result<(), Error> {
        let compare_codes = self.config.chain_tag(0) == self.config.chain_tag(1);

        Ok(tx::assert_tx_failure(resp, expected, alternatives, compare_codes)?)
    }

    /// A timeout height 1000 blocks above the current height of `chain`.
    pub async fn timeout_height(&self, chain: &Chain) -> Result<Height, Error> {
        Ok(chain.timeout_height().await?)
    }

    /// The packet commitment is gone from the sending chain once the packet is acknowledged or timed out.
    pub async fn assert_packet_relayed(
        &self,
        chain: &Chain,
        port_id: &str,
        channel_id: &str,
        sequence: u64,
    ) -> Result<(), Error> {
        let res = chain.grpc().packet_commitment(port_id, channel_id, sequence).await;

        match res {
            Err(err) => util::assert_err(
                format!("expected `{PACKET_COMMITMENT_NOT_FOUND}`, got: {err}"),
                err.to_string().contains(PACKET_COMMITMENT_NOT_FOUND),
            ),
            Ok(commitment) => Err(Error::Assertion(format!(
                "packet {sequence} on {port_id}/{channel_id} is still committed: {commitment:?}"
            ))),
        }
    }

    pub async fn assert_packet_acknowledged(
        &self,
        chain: &Chain,
        port_id: &str,
        channel_id: &str,
        sequence: u64,
    ) -> Result<(), Error> {
        let ack = chain
            .grpc()
            .packet_acknowledgement(port_id, channel_id, sequence)
            .await?;

        util::assert_err(
            format!("acknowledgement of packet {sequence} on {port_id}/{channel_id} is empty"),
            !ack.is_empty(),
        )
    }

    /// Checks the denom metadata `chain` created for a voucher of `counterparty_denom`.
    pub async fn assert_human_readable_denom(
        &self,
        chain: &Chain,
        counterparty_denom: &str,
        counterparty_channel: &ChannelOutput,
    ) -> Result<(), Error> {
        let token = IbcToken::received(
            counterparty_channel.counterparty.port_id.as_str(),
            counterparty_channel.counterparty.channel_id.as_str(),
            &IbcToken::native(counterparty_denom),
        );
        let metadata = chain.grpc().denom_metadata(&token.ibc_denom()).await?;

        util::assert_eq("denom metadata base", &metadata.base, &token.ibc_denom())?;
        util::assert_eq("denom metadata name", &metadata.name, &format!("{} IBC token", token.path()))?;
        util::assert_eq("denom metadata display", &metadata.display, &token.path())?;
        util::assert_eq(
            "denom metadata symbol",
            &metadata.symbol,
            &counterparty_denom.to_ascii_uppercase(),
        )
    }

    /**
       Submits a gov v1 proposal executing `messages`, makes every validator
       vote yes and waits for the proposal to pass.
    */
    pub async fn execute_and_pass_gov_v1_proposal(
        &self,
        test_name: &str,
        chain: &Chain,
        wallet: &Wallet,
        messages: Vec<Value>,
    ) -> Result<(), Error> {
        let proposal_id = lock(&self.proposal_ids)
            .get(chain.chain_id())
            .copied()
            .unwrap_or(testvalues::FIRST_PROPOSAL_ID);

        let res = self
            .execute_gov_v1_proposal(test_name, chain, wallet, messages, proposal_id)
            .await;

        lock(&self.proposal_ids).insert(chain.chain_id().to_owned(), proposal_id + 1);

        res
    }

    async fn execute_gov_v1_proposal(
        &self,
        test_name: &str,
        chain: &Chain,
        wallet: &Wallet,
        messages: Vec<Value>,
        proposal_id: u64,
    ) -> Result<(), Error> {
        let node = chain
            .nodes()
            .first()
            .ok_or_else(|| Error::UnrecognizedChain(chain.name().to_owned()))?;
        let deposit = testvalues::coin(testvalues::DEFAULT_GOV_V1_PROPOSAL_TOKEN_AMOUNT, chain.denom());
        let proposal = gov_v1_proposal(messages, &deposit, proposal_id);

        let file = format!("proposals/proposal-{proposal_id}.json");
        node.write_file(&file, &serde_json::to_vec_pretty(&proposal)?)
            .await?;

        info!("submitting proposal {proposal_id} on {}", chain.chain_id());

        let resp = self
            .broadcast(
                test_name,
                chain,
                wallet,
                vec![
                    "gov".to_owned(),
                    "submit-proposal".to_owned(),
                    format!("{}/{file}", node.home()),
                ],
            )
            .await?;
        self.assert_tx_success(&resp)?;

        for (idx, validator) in chain.validators().iter().enumerate() {
            let resp = chain
                .exec_tx_on(idx, validator, ["gov", "vote", &proposal_id.to_string(), "yes"])
                .await?;
            tx::assert_tx_success(&resp)?;
        }

        info!("validators voted yes on proposal {proposal_id}");

        self.wait_for_gov_v1_proposal_to_pass(chain, proposal_id).await
    }

    async fn wait_for_gov_v1_proposal_to_pass(&self, chain: &Chain, proposal_id: u64) -> Result<(), Error> {
        let wait = async {
            loop {
                info!("waiting for proposal {proposal_id} to pass");

                let proposal = chain.grpc().proposal(proposal_id).await?;
                if proposal.status == ProposalStatus::Passed as i32 {
                    return Ok::<(), Error>(());
                }

                time::sleep(PROPOSAL_POLL_INTERVAL).await;
            }
        };

        time::timeout(testvalues::VOTING_PERIOD + PROPOSAL_POLL_INTERVAL, wait)
            .await
            .map_err(|_| Error::Assertion(format!("proposal {proposal_id} did not pass within the voting period")))?
    }

    /// The module account address used as the authority of governance messages.
    pub async fn gov_authority(&self, chain: &Chain) -> Result<String, Error> {
        Ok(chain.grpc().module_account_address("gov").await?)
    }

    /**
       Writes diagnostics of `test_name` if it failed or log dumps are
       enabled, then returns its relayer to the pool.

       The genesis debug export also runs when the test failed.
    */
    pub async fn finish_test(&self, test_name: &str, failed: bool) -> Result<(), Error> {
        lock(&self.relayer_wallets).remove(test_name);

        if failed || self.config.debug_config.dump_logs {
            self.write_diagnostics(test_name).await?;
        }
        if failed {
            if let Err(err) = self.export_genesis().await {
                warn!("failed exporting genesis after {test_name}: {err}");
            }
        }

        self.release_relayer(test_name).await
    }

    async fn write_diagnostics(&self, test_name: &str) -> Result<(), Error> {
        let relayer = self.assigned_relayer(test_name);
        let mut sources: Vec<&dyn DiagnosticSource> = self
            .chains
            .iter()
            .flat_map(|chain| chain.nodes())
            .map(|node| node as &dyn DiagnosticSource)
            .collect();
        if let Some(relayer) = &relayer {
            sources.push(&**relayer);
        }

        diagnostics::collect(Path::new(diagnostics::DIAGNOSTICS_DIR), test_name, &sources).await?;

        Ok(())
    }

    /// Stops the relayer of `test_name` and returns it to the pool.
    async fn release_relayer(&self, test_name: &str) -> Result<(), Error> {
        let Some(relayer) = lock(&self.test_relayers).remove(test_name) else {
            return Ok(());
        };

        relayer.stop_relaying().await?;
        lock(&self.relayer_pool).push(relayer);

        Ok(())
    }

    /// Exports the genesis of the configured chain when genesis debugging is enabled.
    pub async fn export_genesis(&self) -> Result<(), Error> {
        let debug = &self.config.debug_config.genesis;
        if !debug.dump_genesis_debug_info {
            return Ok(());
        }

        let chain_name = self.config.genesis_chain_name();
        let chain = self
            .chains
            .iter()
            .find(|chain| chain.name() == chain_name)
            .ok_or(Error::UnrecognizedChain(chain_name))?;

        let path = if debug.export_file_path.is_empty() {
            diagnostics::DEFAULT_GENESIS_EXPORT_PATH
        } else {
            debug.export_file_path.as_str()
        };

        diagnostics::export_genesis(chain, Path::new(path)).await
    }
}
