/*!
   Loading of the E2E test configuration.

   The configuration is read once per process from a YAML file, falling back
   to environment variables when no file exists. Individual environment
   variables override values read from the file.
*/

use super::{error::ConfigError, ibc::parse_chain_id};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Image used for every chain unless overridden per chain.
pub const CHAIN_IMAGE_ENV: &str = "CHAIN_IMAGE";
/// Legacy alias of [`CHAIN_IMAGE_ENV`].
pub const SIMD_IMAGE_ENV: &str = "SIMD_IMAGE";
pub const CHAIN_A_TAG_ENV: &str = "CHAIN_A_TAG";
/// Legacy alias of [`CHAIN_A_TAG_ENV`].
pub const SIMD_TAG_ENV: &str = "SIMD_TAG";
pub const CHAIN_B_TAG_ENV: &str = "CHAIN_B_TAG";
pub const CHAIN_C_TAG_ENV: &str = "CHAIN_C_TAG";
pub const CHAIN_D_TAG_ENV: &str = "CHAIN_D_TAG";
/// Selects the active relayer (`hermes` or `rly`).
pub const RELAYER_ID_ENV: &str = "RELAYER_ID";
pub const CHAIN_BINARY_ENV: &str = "CHAIN_BINARY";
pub const CHAIN_UPGRADE_TAG_ENV: &str = "CHAIN_UPGRADE_TAG";
pub const CHAIN_UPGRADE_PLAN_ENV: &str = "CHAIN_UPGRADE_PLAN";
/// Path of the config file, absolute or relative to the crate root.
pub const E2E_CONFIG_PATH_ENV: &str = "E2E_CONFIG_PATH";
pub const KEEP_CONTAINERS_ENV: &str = "KEEP_CONTAINERS";
pub const CI_ENV: &str = "CI";
/// Set when running against a fork of the chain repository.
pub const FORK_ENV: &str = "FORK";
/// Set when every test of a suite runs in one process.
pub const RUN_SUITE_ENV: &str = "RUN_SUITE";

pub const DEFAULT_BINARY: &str = "simd";
pub const DEFAULT_CHAIN_TAG: &str = "main";
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".ibc-go-e2e-config.yaml";
pub const DEFAULT_CI_CONFIG_FILE_NAME: &str = "ci-e2e-config.yaml";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const HERMES_RELAYER_ID: &str = "hermes";
pub const HERMES_RELAYER_IMAGE: &str = "ghcr.io/informalsystems/hermes";
pub const HERMES_RELAYER_TAG: &str = "1.13.1";
pub const RLY_RELAYER_ID: &str = "rly";
pub const RLY_RELAYER_IMAGE: &str = "ghcr.io/cosmos/relayer";
pub const RLY_RELAYER_TAG: &str = "latest";

const DEFAULT_CHAIN_IDS: [&str; 4] = ["chainA-1", "chainB-1", "chainC-1", "chainD-1"];
const DEFAULT_CHAIN_NAMES: [&str; 4] = ["simapp-a", "simapp-b", "simapp-c", "simapp-d"];
const CHAIN_TAG_ENVS: [&str; 4] = [CHAIN_A_TAG_ENV, CHAIN_B_TAG_ENV, CHAIN_C_TAG_ENV, CHAIN_D_TAG_ENV];

/// Validators per chain when the config comes from the environment only.
const ENV_NUM_VALIDATORS: usize = 4;
/// Full nodes per chain when the config comes from the environment only.
const ENV_NUM_FULL_NODES: usize = 1;

/// A source of environment variables.
pub trait EnvSource {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;

    /// Returns the value of `key` if it is set to a non-empty string.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|val| !val.trim().is_empty())
    }

    /// Returns true if `key` is `true`, ignoring case.
    fn is_true(&self, key: &str) -> bool {
        self.var(key)
            .is_some_and(|val| val.to_lowercase() == "true")
    }
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|val| (*val).to_owned())
    }
}

/// Returns true if the tests are running in CI.
pub fn is_ci(env: &impl EnvSource) -> bool {
    env.is_true(CI_ENV)
}

/// Returns true if the tests are running against a fork.
pub fn is_fork(env: &impl EnvSource) -> bool {
    env.is_true(FORK_ENV)
}

/// Returns true if a full suite is running in one process.
pub fn is_running_suite(env: &impl EnvSource) -> bool {
    env.is_true(RUN_SUITE_ENV)
}

/// The default image for a chain binary.
pub fn chain_image(binary: &str) -> String {
    format!("ghcr.io/cosmos/ibc-go-{binary}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainConfig {
    pub chain_id: String,
    pub name: String,
    pub image: String,
    pub tag: String,
    pub binary: String,
    pub num_validators: usize,
    pub num_full_nodes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub id: String,
    pub image: String,
    pub tag: String,
}

impl RelayerConfig {
    pub fn hermes() -> Self {
        Self {
            id: HERMES_RELAYER_ID.to_owned(),
            image: HERMES_RELAYER_IMAGE.to_owned(),
            tag: HERMES_RELAYER_TAG.to_owned(),
        }
    }

    pub fn rly() -> Self {
        Self {
            id: RLY_RELAYER_ID.to_owned(),
            image: RLY_RELAYER_IMAGE.to_owned(),
            tag: RLY_RELAYER_TAG.to_owned(),
        }
    }
}

/// Values used only by upgrade tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeConfig {
    pub plan_name: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CometBftConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenesisDebugConfig {
    /// Dump the exported genesis of a chain after a test.
    pub dump_genesis_debug_info: bool,
    #[serde(rename = "filePath")]
    pub export_file_path: String,
    /// Chain to dump. Defaults to chain A.
    pub chain_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugConfig {
    /// Write container logs to the diagnostics directory even when tests pass.
    pub dump_logs: bool,
    pub genesis: GenesisDebugConfig,
    /// Leave containers running after the tests finish.
    pub keep_containers: bool,
}

/// The configuration of an E2E test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    #[serde(rename = "chains")]
    pub chain_configs: Vec<ChainConfig>,
    #[serde(rename = "relayers")]
    pub relayer_configs: Vec<RelayerConfig>,
    #[serde(rename = "activeRelayer")]
    pub active_relayer: String,
    #[serde(rename = "cometbft")]
    pub cometbft_config: CometBftConfig,
    #[serde(rename = "debug")]
    pub debug_config: DebugConfig,
    #[serde(rename = "upgradePlanName")]
    pub upgrade_plan_name: String,
    #[serde(rename = "upgrades")]
    pub upgrade_configs: Vec<UpgradeConfig>,
}

impl TestConfig {
    /// Loads and validates the configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&ProcessEnv)
    }

    /// Loads and validates the configuration using the given environment.
    pub fn load_from(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let path = config_file_path(env)?;

        if path.exists() {
            return Self::load_file(&path, env);
        }

        debug!("no E2E config at {}, using the environment", path.display());

        let mut tc = Self::from_env(env);
        tc.populate_defaults();
        tc.validate()?;

        Ok(tc)
    }

    /// Loads the YAML file at `path`, with environment overrides applied on top.
    pub fn load_file(path: impl AsRef<Path>, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading E2E config from {}", path.display());

        let mut tc = Self::from_file(path)?;
        tc.populate_defaults();
        tc.apply_env_overrides(env);
        tc.validate()?;

        Ok(tc)
    }

    /// Parses the YAML file at `path` without applying defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds a configuration from environment variables alone.
    pub fn from_env(env: &impl EnvSource) -> Self {
        let binary = env
            .var(CHAIN_BINARY_ENV)
            .unwrap_or_else(|| DEFAULT_BINARY.to_owned());
        let image = env
            .var(CHAIN_IMAGE_ENV)
            .or_else(|| env.var(SIMD_IMAGE_ENV))
            .unwrap_or_else(|| chain_image(&binary));
        let chain_a_tag = env
            .var(CHAIN_A_TAG_ENV)
            .or_else(|| env.var(SIMD_TAG_ENV))
            .unwrap_or_else(|| DEFAULT_CHAIN_TAG.to_owned());

        let chain_configs = CHAIN_TAG_ENVS
            .iter()
            .enumerate()
            .map(|(i, tag_env)| ChainConfig {
                chain_id: DEFAULT_CHAIN_IDS[i].to_owned(),
                name: DEFAULT_CHAIN_NAMES[i].to_owned(),
                image: image.clone(),
                tag: if i == 0 {
                    chain_a_tag.clone()
                } else {
                    env.var(tag_env).unwrap_or_else(|| chain_a_tag.clone())
                },
                binary: binary.clone(),
                num_validators: ENV_NUM_VALIDATORS,
                num_full_nodes: ENV_NUM_FULL_NODES,
            })
            .collect();

        let upgrade_plan_name = env.var(CHAIN_UPGRADE_PLAN_ENV).unwrap_or_default();
        let upgrade_configs = match env.non_empty(CHAIN_UPGRADE_TAG_ENV) {
            Some(tag) if !upgrade_plan_name.is_empty() => vec![UpgradeConfig {
                plan_name: upgrade_plan_name.clone(),
                tag,
            }],
            _ => Vec::new(),
        };

        Self {
            chain_configs,
            relayer_configs: Vec::new(),
            active_relayer: env
                .var(RELAYER_ID_ENV)
                .map(|id| id.trim().to_owned())
                .unwrap_or_default(),
            cometbft_config: CometBftConfig {
                log_level: DEFAULT_LOG_LEVEL.to_owned(),
            },
            debug_config: DebugConfig {
                keep_containers: env.is_true(KEEP_CONTAINERS_ENV),
                ..Default::default()
            },
            upgrade_plan_name,
            upgrade_configs,
        }
    }

    /// Fills in values the file left unspecified.
    pub fn populate_defaults(&mut self) {
        let chain_a_tag = self
            .chain_configs
            .first()
            .map(|cfg| cfg.tag.clone())
            .unwrap_or_default();

        for (i, cfg) in self.chain_configs.iter_mut().enumerate() {
            if cfg.chain_id.is_empty() {
                cfg.chain_id = default_chain_id(i);
            }
            if cfg.binary.is_empty() {
                cfg.binary = DEFAULT_BINARY.to_owned();
            }
            if cfg.image.is_empty() {
                cfg.image = chain_image(&cfg.binary);
            }
            if cfg.num_validators == 0 {
                cfg.num_validators = 1;
            }
            if cfg.tag.is_empty() && i != 0 {
                cfg.tag = chain_a_tag.clone();
            }
        }

        if self.active_relayer.is_empty() {
            self.active_relayer = HERMES_RELAYER_ID.to_owned();
        }

        if self.relayer_configs.is_empty() {
            self.relayer_configs = vec![RelayerConfig::rly(), RelayerConfig::hermes()];
        }

        if self.cometbft_config.log_level.is_empty() {
            self.cometbft_config.log_level = DEFAULT_LOG_LEVEL.to_owned();
        }
    }

    /// Overrides file values with any non-empty environment variables.
    pub fn apply_env_overrides(&mut self, env: &impl EnvSource) {
        let chain_a_tag = env
            .non_empty(CHAIN_A_TAG_ENV)
            .or_else(|| env.non_empty(SIMD_TAG_ENV));

        for (i, tag_env) in CHAIN_TAG_ENVS.iter().enumerate() {
            let tag = if i == 0 {
                chain_a_tag.clone()
            } else {
                env.non_empty(tag_env)
            };

            if let (Some(tag), Some(cfg)) = (tag, self.chain_configs.get_mut(i)) {
                cfg.tag = tag;
            }
        }

        if let Some(binary) = env.non_empty(CHAIN_BINARY_ENV) {
            self.chain_configs
                .iter_mut()
                .for_each(|cfg| cfg.binary = binary.clone());
        }

        if let Some(image) = env
            .non_empty(CHAIN_IMAGE_ENV)
            .or_else(|| env.non_empty(SIMD_IMAGE_ENV))
        {
            self.chain_configs
                .iter_mut()
                .for_each(|cfg| cfg.image = image.clone());
        }

        if let Some(id) = env.non_empty(RELAYER_ID_ENV) {
            self.active_relayer = id.trim().to_owned();
        }

        if let Some(plan) = env.non_empty(CHAIN_UPGRADE_PLAN_ENV) {
            self.upgrade_plan_name = plan;
        }

        if let Some(tag) = env.non_empty(CHAIN_UPGRADE_TAG_ENV) {
            let plan_name = self.upgrade_plan_name.clone();
            match self
                .upgrade_configs
                .iter_mut()
                .find(|upgrade| upgrade.plan_name == plan_name)
            {
                Some(upgrade) => upgrade.tag = tag,
                None if !plan_name.is_empty() => self.upgrade_configs.push(UpgradeConfig { plan_name, tag }),
                None => {}
            }
        }

        if env.is_true(KEEP_CONTAINERS_ENV) {
            self.debug_config.keep_containers = true;
        }
    }

    /// Checks that the configuration can be used to run tests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_chains()?;
        self.validate_relayers()?;
        self.validate_genesis_debug_config()?;
        self.validate_upgrade_config()
    }

    fn validate_chains(&self) -> Result<(), ConfigError> {
        for cfg in &self.chain_configs {
            if cfg.binary.is_empty() {
                return Err(ConfigError::InvalidChain(format!(
                    "chain config missing binary: {cfg:?}"
                )));
            }
            if cfg.image.is_empty() {
                return Err(ConfigError::InvalidChain(format!(
                    "chain config missing image: {cfg:?}"
                )));
            }
            if cfg.tag.is_empty() {
                return Err(ConfigError::InvalidChain(format!(
                    "chain config missing tag: {cfg:?}"
                )));
            }
            if cfg.num_validators == 0 && cfg.num_full_nodes == 0 {
                return Err(ConfigError::InvalidChain(format!(
                    "chain config missing number of validators or full nodes: {cfg:?}"
                )));
            }
        }

        if self.chain_configs.len() >= 2 {
            let (chain_a, chain_b) = (self.chain_id(0), self.chain_id(1));
            if parse_chain_id(&chain_a) != parse_chain_id(&chain_b) {
                return Err(ConfigError::InvalidChain(format!(
                    "ensure both chain ids are in the format {{chainID}}-{{revision}} and have the same revision. Got: chainA: {chain_a}, chainB: {chain_b}"
                )));
            }
        }

        Ok(())
    }

    fn validate_relayers(&self) -> Result<(), ConfigError> {
        if self.relayer_configs.is_empty() {
            return Err(ConfigError::InvalidRelayer(
                "no relayer configurations specified".to_owned(),
            ));
        }

        for cfg in &self.relayer_configs {
            if cfg.id.is_empty() {
                return Err(ConfigError::InvalidRelayer(format!(
                    "relayer config missing ID: {cfg:?}"
                )));
            }
            if cfg.image.is_empty() {
                return Err(ConfigError::InvalidRelayer(format!(
                    "relayer config missing image: {cfg:?}"
                )));
            }
            if cfg.tag.is_empty() {
                return Err(ConfigError::InvalidRelayer(format!(
                    "relayer config missing tag: {cfg:?}"
                )));
            }
        }

        if self.active_relayer_config().is_none() {
            return Err(ConfigError::InvalidRelayer(format!(
                "active relayer {} not found in relayer configs",
                self.active_relayer
            )));
        }

        Ok(())
    }

    fn validate_genesis_debug_config(&self) -> Result<(), ConfigError> {
        if !self.debug_config.genesis.dump_genesis_debug_info {
            return Ok(());
        }

        let name = self.genesis_chain_name();
        self.chain_index(&name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::InvalidGenesisDebug(format!("chain {name} not found in chain configs")))
    }

    fn validate_upgrade_config(&self) -> Result<(), ConfigError> {
        if self.upgrade_plan_name.trim().is_empty() {
            return Ok(());
        }

        for upgrade in &self.upgrade_configs {
            if upgrade.tag.trim().is_empty() {
                return Err(ConfigError::InvalidUpgrade(format!(
                    "upgrade config missing tag: {upgrade:?}"
                )));
            }
            if upgrade.plan_name.trim().is_empty() {
                return Err(ConfigError::InvalidUpgrade(format!(
                    "upgrade config missing plan name: {upgrade:?}"
                )));
            }
        }

        self.upgrade_config().map(|_| ()).ok_or_else(|| {
            ConfigError::InvalidUpgrade(format!(
                "upgrade plan {} not found in upgrade configs",
                self.upgrade_plan_name
            ))
        })
    }

    /// The config of the relayer selected by `activeRelayer`.
    pub fn active_relayer_config(&self) -> Option<&RelayerConfig> {
        self.relayer_configs
            .iter()
            .find(|cfg| cfg.id == self.active_relayer)
    }

    /// The upgrade selected by `upgradePlanName`.
    pub fn upgrade_config(&self) -> Option<&UpgradeConfig> {
        self.upgrade_configs
            .iter()
            .find(|upgrade| upgrade.plan_name == self.upgrade_plan_name)
    }

    /// The chain config at `idx`, or an error if the config has too few chains.
    pub fn chain_config(&self, idx: usize) -> Result<&ChainConfig, ConfigError> {
        self.chain_configs
            .get(idx)
            .ok_or(ConfigError::NotEnoughChains {
                found: self.chain_configs.len(),
                wanted: idx + 1,
            })
    }

    /// The chain id at `idx`, defaulting to `chain<LETTER>-1`.
    pub fn chain_id(&self, idx: usize) -> String {
        self.chain_configs
            .get(idx)
            .map(|cfg| cfg.chain_id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| default_chain_id(idx))
    }

    /// The chain name at `idx`, defaulting to `simapp-<letter>`.
    pub fn chain_name(&self, idx: usize) -> String {
        self.chain_configs
            .get(idx)
            .map(|cfg| cfg.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("simapp-{}", crate::util::chain_letter(idx)))
    }

    /// The tag of the chain at `idx`.
    pub fn chain_tag(&self, idx: usize) -> &str {
        self.chain_configs
            .get(idx)
            .map(|cfg| cfg.tag.as_str())
            .unwrap_or(DEFAULT_CHAIN_TAG)
    }

    /// Validators for the chain at `idx`. At least one.
    pub fn num_validators(&self, idx: usize) -> usize {
        self.chain_configs
            .get(idx)
            .map(|cfg| cfg.num_validators)
            .filter(|n| *n > 0)
            .unwrap_or(1)
    }

    pub fn num_full_nodes(&self, idx: usize) -> usize {
        self.chain_configs
            .get(idx)
            .map(|cfg| cfg.num_full_nodes)
            .unwrap_or_default()
    }

    /// The index of the chain named `name`.
    pub fn chain_index(&self, name: &str) -> Option<usize> {
        (0..self.chain_configs.len()).find(|i| self.chain_name(*i) == name)
    }

    /// The chain whose genesis is dumped. Defaults to chain A.
    pub fn genesis_chain_name(&self) -> String {
        match self.debug_config.genesis.chain_name.as_str() {
            "" => self.chain_name(0),
            name => name.to_owned(),
        }
    }
}

fn default_chain_id(idx: usize) -> String {
    DEFAULT_CHAIN_IDS
        .get(idx)
        .map(|id| (*id).to_owned())
        .unwrap_or_else(|| format!("chain{}-1", crate::util::chain_label(idx)))
}

/**
   Resolves the config file path.

   `E2E_CONFIG_PATH` may be absolute or relative to the crate root. In CI the
   checked in CI config is used. Otherwise the file lives in the home
   directory.
*/
pub fn config_file_path(env: &impl EnvSource) -> Result<PathBuf, ConfigError> {
    let crate_root = Path::new(env!("CARGO_MANIFEST_DIR"));

    if let Some(path) = env.non_empty(E2E_CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        return Ok(if path.is_absolute() {
            path
        } else {
            crate_root.join(path)
        });
    }

    if is_ci(env) {
        return Ok(crate_root.join(DEFAULT_CI_CONFIG_FILE_NAME));
    }

    env.var("HOME")
        .map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
chains:
  - chainId: chainA-1
    numValidators: 1
    numFullNodes: 0
    image: ghcr.io/cosmos/ibc-go-simd
    tag: v8.4.0
    binary: simd
  - chainId: chainB-1
    numValidators: 2
    image: ghcr.io/cosmos/ibc-go-simd
    binary: simd
activeRelayer: hermes
relayers:
  - id: hermes
    image: ghcr.io/informalsystems/hermes
    tag: "1.10.0"
cometbft:
  logLevel: debug
debug:
  dumpLogs: true
  keepContainers: false
upgradePlanName: v9
upgrades:
  - planName: v9
    tag: v9.0.0
"#;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn env_with_file<'a>(file: &'a NamedTempFile, extra: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
        let mut env: HashMap<&str, &str> = extra.iter().copied().collect();
        env.insert(E2E_CONFIG_PATH_ENV, file.path().to_str().unwrap());
        env
    }

    #[test]
    fn test_load_from_file() {
        let file = config_file(FULL_CONFIG);
        let tc = TestConfig::load_from(&env_with_file(&file, &[])).unwrap();

        assert_eq!(tc.chain_configs.len(), 2);
        assert_eq!(tc.chain_configs[1].tag, "v8.4.0");
        assert_eq!(tc.num_validators(1), 2);
        assert_eq!(tc.cometbft_config.log_level, "debug");
        assert!(tc.debug_config.dump_logs);
        assert_eq!(tc.active_relayer_config().unwrap().tag, "1.10.0");
        assert_eq!(tc.upgrade_config().unwrap().tag, "v9.0.0");
        assert_eq!(tc.chain_name(0), "simapp-a");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file(FULL_CONFIG);
        let env = env_with_file(
            &file,
            &[
                (CHAIN_A_TAG_ENV, "v7.4.0"),
                (CHAIN_B_TAG_ENV, "v8.0.0"),
                (CHAIN_IMAGE_ENV, "my/image"),
                (KEEP_CONTAINERS_ENV, "TRUE"),
                (CHAIN_UPGRADE_TAG_ENV, "v9.1.0"),
            ],
        );
        let tc = TestConfig::load_from(&env).unwrap();

        assert_eq!(tc.chain_tag(0), "v7.4.0");
        assert_eq!(tc.chain_tag(1), "v8.0.0");
        assert!(tc.chain_configs.iter().all(|cfg| cfg.image == "my/image"));
        assert!(tc.debug_config.keep_containers);
        assert_eq!(tc.upgrade_config().unwrap().tag, "v9.1.0");
    }

    #[test]
    fn test_simd_tag_alias() {
        let file = config_file(FULL_CONFIG);
        let env = env_with_file(&file, &[(SIMD_TAG_ENV, "v6.3.0")]);
        let tc = TestConfig::load_from(&env).unwrap();

        assert_eq!(tc.chain_tag(0), "v6.3.0");
    }

    #[test]
    fn test_from_env_defaults() {
        let env: HashMap<&str, &str> = [
            (E2E_CONFIG_PATH_ENV, "/nonexistent/e2e.yaml"),
            (CHAIN_A_TAG_ENV, "v8.1.0"),
            (CHAIN_C_TAG_ENV, "v7.0.0"),
        ]
        .into_iter()
        .collect();
        let tc = TestConfig::load_from(&env).unwrap();

        assert_eq!(tc.chain_configs.len(), 4);
        assert_eq!(tc.chain_tag(1), "v8.1.0");
        assert_eq!(tc.chain_tag(2), "v7.0.0");
        assert_eq!(tc.chain_tag(3), "v8.1.0");
        assert_eq!(tc.chain_configs[0].image, "ghcr.io/cosmos/ibc-go-simd");
        assert_eq!(tc.chain_id(3), "chainD-1");
        assert_eq!(tc.num_validators(0), 4);
        assert_eq!(tc.num_full_nodes(0), 1);
        assert_eq!(tc.active_relayer, HERMES_RELAYER_ID);
        assert_eq!(tc.active_relayer_config(), Some(&RelayerConfig::hermes()));
    }

    #[test]
    fn test_chain_b_tag_falls_back_to_chain_a() {
        let file = config_file(
            "chains:\n  - tag: v8.0.0\n  - chainId: chainB-1\n  - {}\n",
        );
        let tc = TestConfig::load_from(&env_with_file(&file, &[])).unwrap();

        assert_eq!(tc.chain_tag(1), "v8.0.0");
        assert_eq!(tc.chain_tag(2), "v8.0.0");
        assert_eq!(tc.chain_id(2), "chainC-1");
        assert_eq!(tc.num_validators(2), 1);
    }

    #[test]
    fn test_mismatched_revisions_are_rejected() {
        let file = config_file("chains:\n  - chainId: chainA-1\n    tag: main\n  - chainId: chainB-2\n");
        let err = TestConfig::load_from(&env_with_file(&file, &[])).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidChain(_)));
    }

    #[test]
    fn test_unknown_active_relayer_is_rejected() {
        let file = config_file("chains:\n  - tag: main\nactiveRelayer: hyperspace\n");
        let err = TestConfig::load_from(&env_with_file(&file, &[])).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidRelayer(msg) if msg.contains("hyperspace")));
    }

    #[test]
    fn test_missing_upgrade_plan_is_rejected() {
        let file = config_file(
            "chains:\n  - tag: main\nupgradePlanName: v10\nupgrades:\n  - planName: v9\n    tag: v9.0.0\n",
        );
        let err = TestConfig::load_from(&env_with_file(&file, &[])).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidUpgrade(_)));
    }

    #[test]
    fn test_genesis_debug_chain_must_exist() {
        let file = config_file(
            "chains:\n  - tag: main\ndebug:\n  genesis:\n    dumpGenesisDebugInfo: true\n    chainName: simapp-z\n",
        );
        let err = TestConfig::load_from(&env_with_file(&file, &[])).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidGenesisDebug(_)));
    }

    #[test]
    fn test_missing_tag_is_rejected() {
        let file = config_file("chains:\n  - chainId: chainA-1\n");
        let err = TestConfig::load_from(&env_with_file(&file, &[])).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidChain(msg) if msg.contains("missing tag")));
    }

    #[test]
    fn test_malformed_file() {
        let file = config_file("chains: [");
        let err = TestConfig::load_from(&env_with_file(&file, &[])).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_config_file_path() {
        let ci: HashMap<&str, &str> = [(CI_ENV, "true")].into_iter().collect();
        assert!(config_file_path(&ci)
            .unwrap()
            .ends_with(DEFAULT_CI_CONFIG_FILE_NAME));

        let home: HashMap<&str, &str> = [("HOME", "/home/tester")].into_iter().collect();
        assert_eq!(
            config_file_path(&home).unwrap(),
            PathBuf::from("/home/tester/.ibc-go-e2e-config.yaml")
        );

        let relative: HashMap<&str, &str> = [(E2E_CONFIG_PATH_ENV, "sample.yaml")].into_iter().collect();
        assert!(config_file_path(&relative).unwrap().is_absolute());

        let nothing: HashMap<&str, &str> = HashMap::new();
        assert!(matches!(config_file_path(&nothing), Err(ConfigError::NoHomeDir)));
    }

    #[test]
    fn test_env_flags() {
        let env: HashMap<&str, &str> = [(CI_ENV, "True"), (FORK_ENV, "1"), (RUN_SUITE_ENV, "true")]
            .into_iter()
            .collect();

        assert!(is_ci(&env));
        assert!(!is_fork(&env));
        assert!(is_running_suite(&env));
    }
}
