use crate::{
    config::{TestConfig, DEFAULT_BINARY, DEFAULT_LOG_LEVEL},
    error::ChainError,
    util,
};
use derive_builder::Builder;

/// Default bech32 prefix of simd accounts.
pub const DEFAULT_BECH32_PREFIX: &str = "cosmos";

/// Default light client trusting period.
pub const DEFAULT_TRUSTING_PERIOD: &str = "508h";

pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.3;

/// Everything needed to bootstrap one chain.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct ChainSpec {
    pub name: String,
    pub chain_id: String,
    pub image: String,
    pub tag: String,
    #[builder(default = "DEFAULT_BINARY.to_owned()")]
    pub binary: String,
    pub denom: String,
    #[builder(default = "DEFAULT_BECH32_PREFIX.to_owned()")]
    pub bech32_prefix: String,
    /// Defaults to a zero price in `denom`.
    #[builder(default)]
    pub gas_prices: String,
    #[builder(default = "DEFAULT_GAS_ADJUSTMENT")]
    pub gas_adjustment: f64,
    #[builder(default = "DEFAULT_TRUSTING_PERIOD.to_owned()")]
    pub trusting_period: String,
    #[builder(default = "1")]
    pub num_validators: usize,
    #[builder(default)]
    pub num_full_nodes: usize,
    #[builder(default = "DEFAULT_LOG_LEVEL.to_owned()")]
    pub log_level: String,
}

impl ChainSpec {
    /// Gas prices passed to transactions, `0.00<denom>` unless overridden.
    pub fn gas_prices(&self) -> String {
        if self.gas_prices.is_empty() {
            format!("0.00{}", self.denom)
        } else {
            self.gas_prices.clone()
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_validators + self.num_full_nodes
    }

    /// Genesis is assembled on the first validator, so a chain needs at least one.
    pub fn check_topology(&self) -> Result<(), ChainError> {
        if self.num_validators == 0 {
            return Err(ChainError::NoValidators);
        }
        Ok(())
    }
}

/// The native denom of the chain at `idx`: `atoma`, `atomb`, ...
pub fn default_denom(idx: usize) -> String {
    format!("atom{}", util::chain_letter(idx))
}

/// Builds specs for the first `chain_count` chains of `config`.
pub fn default_chain_specs(config: &TestConfig, chain_count: usize) -> Result<Vec<ChainSpec>, ChainError> {
    (0..chain_count)
        .map(|idx| {
            let cfg = config.chain_config(idx).map_err(|err| ChainError::MissingField(err.to_string()))?;

            let spec = ChainSpecBuilder::default()
                .name(config.chain_name(idx))
                .chain_id(config.chain_id(idx))
                .image(cfg.image.clone())
                .tag(cfg.tag.clone())
                .binary(if cfg.binary.is_empty() {
                    DEFAULT_BINARY.to_owned()
                } else {
                    cfg.binary.clone()
                })
                .denom(default_denom(idx))
                .num_validators(config.num_validators(idx))
                .num_full_nodes(config.num_full_nodes(idx))
                .log_level(if config.cometbft_config.log_level.is_empty() {
                    DEFAULT_LOG_LEVEL.to_owned()
                } else {
                    config.cometbft_config.log_level.clone()
                })
                .build()?;

            Ok(spec)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;

    fn config() -> TestConfig {
        TestConfig {
            chain_configs: vec![
                ChainConfig {
                    chain_id: "chainA-1".into(),
                    name: "simapp-a".into(),
                    image: "ghcr.io/cosmos/ibc-go-simd".into(),
                    tag: "v8.0.0".into(),
                    binary: "simd".into(),
                    num_validators: 2,
                    num_full_nodes: 1,
                },
                ChainConfig {
                    chain_id: "chainB-1".into(),
                    name: "simapp-b".into(),
                    image: "ghcr.io/cosmos/ibc-go-simd".into(),
                    tag: "v7.4.0".into(),
                    binary: String::new(),
                    num_validators: 0,
                    num_full_nodes: 0,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_chain_specs() {
        let specs = default_chain_specs(&config(), 2).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].denom, "atoma");
        assert_eq!(specs[0].gas_prices(), "0.00atoma");
        assert_eq!(specs[0].num_nodes(), 3);
        assert_eq!(specs[1].denom, "atomb");
        assert_eq!(specs[1].tag, "v7.4.0");
        assert_eq!(specs[1].binary, "simd");
        assert_eq!(specs[1].num_validators, 1);
        assert_eq!(specs[1].log_level, "info");
        assert_eq!(specs[1].trusting_period, "508h");
    }

    #[test]
    fn test_too_many_chains() {
        assert!(default_chain_specs(&config(), 3).is_err());
    }

    #[test]
    fn test_builder_requires_denom() {
        let res = ChainSpecBuilder::default()
            .name("simapp-a")
            .chain_id("chainA-1")
            .image("simd")
            .tag("main")
            .build();

        assert!(res.is_err());
    }

    #[test]
    fn test_full_nodes_without_validators() {
        let spec = ChainSpecBuilder::default()
            .name("simapp-a")
            .chain_id("chainA-1")
            .image("simd")
            .tag("main")
            .denom("atoma")
            .num_validators(0usize)
            .num_full_nodes(2usize)
            .build()
            .unwrap();

        assert!(matches!(spec.check_topology(), Err(ChainError::NoValidators)));

        let spec = ChainSpec { num_validators: 1, ..spec };
        assert!(spec.check_topology().is_ok());
    }
}
