/// BLS public key aggregation and signature verification.
pub mod bls;

/// Chains of `simd` nodes running in containers.
pub mod chain;

/// Test configuration: YAML file, environment overrides and defaults.
pub mod config;

/// Container logs and files written after a test.
pub mod diagnostics;

/// Docker networks, containers and exec.
pub mod docker;

/// Top-level testing error.
pub mod error;

/// gRPC query dispatch and typed queries.
pub mod grpc;

/// IBC identifiers, denoms and channel options.
pub mod ibc;

/// Logger installation.
pub mod logging;

/// Relayer containers, configs and paths.
pub mod relayer;

/// Runs scenarios and reports their results.
pub mod runner;

/// Feature gates by release version.
pub mod semverutil;

/// Shared chains, relayers and per-test bookkeeping.
pub mod suite;

/// End-to-end scenarios.
pub mod suites;

/// Shared test constants.
pub mod testvalues;

/// Transaction responses, broadcast retries and assertions.
pub mod tx;

/// Assertion helpers.
pub mod util;
