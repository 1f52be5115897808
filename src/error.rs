use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;
use std::{io::Error as IoError, path::PathBuf, string::FromUtf8Error};
use testcontainers::TestcontainersError;
use thiserror::Error;

/// Errors that may occur while loading or validating the test configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("failed to parse config file `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid chain configuration: {0}")]
    InvalidChain(String),
    #[error("invalid relayer configuration: {0}")]
    InvalidRelayer(String),
    #[error("invalid genesis debug configuration: {0}")]
    InvalidGenesisDebug(String),
    #[error("invalid upgrade configuration: {0}")]
    InvalidUpgrade(String),
    #[error("config has {found} chain configs, {wanted} are required")]
    NotEnoughChains { found: usize, wanted: usize },
    #[error("unable to determine the home directory")]
    NoHomeDir,
}

/// Errors that may occur while running a command inside a container.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("container runtime failure: {0}")]
    Runtime(String),
    #[error("exec was cancelled")]
    Cancelled,
    #[error("the exec process did not report an exit code")]
    MissingExitCode,
    #[error("command exited with code {code}: {stderr}")]
    NonZeroExit { code: i64, stderr: String },
    #[error("command output is not valid UTF-8")]
    Utf8(#[from] FromUtf8Error),
}

/// Errors that may occur while dispatching a gRPC query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no query path is registered for request type `{0}`")]
    UnknownRequest(String),
    #[error("cannot derive a query path from type name `{0}`")]
    InvalidTypeName(String),
    #[error("`{0}` is not a valid gRPC method path")]
    InvalidPath(String),
    #[error("gRPC transport failure")]
    Transport(#[from] tonic::transport::Error),
    #[error("gRPC call failed: {0}")]
    Status(#[from] tonic::Status),
    #[error("reflection failure: {0}")]
    Reflection(String),
    #[error("failed to decode protobuf message")]
    Decode(#[from] prost::DecodeError),
    #[error("response is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("`{0}` is not a valid amount")]
    InvalidAmount(String),
}

/// Errors produced by the BLS aggregation wrapper.
#[derive(Error, Debug)]
pub enum BlsError {
    #[error("no public keys were supplied")]
    NoPublicKeys,
    #[error("public key {index} is invalid: {reason}")]
    InvalidPublicKey { index: usize, reason: String },
    #[error("signature is invalid: {0}")]
    InvalidSignature(String),
    #[error("public key aggregation failed: {0}")]
    Aggregation(String),
    #[error("message must be 32 bytes, got {0}")]
    InvalidMessageLength(usize),
    #[error("malformed custom query: {0}")]
    MalformedQuery(#[source] JsonError),
    #[error("failed to encode the query response")]
    Encode(#[source] JsonError),
}

/// Errors that may occur while bootstrapping or driving a chain.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("exec failure")]
    Exec(#[from] ExecError),
    #[error("container failure")]
    Container(#[from] TestcontainersError),
    #[error("failed to (de)serialize JSON")]
    Json(#[from] JsonError),
    #[error("failed to parse TOML")]
    TomlDe(#[from] toml::de::Error),
    #[error("failed to render TOML")]
    TomlSer(#[from] toml::ser::Error),
    #[error("an HTTP request failed")]
    Http(#[from] ReqwestError),
    #[error("the field `{0}` is missing")]
    MissingField(String),
    #[error("the chain has no validators")]
    NoValidators,
    #[error("invalid genesis: {0}")]
    Genesis(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("the chain spec is incomplete")]
    Spec(#[from] crate::chain::ChainSpecBuilderError),
    #[error("transaction failure")]
    Tx(#[from] TxError),
    #[error("query failure")]
    Query(#[from] QueryError),
}

/// Errors that may occur while driving a relayer.
#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("the relayer `{0}` is not recognized")]
    UnknownRelayer(String),
    #[error("exec failure")]
    Exec(#[from] ExecError),
    #[error("container failure")]
    Container(#[from] TestcontainersError),
    #[error("failed to (de)serialize JSON")]
    Json(#[from] JsonError),
    #[error("failed to parse TOML")]
    TomlDe(#[from] toml::de::Error),
    #[error("failed to render TOML")]
    TomlSer(#[from] toml::ser::Error),
    #[error("relayer output is missing a result line")]
    MissingResult,
    #[error("the relayer config has no chain `{0}`")]
    UnknownChain(String),
    #[error("no channels found on chain `{0}`")]
    NoChannels(String),
    #[error("the relayer pool is empty")]
    EmptyPool,
    #[error("the relayer has no path `{0}`")]
    UnknownPath(String),
    #[error("failed to fund the relayer")]
    Chain(#[from] ChainError),
}

/// Errors surfaced by transaction assertions.
#[derive(Error, Debug)]
pub enum TxError {
    #[error("failed to decode the tx response")]
    Decode(#[from] JsonError),
    #[error("transaction failed with code {code}: {raw_log}")]
    Failed { code: u32, raw_log: String },
    #[error("transaction unexpectedly succeeded")]
    UnexpectedSuccess,
    #[error("transaction response is invalid: {0}")]
    Invalid(String),
}

/// The top-level testing error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration failure")]
    Config(#[from] ConfigError),
    #[error("exec failure")]
    Exec(#[from] ExecError),
    #[error("query failure")]
    Query(#[from] QueryError),
    #[error("BLS failure")]
    Bls(#[from] BlsError),
    #[error("chain failure")]
    Chain(#[from] ChainError),
    #[error("relayer failure")]
    Relayer(#[from] RelayerError),
    #[error("transaction failure")]
    Tx(#[from] TxError),
    #[error("container failure")]
    Container(#[from] TestcontainersError),
    #[error("IO failure")]
    Io(#[from] IoError),
    #[error("failed to (de)serialize JSON")]
    Json(#[from] JsonError),
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("the chain `{0}` is not recognized")]
    UnrecognizedChain(String),
    #[error("failed to lookup channel between `{0}` and `{1}`")]
    ChannelLookup(String, String),
    #[error("the test `{0}` has no relayer assigned")]
    NoRelayer(String),
}
