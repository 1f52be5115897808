/*!
   Transaction responses as printed by the chain CLI, plus the assertions
   scenarios make on them.
*/

use crate::error::TxError;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use tracing::warn;

/// Attempts made for a relayer signed broadcast before giving up.
pub const RELAYER_BROADCAST_ATTEMPTS: usize = 5;

/// Raw log fragments of failures that are worth retrying.
pub const RETRYABLE_FAILURES: &[&str] = &["account sequence mismatch"];

/// Number of blocks to wait for after every broadcast.
pub const BLOCKS_AFTER_BROADCAST: u64 = 2;

const UNKNOWN_FIELD_HINT: &str = "\n\nThis error is likely due to a new an unrecognized proto field being provided to a chain using an older version of the sdk.\nIf this is a compatibility test, ensure that the fields are being sanitized before they are broadcast.";

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) if s.is_empty() => Ok(0),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    pub index: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

/// The JSON form of a Cosmos SDK `TxResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub height: i64,
    pub txhash: String,
    pub codespace: String,
    pub code: u32,
    pub data: String,
    pub raw_log: String,
    pub info: String,
    #[serde(deserialize_with = "string_or_number")]
    pub gas_wanted: i64,
    #[serde(deserialize_with = "string_or_number")]
    pub gas_used: i64,
    pub events: Vec<Event>,
    pub timestamp: String,
}

impl TxResponse {
    /// Parses CLI output, skipping anything printed before the JSON object.
    pub fn parse(output: &str) -> Result<Self, TxError> {
        let start = output
            .find('{')
            .ok_or_else(|| TxError::Invalid(format!("no JSON in `{}`", output.trim())))?;

        Ok(serde_json::from_str(output[start..].trim())?)
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Returns true if the transaction failed in a way that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_FAILURES
            .iter()
            .any(|failure| self.raw_log.contains(failure))
    }
}

/// An expected ABCI error: registered codespace, code and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbciError {
    pub codespace: &'static str,
    pub code: u32,
    pub message: &'static str,
}

impl AbciError {
    pub const fn new(codespace: &'static str, code: u32, message: &'static str) -> Self {
        Self {
            codespace,
            code,
            message,
        }
    }
}

pub const ERR_INSUFFICIENT_FUNDS: AbciError = AbciError::new("sdk", 5, "insufficient funds");
pub const ERR_INVALID_ADDRESS: AbciError = AbciError::new("sdk", 7, "invalid address");

fn debugging_information(resp: &TxResponse) -> String {
    let mut msg = format!("{resp:?}");
    if msg.contains("errUnknownField") {
        msg.push_str(UNKNOWN_FIELD_HINT);
    }

    msg
}

/// Checks that a delivered transaction succeeded.
pub fn assert_tx_success(resp: &TxResponse) -> Result<(), TxError> {
    if !resp.is_success() {
        return Err(TxError::Failed {
            code: resp.code,
            raw_log: debugging_information(resp),
        });
    }

    let missing = if resp.txhash.is_empty() {
        Some("txhash")
    } else if resp.gas_used == 0 {
        Some("gas_used")
    } else if resp.gas_wanted == 0 {
        Some("gas_wanted")
    } else if resp.events.is_empty() {
        Some("events")
    } else {
        None
    };

    match missing {
        Some(field) => Err(TxError::Invalid(format!("`{field}` is empty: {}", debugging_information(resp)))),
        None => Ok(()),
    }
}

/**
   Checks that a transaction failed with `expected` or one of `alternatives`.

   Codes and codespaces differ between releases, so they are only compared
   when `compare_codes` is set, i.e. both chains run the same tag. The raw log
   must always contain one of the expected messages.
*/
pub fn assert_tx_failure(
    resp: &TxResponse,
    expected: &AbciError,
    alternatives: &[AbciError],
    compare_codes: bool,
) -> Result<(), TxError> {
    if resp.is_success() {
        return Err(TxError::UnexpectedSuccess);
    }

    if compare_codes && (resp.code != expected.code || resp.codespace != expected.codespace) {
        return Err(TxError::Invalid(format!(
            "expected {}/{}, got {}/{}: {resp:?}",
            expected.codespace, expected.code, resp.codespace, resp.code
        )));
    }

    if std::iter::once(expected)
        .chain(alternatives)
        .any(|err| resp.raw_log.contains(err.message))
    {
        return Ok(());
    }

    Err(TxError::Invalid(format!(
        "expected error: {}, got: {}",
        expected.message, resp.raw_log
    )))
}

/// Returns the value of the first `key` attribute of an event of type `kind`.
pub fn extract_value_from_events<'a>(events: &'a [Event], kind: &str, key: &str) -> Option<&'a str> {
    events
        .iter()
        .filter(|event| event.kind == kind)
        .flat_map(|event| event.attributes.iter())
        .find(|attr| attr.key == key)
        .map(|attr| attr.value.as_str())
}

/**
   Calls `broadcast` until its response is not a retryable failure, at most
   `attempts` times. Errors returned by `broadcast` itself end the loop
   immediately.
*/
pub async fn retry_broadcast<F, Fut, E>(attempts: usize, mut broadcast: F) -> Result<TxResponse, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TxResponse, E>>,
{
    let mut resp = broadcast().await?;

    for attempt in 1..attempts {
        if !resp.is_retryable() {
            break;
        }

        warn!(
            "retrying tx after attempt {attempt} due to non deterministic failure: {}",
            resp.raw_log
        );

        resp = broadcast().await?;
    }

    Ok(resp)
}

/// Retries relayer signed broadcasts, which race with the relayer's own transactions.
pub async fn broadcast_with_retry<F, Fut, E>(signer_is_relayer: bool, mut broadcast: F) -> Result<TxResponse, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TxResponse, E>>,
{
    if signer_is_relayer {
        retry_broadcast(RELAYER_BROADCAST_ATTEMPTS, broadcast).await
    } else {
        broadcast().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    const CLI_OUTPUT: &str = r#"gas estimate: 123
{"height":"42","txhash":"ABCDEF","codespace":"","code":0,"data":"12","raw_log":"","logs":[],"info":"","gas_wanted":"500000","gas_used":"81234","tx":null,"timestamp":"2024-01-01T00:00:00Z","events":[{"type":"send_packet","attributes":[{"key":"packet_sequence","value":"1","index":true},{"key":"packet_src_channel","value":"channel-0","index":true}]},{"type":"message","attributes":[{"key":"action","value":"/ibc.applications.transfer.v1.MsgTransfer","index":true}]}]}"#;

    fn success() -> TxResponse {
        TxResponse::parse(CLI_OUTPUT).unwrap()
    }

    fn failure(code: u32, codespace: &str, raw_log: &str) -> TxResponse {
        TxResponse {
            code,
            codespace: codespace.to_owned(),
            raw_log: raw_log.to_owned(),
            txhash: "ABC".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_cli_output() {
        let resp = success();

        assert_eq!(resp.height, 42);
        assert_eq!(resp.gas_wanted, 500_000);
        assert_eq!(resp.gas_used, 81_234);
        assert_eq!(resp.events.len(), 2);
        assert!(resp.is_success());

        let numeric = TxResponse::parse(r#"{"height":7,"code":5,"gas_used":1}"#).unwrap();
        assert_eq!(numeric.height, 7);
        assert_eq!(numeric.code, 5);

        assert!(TxResponse::parse("Error: rpc error").is_err());
    }

    #[test]
    fn test_assert_tx_success() {
        assert!(assert_tx_success(&success()).is_ok());

        let no_events = TxResponse {
            events: Vec::new(),
            ..success()
        };
        assert!(matches!(assert_tx_success(&no_events), Err(TxError::Invalid(_))));

        let no_gas = TxResponse {
            gas_used: 0,
            ..success()
        };
        assert!(assert_tx_success(&no_gas).is_err());

        let failed = failure(5, "sdk", "insufficient funds");
        assert!(matches!(assert_tx_success(&failed), Err(TxError::Failed { code: 5, .. })));
    }

    #[test]
    fn test_unknown_field_hint() {
        let failed = failure(2, "sdk", "errUnknownField \"*types.MsgTransfer\"");

        let Err(TxError::Failed { raw_log, .. }) = assert_tx_success(&failed) else {
            panic!("expected a failure");
        };

        assert!(raw_log.contains("sanitized"));
    }

    #[test]
    fn test_assert_tx_failure() {
        let resp = failure(5, "sdk", "spendable balance 0atoma is smaller than 100atoma: insufficient funds");

        assert!(assert_tx_failure(&resp, &ERR_INSUFFICIENT_FUNDS, &[], true).is_ok());
        assert!(assert_tx_failure(&resp, &ERR_INVALID_ADDRESS, &[ERR_INSUFFICIENT_FUNDS], false).is_ok());
        assert!(assert_tx_failure(&resp, &ERR_INVALID_ADDRESS, &[], false).is_err());
        assert!(matches!(
            assert_tx_failure(&success(), &ERR_INSUFFICIENT_FUNDS, &[], false),
            Err(TxError::UnexpectedSuccess)
        ));
    }

    #[test]
    fn test_escrow_over_balance() {
        let resp = failure(
            5,
            "sdk",
            "failed to execute message; message index: 0: spendable balance 500000000000atoma is smaller than 1000000000000atoma: insufficient funds",
        );

        assert!(assert_tx_failure(&resp, &ERR_INSUFFICIENT_FUNDS, &[], true).is_ok());
        assert!(assert_tx_failure(&resp, &ERR_INVALID_ADDRESS, &[], true).is_err());
    }

    #[test]
    fn test_codes_only_compared_when_requested() {
        let resp = failure(42, "bank", "insufficient funds");

        assert!(assert_tx_failure(&resp, &ERR_INSUFFICIENT_FUNDS, &[], false).is_ok());
        assert!(assert_tx_failure(&resp, &ERR_INSUFFICIENT_FUNDS, &[], true).is_err());
    }

    #[test]
    fn test_extract_value_from_events() {
        let resp = success();

        assert_eq!(
            extract_value_from_events(&resp.events, "send_packet", "packet_src_channel"),
            Some("channel-0")
        );
        assert_eq!(extract_value_from_events(&resp.events, "send_packet", "missing"), None);
        assert_eq!(extract_value_from_events(&resp.events, "recv_packet", "packet_sequence"), None);
    }

    fn scripted(responses: Vec<TxResponse>) -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<Result<TxResponse, TxError>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let broadcast = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let resp = responses
                .get(n)
                .or(responses.last())
                .cloned()
                .unwrap_or_default();

            std::future::ready(Ok(resp))
        };

        (calls, broadcast)
    }

    #[tokio::test]
    async fn test_retry_on_sequence_mismatch() {
        let mismatch = failure(32, "sdk", "account sequence mismatch, expected 3, got 2");
        let (calls, broadcast) = scripted(vec![mismatch.clone(), mismatch, success()]);

        let resp = broadcast_with_retry(true, broadcast).await.unwrap();

        assert!(resp.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mismatch = failure(32, "sdk", "account sequence mismatch, expected 3, got 2");
        let (calls, broadcast) = scripted(vec![mismatch]);

        let resp = broadcast_with_retry(true, broadcast).await.unwrap();

        assert!(resp.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), RELAYER_BROADCAST_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_no_retry_for_other_signers_or_failures() {
        let mismatch = failure(32, "sdk", "account sequence mismatch, expected 3, got 2");
        let (calls, broadcast) = scripted(vec![mismatch]);
        broadcast_with_retry(false, broadcast).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let (calls, broadcast) = scripted(vec![failure(5, "sdk", "insufficient funds")]);
        broadcast_with_retry(true, broadcast).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let res = retry_broadcast(RELAYER_BROADCAST_ATTEMPTS, || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<TxResponse, _>(TxError::Invalid("connection refused".to_owned())))
        })
        .await;

        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
