/*!
   Genesis adjustments applied before a chain starts, so that governance is
   quick enough for tests and older releases accept the IBC genesis produced
   by newer tooling.
*/

use crate::{config::DEFAULT_BINARY, error::ChainError, testvalues};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// The minimum governance deposit of test chains.
pub const DEFAULT_MIN_DEPOSIT_TOKENS: u128 = 10_000_000;

/// The client type of 08-wasm light clients.
pub const WASM_CLIENT_TYPE: &str = "08-wasm";

fn duration_json(d: Duration) -> Value {
    Value::String(format!("{}s", d.as_secs()))
}

fn object_mut<'a>(value: &'a mut Value, key: &str) -> Result<&'a mut Map<String, Value>, ChainError> {
    value
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ChainError::Genesis(format!("`{key}` is missing or not an object")))
}

/// Sets the governance params of a gov v1 genesis.
fn modify_gov_v1(gov: &mut Value, denom: &str) -> Result<(), ChainError> {
    let gov = gov
        .as_object_mut()
        .ok_or_else(|| ChainError::Genesis("`gov` is not an object".to_owned()))?;
    let params = gov.entry("params").or_insert_with(|| json!({}));
    let params = params
        .as_object_mut()
        .ok_or_else(|| ChainError::Genesis("`gov.params` is not an object".to_owned()))?;

    params.insert(
        "min_deposit".to_owned(),
        json!([{ "denom": denom, "amount": DEFAULT_MIN_DEPOSIT_TOKENS.to_string() }]),
    );
    params.insert(
        "max_deposit_period".to_owned(),
        duration_json(testvalues::MAX_DEPOSIT_PERIOD),
    );
    params.insert("voting_period".to_owned(), duration_json(testvalues::VOTING_PERIOD));

    Ok(())
}

fn modify_gov_v1beta1(gov: &mut Value, denom: &str) -> Result<(), ChainError> {
    object_mut(gov, "deposit_params")?.insert(
        "min_deposit".to_owned(),
        json!([{ "denom": denom, "amount": DEFAULT_MIN_DEPOSIT_TOKENS.to_string() }]),
    );
    object_mut(gov, "voting_params")?.insert("voting_period".to_owned(), duration_json(testvalues::VOTING_PERIOD));

    Ok(())
}

fn allow_wasm_clients(ibc: &mut Value) -> Result<(), ChainError> {
    let params = object_mut(ibc, "client_genesis")?
        .get_mut("params")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ChainError::Genesis("`client_genesis.params` is missing".to_owned()))?;

    let allowed = params
        .entry("allowed_clients")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| ChainError::Genesis("`allowed_clients` is not an array".to_owned()))?;
    allowed.push(Value::String(WASM_CLIENT_TYPE.to_owned()));

    Ok(())
}

/**
   Rewrites `genesis` for a chain running `binary` at `tag`.

   - gov: min deposit in `denom`, short deposit and voting periods, in the
     v1 layout when simd supports it and the v1beta1 layout otherwise.
   - ibc: `08-wasm` is appended to the allowed clients unless the wildcard is
     supported, and sections unknown to older releases are removed.
*/
pub fn modify_genesis(genesis: &mut Value, denom: &str, binary: &str, tag: &str) -> Result<(), ChainError> {
    let app_state = genesis
        .get_mut("app_state")
        .ok_or_else(|| ChainError::Genesis("`app_state` is missing".to_owned()))?;

    let gov = app_state
        .get_mut("gov")
        .ok_or_else(|| ChainError::Genesis("`app_state.gov` is missing".to_owned()))?;
    if binary == DEFAULT_BINARY && testvalues::GOV_GENESIS.is_supported(tag) {
        modify_gov_v1(gov, denom)?;
    } else {
        modify_gov_v1beta1(gov, denom)?;
    }

    let Some(ibc) = app_state.get_mut("ibc") else {
        return Ok(());
    };

    if !testvalues::ALLOW_ALL_CLIENTS_WILDCARD.is_supported(tag) {
        allow_wasm_clients(ibc)?;
    }

    if !testvalues::CHANNEL_PARAMS.is_supported(tag) {
        object_mut(ibc, "channel_genesis")?.remove("params");
    }

    if let Some(ibc) = ibc.as_object_mut() {
        if !testvalues::CHANNELS_V2.is_supported(tag) {
            ibc.remove("channel_v2_genesis");
        }
        if !testvalues::CLIENT_V2.is_supported(tag) {
            ibc.remove("client_v2_genesis");
        }
    }

    Ok(())
}

/// Parses, modifies and re-encodes a genesis file.
pub fn modify_genesis_bytes(genesis: &[u8], denom: &str, binary: &str, tag: &str) -> Result<Vec<u8>, ChainError> {
    let mut value: Value = serde_json::from_slice(genesis)?;

    modify_genesis(&mut value, denom, binary, tag)?;

    Ok(serde_json::to_vec_pretty(&value)?)
}
