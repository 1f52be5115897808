use super::{aggregate_public_keys, verify_signature, MESSAGE_LEN};
use crate::error::BlsError;
use cosmwasm_std::Binary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A query from a light client contract for BLS operations on its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomQuery {
    /// Returns the base64 aggregate of `public_keys`.
    Aggregate { public_keys: Vec<Binary> },
    /// Returns whether `signature` is an aggregate signature over `message` by all `public_keys`.
    AggregateVerify {
        public_keys: Vec<Binary>,
        signature: Binary,
        message: Binary,
    },
}

impl CustomQuery {
    /// Runs the query, returning its JSON result.
    pub fn execute(&self) -> Result<Value, BlsError> {
        match self {
            Self::Aggregate { public_keys } => {
                let aggregate = aggregate_public_keys(&as_slices(public_keys))?;

                serde_json::to_value(Binary::from(aggregate)).map_err(BlsError::Encode)
            }
            Self::AggregateVerify {
                public_keys,
                signature,
                message,
            } => {
                let message = message.as_slice();
                if message.len() != MESSAGE_LEN {
                    return Err(BlsError::InvalidMessageLength(message.len()));
                }

                verify_signature(&as_slices(public_keys), signature.as_slice(), message).map(Value::Bool)
            }
        }
    }
}

fn as_slices(keys: &[Binary]) -> Vec<&[u8]> {
    keys.iter().map(Binary::as_slice).collect()
}

/// Decodes a JSON [`CustomQuery`], runs it and encodes the result as JSON.
pub fn handle_custom_query(request: &[u8]) -> Result<Vec<u8>, BlsError> {
    let query: CustomQuery = serde_json::from_slice(request).map_err(BlsError::MalformedQuery)?;

    debug!("handling custom query {query:?}");

    serde_json::to_vec(&query.execute()?).map_err(BlsError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::tests::sign_all;
    use serde_json::json;

    fn b64(bytes: &[u8]) -> String {
        Binary::from(bytes).to_base64()
    }

    #[test]
    fn test_aggregate_query() {
        let (keys, _) = sign_all(&[1, 2], &[0; 32]);
        let request = json!({
            "aggregate": {
                "public_keys": keys.iter().map(|key| b64(key)).collect::<Vec<_>>(),
            }
        });

        let response = handle_custom_query(request.to_string().as_bytes()).unwrap();
        let expected = aggregate_public_keys(&keys).unwrap();

        assert_eq!(response, serde_json::to_vec(&b64(&expected)).unwrap());
    }

    #[test]
    fn test_aggregate_verify_query() {
        let message = [9u8; 32];
        let (keys, signature) = sign_all(&[4, 5, 6], &message);
        let request = |message: &[u8]| {
            json!({
                "aggregate_verify": {
                    "public_keys": keys.iter().map(|key| b64(key)).collect::<Vec<_>>(),
                    "signature": b64(&signature),
                    "message": b64(message),
                }
            })
            .to_string()
        };

        assert_eq!(handle_custom_query(request(&message).as_bytes()).unwrap(), b"true");
        assert_eq!(handle_custom_query(request(&[1u8; 32]).as_bytes()).unwrap(), b"false");
        assert!(matches!(
            handle_custom_query(request(&[1u8; 33]).as_bytes()),
            Err(BlsError::InvalidMessageLength(33))
        ));
    }

    #[test]
    fn test_malformed_queries() {
        for request in [
            "not json",
            r#"{"aggregate_sign": {"public_keys": []}}"#,
            r#"{"aggregate": {"public_keys": ["%%%"]}}"#,
            r#"{"aggregate_verify": {"public_keys": []}}"#,
        ] {
            assert!(
                matches!(handle_custom_query(request.as_bytes()), Err(BlsError::MalformedQuery(_))),
                "{request}"
            );
        }
    }

    #[test]
    fn test_empty_key_list() {
        let res = handle_custom_query(br#"{"aggregate": {"public_keys": []}}"#);

        assert!(matches!(res, Err(BlsError::NoPublicKeys)));
    }

    #[test]
    fn test_query_shape() {
        let query = CustomQuery::Aggregate {
            public_keys: vec![Binary::from(vec![1, 2, 3])],
        };

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"aggregate": {"public_keys": ["AQID"]}})
        );
    }
}
