/*!
   BLS12-381 public key aggregation and signature verification, delegated to
   `blst` with public keys in G1 and signatures in G2.
*/

use crate::error::BlsError;
use blst::{
    min_pk::{AggregatePublicKey, PublicKey, Signature},
    BLST_ERROR,
};

pub mod query;

pub use query::{handle_custom_query, CustomQuery};

/// Domain separation tag of the Ethereum proof of possession scheme.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Length of the messages that signatures are checked against.
pub const MESSAGE_LEN: usize = 32;

pub const PUBLIC_KEY_LEN: usize = 48;

pub const SIGNATURE_LEN: usize = 96;

fn decode_public_keys<K: AsRef<[u8]>>(keys: &[K]) -> Result<Vec<PublicKey>, BlsError> {
    if keys.is_empty() {
        return Err(BlsError::NoPublicKeys);
    }

    keys.iter()
        .enumerate()
        .map(|(index, key)| {
            PublicKey::key_validate(key.as_ref()).map_err(|err| BlsError::InvalidPublicKey {
                index,
                reason: format!("{err:?}"),
            })
        })
        .collect()
}

fn aggregate(keys: &[PublicKey]) -> Result<PublicKey, BlsError> {
    let refs = keys.iter().collect::<Vec<_>>();

    AggregatePublicKey::aggregate(&refs, false)
        .map(|agg| agg.to_public_key())
        .map_err(|err| BlsError::Aggregation(format!("{err:?}")))
}

/// Aggregates compressed public keys into one compressed key.
pub fn aggregate_public_keys<K: AsRef<[u8]>>(keys: &[K]) -> Result<Vec<u8>, BlsError> {
    let keys = decode_public_keys(keys)?;

    Ok(aggregate(&keys)?.compress().to_vec())
}

/**
   Returns true if `signature` is an aggregate signature over `message` by
   every holder of `keys`.

   Malformed keys or signatures and messages that are not 32 bytes are errors.
   A well formed signature that does not verify is `Ok(false)`.
*/
pub fn verify_signature<K: AsRef<[u8]>>(keys: &[K], signature: &[u8], message: &[u8]) -> Result<bool, BlsError> {
    if message.len() != MESSAGE_LEN {
        return Err(BlsError::InvalidMessageLength(message.len()));
    }

    let keys = decode_public_keys(keys)?;
    let aggregate_key = aggregate(&keys)?;

    let signature =
        Signature::sig_validate(signature, true).map_err(|err| BlsError::InvalidSignature(format!("{err:?}")))?;

    let res = signature.verify(true, message, DST, &[], &aggregate_key, false);

    Ok(res == BLST_ERROR::BLST_SUCCESS)
}
