use base64::{engine::general_purpose, Engine};
use bech32::{Bech32, Hrp};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::PublicKey;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Invalid base64 public key: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid bech32 prefix {prefix}: {reason}")]
    Prefix { prefix: String, reason: String },

    #[error("Could not bech32 encode address: {0}")]
    Encode(String),
}

/// bech32(prefix, ripemd160(sha256(pubkey))), the Cosmos account address of a secp256k1 key
pub fn account_address(prefix: &str, public_key: &[u8]) -> Result<String, AddressError> {
    let hrp = Hrp::parse(prefix).map_err(|e| AddressError::Prefix {
        prefix: prefix.to_string(),
        reason: e.to_string(),
    })?;
    let hash = Ripemd160::digest(Sha256::digest(public_key));
    bech32::encode::<Bech32>(hrp, &hash).map_err(|e| AddressError::Encode(e.to_string()))
}

/// Addresses a signer key stands for. Multisig keys yield one address per
/// secp256k1 member; any other key type yields none.
pub fn signer_addresses(prefix: &str, key: &PublicKey) -> Result<Vec<String>, AddressError> {
    match key {
        PublicKey::Secp256k1 { key } => {
            let bytes = general_purpose::STANDARD.decode(key)?;
            Ok(vec![account_address(prefix, &bytes)?])
        }
        PublicKey::LegacyAminoMultisig { public_keys, .. } => {
            let mut addresses = Vec::new();
            for member in public_keys {
                if let PublicKey::Secp256k1 { key } = member {
                    let bytes = general_purpose::STANDARD.decode(key)?;
                    addresses.push(account_address(prefix, &bytes)?);
                }
            }
            Ok(addresses)
        }
        PublicKey::Unsupported => Ok(Vec::new()),
    }
}

/// Upper-case hex of the first 20 bytes of sha256(pubkey), as CometBFT reports validators
pub fn consensus_address(public_key_b64: &str) -> Result<String, AddressError> {
    let bytes = general_purpose::STANDARD.decode(public_key_b64)?;
    let hash = Sha256::digest(bytes);
    Ok(hex::encode_upper(&hash[..20]))
}
