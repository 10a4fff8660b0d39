use base64::{engine::general_purpose, Engine};
use prost::Message;
use std::collections::BTreeMap;
use thiserror::Error;

/// cosmos.tx.v1beta1.TxRaw, the form transactions take inside a block
#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

/// cosmos.tx.v1beta1.AuthInfo, only the fee is read
#[derive(Clone, PartialEq, Message)]
pub struct AuthInfo {
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Transaction {index} is not valid base64: {source}")]
    Base64 {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("Transaction {index} could not be decoded: {source}")]
    Decode {
        index: usize,
        #[source]
        source: prost::DecodeError,
    },

    #[error("Transaction {index} has a non-integer {denom} fee amount: {amount}")]
    InvalidAmount {
        index: usize,
        denom: String,
        amount: String,
    },

    #[error("Fee total for {0} overflows")]
    Overflow(String),
}

/// Fee of one base64 encoded TxRaw
pub fn decode_fee(index: usize, tx: &str) -> Result<Option<Fee>, ProtoError> {
    let bytes = general_purpose::STANDARD
        .decode(tx)
        .map_err(|source| ProtoError::Base64 { index, source })?;
    let raw = TxRaw::decode(bytes.as_slice()).map_err(|source| ProtoError::Decode { index, source })?;
    let auth_info = AuthInfo::decode(raw.auth_info_bytes.as_slice())
        .map_err(|source| ProtoError::Decode { index, source })?;
    Ok(auth_info.fee)
}

/// Sums the declared fees of every transaction of a block, per denom
pub fn accumulate_fees(txs: &[String]) -> Result<BTreeMap<String, u128>, ProtoError> {
    let mut totals: BTreeMap<String, u128> = BTreeMap::new();
    for (index, tx) in txs.iter().enumerate() {
        let Some(fee) = decode_fee(index, tx)? else {
            continue;
        };
        for coin in fee.amount {
            let amount = coin
                .amount
                .parse::<u128>()
                .map_err(|_| ProtoError::InvalidAmount {
                    index,
                    denom: coin.denom.clone(),
                    amount: coin.amount.clone(),
                })?;
            let total = totals.entry(coin.denom.clone()).or_insert(0);
            *total = total
                .checked_add(amount)
                .ok_or(ProtoError::Overflow(coin.denom))?;
        }
    }
    Ok(totals)
}

#[cfg(test)]
pub(crate) fn encode_tx(coins: &[(&str, &str)]) -> String {
    let auth_info = AuthInfo {
        fee: Some(Fee {
            amount: coins
                .iter()
                .map(|(denom, amount)| Coin {
                    denom: denom.to_string(),
                    amount: amount.to_string(),
                })
                .collect(),
            gas_limit: 200_000,
            payer: String::new(),
            granter: String::new(),
        }),
    };
    let raw = TxRaw {
        body_bytes: vec![0x0a, 0x00],
        auth_info_bytes: auth_info.encode_to_vec(),
        signatures: vec![vec![1u8; 64]],
    };
    general_purpose::STANDARD.encode(raw.encode_to_vec())
}
