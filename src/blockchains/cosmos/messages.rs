use serde::Deserialize;
use serde_json::Value;

use super::types::Coin;

/// Messages the explorer understands field by field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type")]
pub enum KnownMessage {
    #[serde(rename = "/cosmos.bank.v1beta1.MsgSend")]
    BankSend {
        from_address: String,
        to_address: String,
        #[serde(default)]
        amount: Vec<Coin>,
    },

    #[serde(rename = "/cosmos.staking.v1beta1.MsgDelegate")]
    Delegate {
        delegator_address: String,
        validator_address: String,
    },

    #[serde(rename = "/cosmos.staking.v1beta1.MsgUndelegate")]
    Undelegate {
        delegator_address: String,
        validator_address: String,
    },

    #[serde(rename = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward")]
    WithdrawDelegatorReward {
        delegator_address: String,
        validator_address: String,
    },

    #[serde(rename = "/cosmos.gov.v1beta1.MsgVote")]
    Vote {
        proposal_id: String,
        voter: String,
    },

    #[serde(rename = "/secret.compute.v1beta1.MsgExecuteContract")]
    SecretExecuteContract {
        sender: String,
        contract: String,
    },

    #[serde(rename = "/secret.compute.v1beta1.MsgInstantiateContract")]
    SecretInstantiateContract {
        sender: String,
        code_id: String,
        #[serde(default)]
        label: String,
    },

    #[serde(rename = "/cosmwasm.wasm.v1.MsgExecuteContract")]
    WasmExecuteContract {
        sender: String,
        contract: String,
    },

    #[serde(rename = "/cosmwasm.wasm.v1.MsgInstantiateContract")]
    WasmInstantiateContract {
        sender: String,
        code_id: String,
        #[serde(default)]
        label: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxMessage {
    Known(KnownMessage),
    Other {
        type_url: String,
        sender: Option<String>,
    },
}

impl TxMessage {
    /// Known type URLs with the expected shape become `Known`, anything else
    /// keeps its type URL and a `sender` if it has one.
    pub fn from_value(value: &Value) -> Self {
        if let Ok(known) = KnownMessage::deserialize(value) {
            return TxMessage::Known(known);
        }
        TxMessage::Other {
            type_url: value
                .get("@type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            sender: value
                .get("sender")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn type_url(&self) -> &str {
        match self {
            TxMessage::Known(known) => match known {
                KnownMessage::BankSend { .. } => "/cosmos.bank.v1beta1.MsgSend",
                KnownMessage::Delegate { .. } => "/cosmos.staking.v1beta1.MsgDelegate",
                KnownMessage::Undelegate { .. } => "/cosmos.staking.v1beta1.MsgUndelegate",
                KnownMessage::WithdrawDelegatorReward { .. } => {
                    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward"
                }
                KnownMessage::Vote { .. } => "/cosmos.gov.v1beta1.MsgVote",
                KnownMessage::SecretExecuteContract { .. } => {
                    "/secret.compute.v1beta1.MsgExecuteContract"
                }
                KnownMessage::SecretInstantiateContract { .. } => {
                    "/secret.compute.v1beta1.MsgInstantiateContract"
                }
                KnownMessage::WasmExecuteContract { .. } => "/cosmwasm.wasm.v1.MsgExecuteContract",
                KnownMessage::WasmInstantiateContract { .. } => {
                    "/cosmwasm.wasm.v1.MsgInstantiateContract"
                }
            },
            TxMessage::Other { type_url, .. } => type_url,
        }
    }

    /// The `sender` field, for messages that declare one
    pub fn sender(&self) -> Option<&str> {
        match self {
            TxMessage::Known(KnownMessage::SecretExecuteContract { sender, .. })
            | TxMessage::Known(KnownMessage::SecretInstantiateContract { sender, .. })
            | TxMessage::Known(KnownMessage::WasmExecuteContract { sender, .. })
            | TxMessage::Known(KnownMessage::WasmInstantiateContract { sender, .. }) => {
                Some(sender)
            }
            TxMessage::Known(_) => None,
            TxMessage::Other { sender, .. } => sender.as_deref(),
        }
    }
}

/// Senders of all messages, de-duplicated in first-occurrence order
pub fn senders(messages: &[TxMessage]) -> Vec<String> {
    let mut senders: Vec<String> = Vec::new();
    for sender in messages.iter().filter_map(TxMessage::sender) {
        if !senders.iter().any(|s| s == sender) {
            senders.push(sender.to_string());
        }
    }
    senders
}
