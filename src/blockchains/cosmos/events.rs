use crate::core::config::ContractFeature;
use crate::core::utils::decode_base64_utf8;

use super::types::{AbciMessageLog, Event, EventAttribute};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedContracts {
    Extracted(Vec<String>),
    /// The chain runs a contract runtime whose events are not parsed
    Unsupported(ContractFeature),
}

impl ExecutedContracts {
    pub fn into_addresses(self) -> Vec<String> {
        match self {
            ExecutedContracts::Extracted(addresses) => addresses,
            ExecutedContracts::Unsupported(_) => Vec::new(),
        }
    }
}

/// Value of `attribute` when its key is `wanted`. Older nodes emit both key
/// and value base64 encoded, newer ones emit them as plain strings.
pub fn attribute_value(attribute: &EventAttribute, wanted: &str) -> Option<String> {
    if decode_base64_utf8(&attribute.key).as_deref() == Some(wanted) {
        return attribute.value.as_deref().and_then(decode_base64_utf8);
    }
    if attribute.key == wanted {
        return attribute.value.clone();
    }
    None
}

fn collect<'a>(
    events: impl Iterator<Item = &'a Event>,
    kind: &str,
    key: &str,
    into: &mut Vec<String>,
) {
    for event in events.filter(|e| e.kind == kind) {
        for value in event
            .attributes
            .iter()
            .filter_map(|attribute| attribute_value(attribute, key))
        {
            if !into.contains(&value) {
                into.push(value);
            }
        }
    }
}

/// `receiver` of every `coin_received` event, in first-occurrence order
pub fn recipients(logs: &[AbciMessageLog], events: &[Event]) -> Vec<String> {
    let mut recipients = Vec::new();
    if events.is_empty() {
        collect(
            logs.iter().flat_map(|log| log.events.iter()),
            "coin_received",
            "receiver",
            &mut recipients,
        );
    } else {
        collect(events.iter(), "coin_received", "receiver", &mut recipients);
    }
    recipients
}

/// Contracts a transaction executed. Secret-wasm chains prefer the
/// per-message logs and fall back to the flat event list.
pub fn executed_contracts(
    feature: ContractFeature,
    logs: &[AbciMessageLog],
    events: &[Event],
) -> ExecutedContracts {
    match feature {
        ContractFeature::None => ExecutedContracts::Extracted(Vec::new()),
        ContractFeature::Cosmwasm => ExecutedContracts::Unsupported(feature),
        ContractFeature::SecretWasm => {
            let mut contracts = Vec::new();
            if logs.is_empty() {
                collect(events.iter(), "wasm", "contract_address", &mut contracts);
            } else {
                collect(
                    logs.iter().flat_map(|log| log.events.iter()),
                    "wasm",
                    "contract_address",
                    &mut contracts,
                );
            }
            ExecutedContracts::Extracted(contracts)
        }
    }
}
