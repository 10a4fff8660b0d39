use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// CometBFT RPC answers either wrapped in a JSON-RPC envelope or bare,
/// depending on the node version and any proxy in front of it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse<T> {
    Wrapped { result: T },
    Bare(T),
}

impl<T> RpcResponse<T> {
    pub fn into_inner(self) -> T {
        match self {
            RpcResponse::Wrapped { result } => result,
            RpcResponse::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusResult {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
pub struct NodeInfo {
    pub network: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: String,
    pub earliest_block_height: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockResult {
    pub block_id: BlockId,
    pub block: Block,
}

#[derive(Debug, Deserialize)]
pub struct BlockId {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
}

#[derive(Debug, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BlockData {
    /// null on empty blocks for some node versions
    #[serde(default)]
    pub txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct BlockResultsResult {
    #[serde(default)]
    pub txs_results: Option<Vec<TxExecResult>>,
}

#[derive(Debug, Deserialize)]
pub struct TxExecResult {
    #[serde(default)]
    pub gas_wanted: String,
    #[serde(default)]
    pub gas_used: String,
}

/// LCD `/cosmos/tx/v1beta1/txs`. `txs` and `tx_responses` are parallel arrays.
#[derive(Debug, Deserialize)]
pub struct TxSearchResponse {
    #[serde(default)]
    pub txs: Vec<Value>,
    #[serde(default)]
    pub tx_responses: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
}

#[derive(Debug, Deserialize)]
pub struct TxBody {
    #[serde(default)]
    pub messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

#[derive(Debug, Deserialize)]
pub struct SignerInfo {
    #[serde(default)]
    pub public_key: Option<PublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "@type")]
pub enum PublicKey {
    #[serde(rename = "/cosmos.crypto.secp256k1.PubKey")]
    Secp256k1 { key: String },

    #[serde(rename = "/cosmos.crypto.multisig.LegacyAminoPubKey")]
    LegacyAminoMultisig {
        #[serde(default)]
        threshold: u32,
        public_keys: Vec<PublicKey>,
    },

    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
pub struct Fee {
    #[serde(default)]
    pub amount: Vec<Coin>,
    #[serde(default)]
    pub gas_limit: String,
    #[serde(default)]
    pub payer: String,
    #[serde(default)]
    pub granter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct TxResponse {
    pub height: String,
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub gas_used: String,
    #[serde(default)]
    pub logs: Vec<AbciMessageLog>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbciMessageLog {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventAttribute {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidatorsResponse {
    pub validators: Vec<LcdValidator>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub struct LcdValidator {
    pub operator_address: String,
    #[serde(default)]
    pub consensus_pubkey: Option<ConsensusPubkey>,
    #[serde(default)]
    pub jailed: bool,
    pub status: String,
    pub tokens: String,
    pub delegator_shares: String,
    pub description: ValidatorDescription,
    pub commission: Commission,
}

#[derive(Debug, Deserialize)]
pub struct ConsensusPubkey {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidatorDescription {
    #[serde(default)]
    pub moniker: String,
}

#[derive(Debug, Deserialize)]
pub struct Commission {
    pub commission_rates: CommissionRates,
}

#[derive(Debug, Deserialize)]
pub struct CommissionRates {
    pub rate: String,
}

#[derive(Debug, Deserialize)]
pub struct ProposalsResponse {
    pub proposals: Vec<Value>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub struct LcdProposal {
    pub proposal_id: String,
    #[serde(default)]
    pub content: Option<ProposalContent>,
    pub status: String,
    #[serde(default)]
    pub submit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voting_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voting_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ProposalContent {
    #[serde(default)]
    pub title: String,
}

/// `/compute/v1beta1/info/{address}` on secret-wasm chains
#[derive(Debug, Deserialize)]
pub struct SecretContractInfoResponse {
    pub contract_address: String,
    pub contract_info: SecretContractInfo,
}

#[derive(Debug, Deserialize)]
pub struct SecretContractInfo {
    pub code_id: String,
    pub creator: String,
    #[serde(default)]
    pub label: String,
}

/// `/cosmwasm/wasm/v1/contract/{address}`
#[derive(Debug, Deserialize)]
pub struct WasmContractInfoResponse {
    pub address: String,
    pub contract_info: WasmContractInfo,
}

#[derive(Debug, Deserialize)]
pub struct WasmContractInfo {
    pub code_id: String,
    pub creator: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct SmartQueryResponse<T> {
    pub data: T,
}

/// CW721 `{"num_tokens":{}}` answer
#[derive(Debug, Deserialize)]
pub struct NumTokens {
    pub count: u64,
}
