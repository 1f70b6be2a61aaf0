//! Registry notification stream.
//!
//! Every mutating registry operation emits one or more of these events. The
//! field set and order of each variant follow the registry event signatures
//! returned by [`RegistryEvent::signature`]; they are a compatibility surface
//! for indexers and must not change silently.

use crate::{AgentId, decimal};
use ethers::types::{Address, Bytes, H256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum RegistryEvent {
    // ── identity ──
    Registered {
        agent_id: AgentId,
        #[serde(rename = "agentURI")]
        agent_uri: String,
        owner: Address,
    },
    /// The on-chain event also carries the key as a second, indexed `string`
    /// (topic 2, hashed); it is the same value as `metadata_key` and is not
    /// repeated here.
    MetadataSet {
        agent_id: AgentId,
        metadata_key: String,
        metadata_value: Bytes,
    },
    #[serde(rename = "URIUpdated")]
    UriUpdated {
        agent_id: AgentId,
        #[serde(rename = "newURI")]
        new_uri: String,
        updated_by: Address,
    },
    Transfer {
        from: Address,
        to: Address,
        agent_id: AgentId,
    },
    Approval {
        owner: Address,
        approved: Address,
        agent_id: AgentId,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },

    // ── reputation ──
    NewFeedback {
        agent_id: AgentId,
        client_address: Address,
        feedback_index: u64,
        #[serde(with = "decimal::i128_string")]
        value: i128,
        value_decimals: u8,
        tag1: String,
        tag2: String,
        endpoint: String,
        #[serde(rename = "feedbackURI")]
        feedback_uri: String,
        feedback_hash: H256,
    },
    FeedbackRevoked {
        agent_id: AgentId,
        client_address: Address,
        feedback_index: u64,
    },
    ResponseAppended {
        agent_id: AgentId,
        client_address: Address,
        feedback_index: u64,
        responder: Address,
        #[serde(rename = "responseURI")]
        response_uri: String,
        response_hash: H256,
    },

    // ── validation ──
    ValidationRequest {
        validator_address: Address,
        agent_id: AgentId,
        #[serde(rename = "requestURI")]
        request_uri: String,
        request_hash: H256,
    },
    ValidationResponse {
        validator_address: Address,
        agent_id: AgentId,
        request_hash: H256,
        response: u8,
        #[serde(rename = "responseURI")]
        response_uri: String,
        response_hash: H256,
        tag: String,
    },
}

impl RegistryEvent {
    /// Event kind, as carried in the `event` field of the JSON form.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::Registered { .. } => "Registered",
            RegistryEvent::MetadataSet { .. } => "MetadataSet",
            RegistryEvent::UriUpdated { .. } => "URIUpdated",
            RegistryEvent::Transfer { .. } => "Transfer",
            RegistryEvent::Approval { .. } => "Approval",
            RegistryEvent::ApprovalForAll { .. } => "ApprovalForAll",
            RegistryEvent::NewFeedback { .. } => "NewFeedback",
            RegistryEvent::FeedbackRevoked { .. } => "FeedbackRevoked",
            RegistryEvent::ResponseAppended { .. } => "ResponseAppended",
            RegistryEvent::ValidationRequest { .. } => "ValidationRequest",
            RegistryEvent::ValidationResponse { .. } => "ValidationResponse",
        }
    }

    /// Canonical signature; parameter order matches the variant's field order,
    /// except that `MetadataSet` lists the key twice (indexed, then plain).
    pub fn signature(&self) -> &'static str {
        match self {
            RegistryEvent::Registered { .. } => "Registered(uint256,string,address)",
            RegistryEvent::MetadataSet { .. } => "MetadataSet(uint256,string,string,bytes)",
            RegistryEvent::UriUpdated { .. } => "URIUpdated(uint256,string,address)",
            RegistryEvent::Transfer { .. } => "Transfer(address,address,uint256)",
            RegistryEvent::Approval { .. } => "Approval(address,address,uint256)",
            RegistryEvent::ApprovalForAll { .. } => "ApprovalForAll(address,address,bool)",
            RegistryEvent::NewFeedback { .. } => {
                "NewFeedback(uint256,address,uint64,int128,uint8,string,string,string,string,string,bytes32)"
            }
            RegistryEvent::FeedbackRevoked { .. } => "FeedbackRevoked(uint256,address,uint64)",
            RegistryEvent::ResponseAppended { .. } => {
                "ResponseAppended(uint256,address,uint64,address,string,bytes32)"
            }
            RegistryEvent::ValidationRequest { .. } => {
                "ValidationRequest(address,uint256,string,bytes32)"
            }
            RegistryEvent::ValidationResponse { .. } => {
                "ValidationResponse(address,uint256,bytes32,uint8,string,bytes32,string)"
            }
        }
    }

    /// keccak256 of the signature (log topic 0).
    pub fn topic(&self) -> H256 {
        H256::from(keccak256(self.signature().as_bytes()))
    }

    /// Agent the event concerns, when it concerns exactly one.
    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            RegistryEvent::Registered { agent_id, .. }
            | RegistryEvent::MetadataSet { agent_id, .. }
            | RegistryEvent::UriUpdated { agent_id, .. }
            | RegistryEvent::Transfer { agent_id, .. }
            | RegistryEvent::Approval { agent_id, .. }
            | RegistryEvent::NewFeedback { agent_id, .. }
            | RegistryEvent::FeedbackRevoked { agent_id, .. }
            | RegistryEvent::ResponseAppended { agent_id, .. }
            | RegistryEvent::ValidationRequest { agent_id, .. }
            | RegistryEvent::ValidationResponse { agent_id, .. } => Some(*agent_id),
            RegistryEvent::ApprovalForAll { .. } => None,
        }
    }
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.agent_id() {
            Some(agent_id) => write!(f, "{}(agent {})", self.name(), agent_id),
            None => write!(f, "{}", self.name()),
        }
    }
}
