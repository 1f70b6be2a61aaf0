//! Shared types for the EIP-8004 agent registries.
//!
//! Records and summaries returned by the identity, reputation and validation
//! registries, the notification stream they emit, and the error taxonomy.

pub mod decimal;
pub mod error;
pub mod events;

pub use error::{ErrorKind, RegistryError, RegistryResult};
pub use events::RegistryEvent;

use ethers::types::{Address, Bytes, H256, I256};
use serde::{Deserialize, Serialize};

/// Agent identifier, minted from a dense counter starting at 1.
pub type AgentId = u64;

/// Reserved metadata key holding the agent's bound operating wallet.
pub const AGENT_WALLET_METADATA_KEY: &str = "agentWallet";

/// Highest number of decimal places a feedback value may declare.
pub const MAX_VALUE_DECIMALS: u8 = 18;

/// Highest score a validator may attest.
pub const MAX_VALIDATION_RESPONSE: u8 = 100;

/// Full agent identifier (agentRegistry + agentId)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AgentIdentifier {
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
    #[serde(rename = "agentRegistry")]
    pub agent_registry: String, // "eip155:8453:0x..."
}

impl AgentIdentifier {
    pub fn new(agent_id: AgentId, chain_id: u64, registry_address: &str) -> Self {
        let addr = registry_address.to_lowercase();
        Self {
            agent_id,
            agent_registry: format!("eip155:{}:{}", chain_id, addr),
        }
    }

    /// Parse the registry string to extract chain_id and address
    pub fn parse_registry(&self) -> Option<(u64, String)> {
        let parts: Vec<&str> = self.agent_registry.split(':').collect();
        if parts.len() == 3 && parts[0] == "eip155" {
            let chain_id = parts[1].parse().ok()?;
            Some((chain_id, parts[2].to_string()))
        } else {
            None
        }
    }
}

impl std::fmt::Display for AgentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.agent_registry, self.agent_id)
    }
}

/// Key/value pair supplied to `register` as the initial metadata batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(rename = "metadataKey")]
    pub metadata_key: String,
    #[serde(rename = "metadataValue")]
    pub metadata_value: Bytes,
}

impl MetadataEntry {
    pub fn new(key: &str, value: impl Into<Bytes>) -> Self {
        Self {
            metadata_key: key.to_string(),
            metadata_value: value.into(),
        }
    }
}

/// Arguments of a feedback submission.
///
/// `endpoint`, `feedback_uri` and `feedback_hash` are carried in the
/// `NewFeedback` notification only; the ledger stores value, decimals and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    #[serde(with = "decimal::i128_string")]
    pub value: i128,
    #[serde(rename = "valueDecimals")]
    pub value_decimals: u8,
    pub tag1: String,
    pub tag2: String,
    pub endpoint: String,
    #[serde(rename = "feedbackURI")]
    pub feedback_uri: String,
    #[serde(rename = "feedbackHash")]
    pub feedback_hash: H256,
}

impl FeedbackSubmission {
    pub fn new(value: i128, value_decimals: u8) -> Self {
        Self {
            value,
            value_decimals,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tag1: &str, tag2: &str) -> Self {
        self.tag1 = tag1.to_string();
        self.tag2 = tag2.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_uri(mut self, uri: &str, hash: H256) -> Self {
        self.feedback_uri = uri.to_string();
        self.feedback_hash = hash;
        self
    }
}

/// A stored feedback entry as returned by `read_feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    #[serde(with = "decimal::i128_string")]
    pub value: i128,
    #[serde(rename = "valueDecimals")]
    pub value_decimals: u8,
    pub tag1: String,
    pub tag2: String,
    #[serde(rename = "isRevoked")]
    pub is_revoked: bool,
}

/// Filtered aggregate over a set of clients' feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub count: u64,
    /// Sum of the matching values, widened so that it cannot overflow.
    #[serde(rename = "summaryValue", with = "decimal::i256_string")]
    pub summary_value: I256,
    /// Decimal places of the first matching entry (0 when nothing matched).
    #[serde(rename = "summaryValueDecimals")]
    pub summary_value_decimals: u8,
}

impl FeedbackSummary {
    pub fn empty() -> Self {
        Self {
            count: 0,
            summary_value: I256::zero(),
            summary_value_decimals: 0,
        }
    }
}

/// Result of `read_all_feedback`: parallel sequences in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListing {
    pub clients: Vec<Address>,
    pub feedback_indexes: Vec<u64>,
    #[serde(with = "decimal::i128_vec_string")]
    pub values: Vec<i128>,
    pub value_decimals: Vec<u8>,
    pub tag1s: Vec<String>,
    pub tag2s: Vec<String>,
    pub revoked_statuses: Vec<bool>,
}

impl FeedbackListing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            clients: Vec::with_capacity(capacity),
            feedback_indexes: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            value_decimals: Vec::with_capacity(capacity),
            tag1s: Vec::with_capacity(capacity),
            tag2s: Vec::with_capacity(capacity),
            revoked_statuses: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.feedback_indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feedback_indexes.is_empty()
    }
}

/// A response attached to a feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub responder: Address,
    #[serde(rename = "responseURI")]
    pub response_uri: String,
    #[serde(rename = "responseHash")]
    pub response_hash: H256,
}

/// Lifecycle of a validation request handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    /// Bound to a validator and agent, no response yet.
    Requested,
    /// At least one response recorded; further responses replace it.
    Responded,
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationState::Requested => write!(f, "requested"),
            ValidationState::Responded => write!(f, "responded"),
        }
    }
}

/// Current state of a validation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    #[serde(rename = "validatorAddress")]
    pub validator_address: Address,
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
    pub response: u8, // 0-100
    #[serde(rename = "responseHash")]
    pub response_hash: H256,
    pub tag: String,
    /// Timestamp of the latest response, 0 while unanswered.
    #[serde(rename = "lastUpdate")]
    pub last_update: u64,
    pub state: ValidationState,
}

impl ValidationStatus {
    pub fn has_response(&self) -> bool {
        self.state == ValidationState::Responded
    }
}

/// Filtered aggregate over an agent's answered validations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub count: u64,
    /// Floor of the mean response score, 0 when nothing matched.
    #[serde(rename = "averageResponse")]
    pub average_response: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_identifier() {
        let id = AgentIdentifier::new(42, 8453, "0x1234567890ABCDEF");
        assert_eq!(id.agent_id, 42);
        assert_eq!(id.agent_registry, "eip155:8453:0x1234567890abcdef");

        let (chain_id, addr) = id.parse_registry().unwrap();
        assert_eq!(chain_id, 8453);
        assert_eq!(addr, "0x1234567890abcdef");
        assert_eq!(id.to_string(), "eip155:8453:0x1234567890abcdef:42");
    }

    #[test]
    fn test_agent_identifier_rejects_foreign_namespace() {
        let id = AgentIdentifier {
            agent_id: 1,
            agent_registry: "solana:mainnet:abc".to_string(),
        };
        assert!(id.parse_registry().is_none());
    }

    #[test]
    fn test_feedback_submission_builder() {
        let hash = H256::repeat_byte(0xab);
        let submission = FeedbackSubmission::new(-250, 2)
            .with_tags("latency", "p95")
            .with_endpoint("https://agent.example/mcp")
            .with_uri("ipfs://QmFeedback", hash);

        assert_eq!(submission.value, -250);
        assert_eq!(submission.value_decimals, 2);
        assert_eq!(submission.tag1, "latency");
        assert_eq!(submission.tag2, "p95");
        assert_eq!(submission.feedback_hash, hash);
    }

    #[test]
    fn test_feedback_summary_serializes_sum_as_decimal() {
        let summary = FeedbackSummary {
            count: 2,
            summary_value: I256::from(-170141183460469231731687303715884105728i128)
                + I256::from(-1i128),
            summary_value_decimals: 0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["summaryValue"], "-170141183460469231731687303715884105729");

        let back: FeedbackSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn test_validation_status_state() {
        let status = ValidationStatus {
            validator_address: Address::from_low_u64_be(7),
            agent_id: 1,
            response: 0,
            response_hash: H256::zero(),
            tag: String::new(),
            last_update: 0,
            state: ValidationState::Requested,
        };
        assert!(!status.has_response());
        assert_eq!(status.state.to_string(), "requested");
    }
}
