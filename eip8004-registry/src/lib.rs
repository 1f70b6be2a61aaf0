//! EIP-8004 Trustless Agents registries
//!
//! In-process implementation of the three EIP-8004 registries:
//! - Identity Registry: ownable agent handles, metadata and a bound wallet
//! - Reputation Registry: revocable client feedback with filtered summaries
//! - Validation Registry: validator attestations on agent work requests
//!
//! Wallet bindings are authorized with EIP-712 credentials, verified either by
//! key recovery or through an ERC-1271 contract callback.

pub mod abi;
pub mod config;
pub mod context;
pub mod credential;
pub mod eip712;
pub mod events;
pub mod identity;
pub mod registries;
pub mod reputation;
pub mod signer;
pub mod validation;

#[cfg(test)]
mod scenario_tests;

pub use eip8004_types::{
    AGENT_WALLET_METADATA_KEY, AgentId, AgentIdentifier, ErrorKind, FeedbackEntry,
    FeedbackListing, FeedbackSubmission, FeedbackSummary, MAX_VALIDATION_RESPONSE,
    MAX_VALUE_DECIMALS, MetadataEntry, RegistryError, RegistryEvent, RegistryResult,
    ResponseRecord, ValidationState, ValidationStatus, ValidationSummary,
};

pub use config::RegistryConfig;
pub use context::CallContext;
pub use credential::{
    ContractAccounts, ContractDirectory, NoContracts, SignatureValidator, WalletCredential,
};
pub use eip712::{AgentWalletSet, Eip712Domain};
pub use events::EventLog;
pub use identity::{IdentityRegistry, IdentityView};
pub use registries::{Registries, SharedRegistries};
pub use reputation::ReputationRegistry;
pub use signer::WalletBindingSigner;
pub use validation::ValidationRegistry;
