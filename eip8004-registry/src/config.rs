//! EIP-8004 Configuration
//!
//! Registry addresses, chain and signing-domain settings for the registries.

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use eip8004_types::{AgentId, AgentIdentifier, RegistryError, RegistryResult};

use crate::eip712::Eip712Domain;

/// Environment variable names read by [`RegistryConfig::from_env`]
pub mod env_vars {
    pub const CHAIN_ID: &str = "EIP8004_CHAIN_ID";
    pub const IDENTITY_REGISTRY: &str = "EIP8004_IDENTITY_REGISTRY";
    pub const REPUTATION_REGISTRY: &str = "EIP8004_REPUTATION_REGISTRY";
    pub const VALIDATION_REGISTRY: &str = "EIP8004_VALIDATION_REGISTRY";
    pub const MAX_DEADLINE_DELAY: &str = "EIP8004_MAX_DEADLINE_DELAY";
}

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Typed-data domain name of the identity registry
pub const IDENTITY_DOMAIN_NAME: &str = "ERC8004IdentityRegistry";
/// Typed-data domain version of the identity registry
pub const IDENTITY_DOMAIN_VERSION: &str = "1";
/// Default upper bound on how far in the future a wallet-binding deadline may lie
pub const DEFAULT_MAX_DEADLINE_DELAY_SECS: u64 = 300;

/// EIP-8004 registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Identity Registry address (verifying contract of the signing domain)
    pub identity_registry: String,
    /// Reputation Registry address
    pub reputation_registry: String,
    /// Validation Registry address (optional)
    pub validation_registry: Option<String>,
    /// Chain ID
    pub chain_id: u64,
    /// Chain name for display
    pub chain_name: String,
    /// Wallet-binding deadlines further than this in the future are rejected
    pub max_deadline_delay_secs: u64,
}

impl RegistryConfig {
    /// Base Mainnet configuration
    pub fn base_mainnet() -> Self {
        Self {
            identity_registry: "0xa23a42D266653846e05d8f356a52298844537472".to_string(),
            reputation_registry: ZERO_ADDRESS.to_string(),
            validation_registry: None,
            chain_id: 8453,
            chain_name: "Base".to_string(),
            max_deadline_delay_secs: DEFAULT_MAX_DEADLINE_DELAY_SECS,
        }
    }

    /// Base Sepolia testnet configuration (for development)
    pub fn base_sepolia() -> Self {
        Self {
            identity_registry: ZERO_ADDRESS.to_string(),
            reputation_registry: ZERO_ADDRESS.to_string(),
            validation_registry: None,
            chain_id: 84532,
            chain_name: "Base Sepolia".to_string(),
            max_deadline_delay_secs: DEFAULT_MAX_DEADLINE_DELAY_SECS,
        }
    }

    /// Local development chain with deterministic registry addresses
    pub fn local(chain_id: u64) -> Self {
        Self {
            identity_registry: "0x8004000000000000000000000000000000000001".to_string(),
            reputation_registry: "0x8004000000000000000000000000000000000002".to_string(),
            validation_registry: Some("0x8004000000000000000000000000000000000003".to_string()),
            chain_id,
            chain_name: "Local".to_string(),
            max_deadline_delay_secs: DEFAULT_MAX_DEADLINE_DELAY_SECS,
        }
    }

    /// Load from environment or use defaults
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`RegistryConfig::from_env`], reading variables through `lookup`
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let chain_id = lookup(env_vars::CHAIN_ID)
            .and_then(|s| s.parse().ok())
            .unwrap_or(8453);

        let mut config = match chain_id {
            8453 => Self::base_mainnet(),
            84532 => Self::base_sepolia(),
            other => Self::local(other),
        };

        // Override with environment variables if set
        if let Some(addr) = lookup(env_vars::IDENTITY_REGISTRY) {
            config.identity_registry = addr;
        }
        if let Some(addr) = lookup(env_vars::REPUTATION_REGISTRY) {
            config.reputation_registry = addr;
        }
        if let Some(addr) = lookup(env_vars::VALIDATION_REGISTRY) {
            config.validation_registry = Some(addr);
        }
        if let Some(raw) = lookup(env_vars::MAX_DEADLINE_DELAY) {
            match raw.parse() {
                Ok(secs) => config.max_deadline_delay_secs = secs,
                Err(e) => log::warn!(
                    "[Config] Ignoring {}={}: {}",
                    env_vars::MAX_DEADLINE_DELAY,
                    raw,
                    e
                ),
            }
        }

        config
    }

    /// Check if contracts are deployed (not zero address)
    pub fn is_identity_deployed(&self) -> bool {
        !self.identity_registry.contains(ZERO_ADDRESS)
    }

    pub fn is_reputation_deployed(&self) -> bool {
        !self.reputation_registry.contains(ZERO_ADDRESS)
    }

    pub fn is_validation_deployed(&self) -> bool {
        self.validation_registry
            .as_ref()
            .map(|addr| !addr.contains(ZERO_ADDRESS))
            .unwrap_or(false)
    }

    /// Parsed identity registry address
    pub fn identity_address(&self) -> RegistryResult<Address> {
        Address::from_str(&self.identity_registry).map_err(|e| {
            RegistryError::invalid(format!(
                "Invalid identity registry address {}: {}",
                self.identity_registry, e
            ))
        })
    }

    /// Signing domain for wallet-binding credentials
    pub fn eip712_domain(&self) -> RegistryResult<Eip712Domain> {
        Ok(Eip712Domain {
            name: IDENTITY_DOMAIN_NAME.to_string(),
            version: IDENTITY_DOMAIN_VERSION.to_string(),
            chain_id: self.chain_id,
            verifying_contract: self.identity_address()?,
        })
    }

    /// Format agent registry string
    pub fn agent_registry_string(&self) -> String {
        format!("eip155:{}:{}", self.chain_id, self.identity_registry.to_lowercase())
    }

    /// Globally unique identifier of an agent minted by this deployment
    pub fn agent_identifier(&self, agent_id: AgentId) -> AgentIdentifier {
        AgentIdentifier::new(agent_id, self.chain_id, &self.identity_registry)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
