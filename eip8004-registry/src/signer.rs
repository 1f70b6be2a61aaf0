//! Local signer for wallet-binding credentials
//!
//! Produces the credential a key-bound wallet hands to its agent's owner so
//! the owner can call `set_agent_wallet` on its behalf.

use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256};

use eip8004_types::{AgentId, RegistryError, RegistryResult};

use crate::eip712::{AgentWalletSet, Eip712Domain};

pub struct WalletBindingSigner {
    wallet: LocalWallet,
}

impl WalletBindingSigner {
    /// Create a signer from a hex private key, with or without `0x`
    pub fn from_private_key(private_key: &str) -> RegistryResult<Self> {
        let key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);

        let key_bytes = hex::decode(key_hex)
            .map_err(|e| RegistryError::signature(format!("Invalid private key hex: {}", e)))?;

        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| RegistryError::signature(format!("Invalid private key: {}", e)))?;

        Ok(Self {
            wallet: LocalWallet::from(signing_key),
        })
    }

    pub fn from_wallet(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign a raw 32-byte digest, returning `r ++ s ++ v`
    pub fn sign_digest(&self, digest: H256) -> RegistryResult<Bytes> {
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| RegistryError::signature(format!("Failed to sign digest: {}", e)))?;
        Ok(Bytes::from(signature.to_vec()))
    }

    /// Consent to becoming `agent_id`'s wallet until `deadline`
    pub fn sign_wallet_binding(
        &self,
        domain: &Eip712Domain,
        agent_id: AgentId,
        deadline: u64,
    ) -> RegistryResult<Bytes> {
        let message = AgentWalletSet {
            agent_id,
            new_wallet: self.address(),
            deadline,
        };
        log::debug!(
            "[Signer] Signing AgentWalletSet for agent {} wallet {:?} deadline {}",
            agent_id,
            message.new_wallet,
            deadline
        );
        self.sign_digest(message.digest(domain))
    }
}
