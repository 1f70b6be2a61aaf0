//! EIP-712 typed-data digests for wallet-binding credentials

use ethers::abi::{self, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

use eip8004_types::AgentId;

const EIP712_DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const AGENT_WALLET_SET_TYPE: &[u8] =
    b"AgentWalletSet(uint256 agentId,address newWallet,uint256 deadline)";

/// Signing domain: scopes a credential to one registry instance on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> H256 {
        let type_hash = keccak256(EIP712_DOMAIN_TYPE);
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());

        let encoded = abi::encode(&[
            Token::FixedBytes(type_hash.to_vec()),
            Token::FixedBytes(name_hash.to_vec()),
            Token::FixedBytes(version_hash.to_vec()),
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.verifying_contract),
        ]);

        H256::from(keccak256(&encoded))
    }
}

/// `AgentWalletSet` message authorizing `new_wallet` as the agent's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentWalletSet {
    pub agent_id: AgentId,
    pub new_wallet: Address,
    pub deadline: u64,
}

impl AgentWalletSet {
    pub fn struct_hash(&self) -> H256 {
        let type_hash = keccak256(AGENT_WALLET_SET_TYPE);

        let encoded = abi::encode(&[
            Token::FixedBytes(type_hash.to_vec()),
            Token::Uint(U256::from(self.agent_id)),
            Token::Address(self.new_wallet),
            Token::Uint(U256::from(self.deadline)),
        ]);

        H256::from(keccak256(&encoded))
    }

    /// keccak256("\x19\x01" ++ domainSeparator ++ structHash)
    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        typed_data_digest(domain.separator(), self.struct_hash())
    }
}

pub fn typed_data_digest(domain_separator: H256, struct_hash: H256) -> H256 {
    let mut to_sign = Vec::with_capacity(66);
    to_sign.push(0x19);
    to_sign.push(0x01);
    to_sign.extend_from_slice(domain_separator.as_bytes());
    to_sign.extend_from_slice(struct_hash.as_bytes());
    H256::from(keccak256(&to_sign))
}
