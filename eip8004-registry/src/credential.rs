//! Wallet-binding credential verification
//!
//! A binding credential is checked one of two ways, chosen by whether code
//! is deployed at the proposed wallet address:
//! - key-bound wallets must supply a 65-byte `r ++ s ++ v` signature over the
//!   typed-data digest that recovers to the wallet itself
//! - contract-bound wallets are asked through `isValidSignature` and must
//!   answer with the ERC-1271 magic value

use std::collections::HashMap;

use ethers::types::{Address, H256, Signature, U256};

use eip8004_types::{RegistryError, RegistryResult};

use crate::abi::ERC1271_MAGIC_VALUE;
use crate::identity::IdentityRegistry;

/// Length of an `r ++ s ++ v` signature
pub const SIGNATURE_LENGTH: usize = 65;

/// secp256k1 group order divided by two; larger `s` values are malleable
const SECP256K1_HALF_ORDER: U256 = U256([
    0xDFE92F46681B20A0,
    0x5D576E7357A4501D,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
]);

/// Account code answering ERC-1271 signature checks.
///
/// `registry` is the identity registry as it stands before the binding under
/// verification is applied. Implementations may read it but cannot mutate it.
pub trait SignatureValidator: Send + Sync {
    fn is_valid_signature(
        &self,
        registry: &IdentityRegistry,
        hash: H256,
        signature: &[u8],
    ) -> Result<[u8; 4], String>;
}

/// Lookup of code deployed at an address.
pub trait ContractAccounts: Send + Sync {
    fn contract_at(&self, address: Address) -> Option<&dyn SignatureValidator>;
}

/// Host with no contract accounts; every wallet is key-bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContracts;

impl ContractAccounts for NoContracts {
    fn contract_at(&self, _address: Address) -> Option<&dyn SignatureValidator> {
        None
    }
}

/// In-memory set of contract accounts keyed by address.
#[derive(Default)]
pub struct ContractDirectory {
    contracts: HashMap<Address, Box<dyn SignatureValidator>>,
}

impl ContractDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy(&mut self, address: Address, contract: impl SignatureValidator + 'static) {
        log::debug!("[Credential] Contract account registered at {:?}", address);
        self.contracts.insert(address, Box::new(contract));
    }

    pub fn with_contract(
        mut self,
        address: Address,
        contract: impl SignatureValidator + 'static,
    ) -> Self {
        self.deploy(address, contract);
        self
    }
}

impl ContractAccounts for ContractDirectory {
    fn contract_at(&self, address: Address) -> Option<&dyn SignatureValidator> {
        self.contracts.get(&address).map(|contract| contract.as_ref())
    }
}

/// How a proposed wallet proves consent to a binding.
pub enum WalletCredential<'a> {
    KeyBound {
        wallet: Address,
    },
    ContractBound {
        wallet: Address,
        contract: &'a dyn SignatureValidator,
    },
}

impl<'a> WalletCredential<'a> {
    pub fn resolve(wallet: Address, accounts: &'a dyn ContractAccounts) -> Self {
        match accounts.contract_at(wallet) {
            Some(contract) => WalletCredential::ContractBound { wallet, contract },
            None => WalletCredential::KeyBound { wallet },
        }
    }

    pub fn is_contract(&self) -> bool {
        matches!(self, WalletCredential::ContractBound { .. })
    }

    pub fn verify(
        &self,
        registry: &IdentityRegistry,
        digest: H256,
        credential: &[u8],
    ) -> RegistryResult<()> {
        match self {
            WalletCredential::KeyBound { wallet } => {
                let signer = recover_signer(digest, credential)?;
                if signer != *wallet {
                    return Err(RegistryError::signature(format!(
                        "Recovered signer {:?} does not match wallet {:?}",
                        signer, wallet
                    )));
                }
                Ok(())
            }
            WalletCredential::ContractBound { wallet, contract } => {
                match contract.is_valid_signature(registry, digest, credential) {
                    Ok(value) if value == ERC1271_MAGIC_VALUE => Ok(()),
                    Ok(value) => Err(RegistryError::signature(format!(
                        "Contract wallet {:?} returned 0x{} instead of the ERC-1271 magic value",
                        wallet,
                        hex::encode(value)
                    ))),
                    Err(e) => Err(RegistryError::signature(format!(
                        "isValidSignature on {:?} failed: {}",
                        wallet, e
                    ))),
                }
            }
        }
    }
}

/// Recover the signer of `digest` from a 65-byte signature.
///
/// Rejects any other length, recovery ids other than 27/28 and high-`s`
/// signatures.
pub fn recover_signer(digest: H256, credential: &[u8]) -> RegistryResult<Address> {
    if credential.len() != SIGNATURE_LENGTH {
        return Err(RegistryError::signature(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            credential.len()
        )));
    }

    let v = credential[64];
    if v != 27 && v != 28 {
        return Err(RegistryError::signature(format!("Invalid recovery id {}", v)));
    }

    let signature = Signature::try_from(credential)
        .map_err(|e| RegistryError::signature(format!("Malformed signature: {}", e)))?;

    if signature.s > SECP256K1_HALF_ORDER {
        return Err(RegistryError::signature("Signature s value is not canonical"));
    }

    signature
        .recover(digest)
        .map_err(|e| RegistryError::signature(format!("Signature recovery failed: {}", e)))
}
