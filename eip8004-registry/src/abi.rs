//! Common ABI encoding utilities

use ethers::types::{Address, Bytes};
use ethers::utils::keccak256 as ethers_keccak256;

/// Selector of `isValidSignature(bytes32,bytes)`, also the ERC-1271 success value
pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Compute function selector (first 4 bytes of keccak256 hash)
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = ethers_keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Tightly packed address (20 bytes), the stored form of a wallet binding
pub fn encode_address_packed(address: Address) -> Bytes {
    Bytes::from(address.as_bytes().to_vec())
}

/// Decode a packed address; anything other than 20 bytes is "no address"
pub fn decode_address_packed(data: &[u8]) -> Option<Address> {
    if data.len() != 20 {
        return None;
    }
    Some(Address::from_slice(data))
}
