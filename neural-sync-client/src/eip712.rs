use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use serde::Serialize;

/// Validity window of a decryption authorization.
pub const DEFAULT_DECRYPT_DURATION_DAYS: u64 = 365;

const DECRYPTION_DOMAIN_NAME: &str = "Decryption";
const DECRYPTION_DOMAIN_VERSION: &str = "1";

// Struct needs to match the user decryption verification of the gateway
// contracts, the name is the EIP-712 primary type.
sol! {
    #[derive(Debug, Serialize, PartialEq, Eq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
    }
}

/// Domain of the user decryption authorization: bound to the gateway chain
/// and the decryption verifying contract.
pub fn decryption_domain(gateway_chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(DECRYPTION_DOMAIN_NAME.into()),
        Some(DECRYPTION_DOMAIN_VERSION.into()),
        Some(U256::from(gateway_chain_id)),
        Some(verifying_contract),
        None,
    )
}

/// Sorted, deduplicated contract list of a decryption batch.
///
/// Byte order of an address is the order of its lowercase hex form, so the
/// list is the same whatever the order or case the call site used.
pub fn deterministic_contract_addresses<I>(addresses: I) -> Vec<Address>
where
    I: IntoIterator<Item = Address>,
{
    let mut unique: Vec<Address> = addresses.into_iter().collect();
    unique.sort_unstable();
    unique.dedup();
    unique
}

/// EIP-712 authorization signed once per decryption batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptAuthorization {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequestVerification,
}

impl DecryptAuthorization {
    pub fn new(
        domain: Eip712Domain,
        public_key: Bytes,
        contract_addresses: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        Self {
            domain,
            message: UserDecryptRequestVerification {
                publicKey: public_key,
                contractAddresses: contract_addresses,
                startTimestamp: U256::from(start_timestamp),
                durationDays: U256::from(duration_days),
            },
        }
    }

    pub fn primary_type(&self) -> &'static str {
        UserDecryptRequestVerification::NAME
    }

    /// EIP-712 type string, `UserDecryptRequestVerification(bytes publicKey,...)`.
    pub fn encode_type(&self) -> String {
        UserDecryptRequestVerification::eip712_encode_type().into_owned()
    }

    pub fn contract_addresses(&self) -> &[Address] {
        &self.message.contractAddresses
    }

    /// Digest the wallet signs.
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }

    /// JSON typed data (`types`, `primaryType`, `domain`, `message`) as
    /// expected by `eth_signTypedData_v4`.
    pub fn to_typed_data(&self) -> TypedData {
        TypedData::from_struct(&self.message, Some(self.domain.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    #[test]
    fn test_contract_addresses_are_deterministic() {
        let x = addr("0x786ae7f804e7cfd55e4bab6f4a812980bb8c705c");
        let y = addr("0x1111111111111111111111111111111111111111");
        let first = deterministic_contract_addresses([x, y]);
        let second = deterministic_contract_addresses([y, x, y]);
        assert_eq!(first, vec![y, x]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_same_set_same_digest() {
        let domain = decryption_domain(10901, Address::repeat_byte(0x5d));
        let x = Address::repeat_byte(0xcc);
        let y = Address::repeat_byte(0x0b);
        let key = Bytes::from_static(&[1, 2, 3]);

        let a = DecryptAuthorization::new(
            domain.clone(),
            key.clone(),
            deterministic_contract_addresses([x, y]),
            1_700_000_000,
            DEFAULT_DECRYPT_DURATION_DAYS,
        );
        let b = DecryptAuthorization::new(
            domain.clone(),
            key.clone(),
            deterministic_contract_addresses([y, x]),
            1_700_000_000,
            DEFAULT_DECRYPT_DURATION_DAYS,
        );
        assert_eq!(a, b);
        assert_eq!(a.signing_hash(), b.signing_hash());

        // the validity window is part of what gets signed
        let later = DecryptAuthorization::new(
            domain,
            key,
            deterministic_contract_addresses([y, x]),
            1_700_000_001,
            DEFAULT_DECRYPT_DURATION_DAYS,
        );
        assert_ne!(a.signing_hash(), later.signing_hash());
    }

    #[test]
    fn test_domain_and_type() {
        let domain = decryption_domain(10901, Address::repeat_byte(0x5d));
        assert_eq!(domain.name.as_deref(), Some("Decryption"));
        assert_eq!(domain.version.as_deref(), Some("1"));
        assert_eq!(domain.chain_id, Some(U256::from(10901)));

        let auth = DecryptAuthorization::new(domain, Bytes::new(), vec![], 0, 365);
        assert_eq!(auth.primary_type(), "UserDecryptRequestVerification");
        assert_eq!(
            auth.encode_type(),
            "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays)"
        );
    }
}
