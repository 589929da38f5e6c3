use crate::command::Command;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Single log entry: a command plus the digest of its canonical form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedRecord {
    pub value: Command,
    pub hash: String,
}

impl HashedRecord {
    pub fn new(value: Command) -> Self {
        let hash = content_hash(&value.canonical_bytes());

        Self { value, hash }
    }

    /// Digest the stored value would have today
    pub fn computed_hash(&self) -> String {
        content_hash(&self.value.canonical_bytes())
    }

    pub fn verify(&self) -> bool {
        self.computed_hash() == self.hash
    }
}

/// Hex-encoded SHA-256 of `data`
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_hash_is_deterministic() {
        let data = br#"{"amount":100,"cmd":"deposit"}"#;

        assert_eq!(content_hash(data), content_hash(data));
        assert_eq!(content_hash(data).len(), 64);
    }

    #[test]
    fn test_single_byte_change_changes_hash() {
        let original = br#"{"amount":100,"cmd":"deposit"}"#;
        let mutated = br#"{"amount":101,"cmd":"deposit"}"#;

        assert_ne!(content_hash(original), content_hash(mutated));
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_identical_values_hash_identically() {
        let a = HashedRecord::new(Command::Deposit {
            amount: Decimal::from(50),
        });
        let b = HashedRecord::new(Command::Deposit {
            amount: Decimal::from(50),
        });

        assert_eq!(a.hash, b.hash);
        assert!(a.verify());
    }

    #[test]
    fn test_tampered_value_fails_verification() {
        let mut record = HashedRecord::new(Command::Withdraw {
            amount: Decimal::from(10),
        });
        record.value = Command::Withdraw {
            amount: Decimal::from(1),
        };

        assert!(!record.verify());
    }

    #[test]
    fn test_json_shape() {
        let record = HashedRecord::new(Command::Deposit {
            amount: Decimal::from(100),
        });
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["value"], serde_json::json!({ "cmd": "deposit", "amount": 100 }));
        assert_eq!(json["hash"], record.hash.as_str());
    }
}
