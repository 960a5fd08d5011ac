use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::fmt;

use super::crypto::Address;
use super::encoding::CanonicalEncode;

/// Sender identifier reserved for mining rewards
pub const MINING_SENDER: &str = "BLOCKCHAIN REWARD SYSTEM";

/// Represents a value transfer between two addresses
///
/// Fields are private so a transaction cannot change after it has been
/// hashed or signed. The serde field names and their order are part of the
/// canonical encoding; `recepient` keeps the spelling existing chains use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address
    #[serde(rename = "sender_blockchain_address")]
    sender: Address,

    /// Recipient's address
    #[serde(rename = "recepient_blockchain_address")]
    recipient: Address,

    /// Amount being transferred
    value: f32,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `recipient` - The address of the recipient
    /// * `value` - The amount to transfer
    pub fn new(sender: impl Into<Address>, recipient: impl Into<Address>, value: f32) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            value,
        }
    }

    /// Creates a mining reward paid by the reserved reward sender
    pub fn reward(recipient: impl Into<Address>, value: f32) -> Self {
        Transaction::new(MINING_SENDER, recipient, value)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.as_str() == MINING_SENDER
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Checks that the value has a canonical encoding
    ///
    /// JSON has no infinities or NaN; serde_json writes all of them as
    /// `null`, so such transactions would share one digest.
    pub fn has_encodable_value(&self) -> bool {
        self.value.is_finite()
    }
}

impl CanonicalEncode for Transaction {}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.recipient, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let transaction = Transaction::new("Rick", "Morty", 127.0);

        assert_eq!(transaction.sender().as_str(), "Rick");
        assert_eq!(transaction.recipient().as_str(), "Morty");
        assert_eq!(transaction.value(), 127.0);
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_reward_transaction() {
        let transaction = Transaction::reward("miner", 1.0);

        assert_eq!(transaction.sender().as_str(), MINING_SENDER);
        assert_eq!(transaction.recipient().as_str(), "miner");
        assert!(transaction.is_reward());
    }

    #[test]
    fn test_canonical_bytes_layout() {
        let transaction = Transaction::new("Rick", "Morty", 127.0);
        let encoded = String::from_utf8(transaction.canonical_bytes()).unwrap();

        assert_eq!(
            encoded,
            r#"{"sender_blockchain_address":"Rick","recepient_blockchain_address":"Morty","value":127.0}"#
        );
    }

    #[test]
    fn test_non_finite_values_are_not_encodable() {
        assert!(Transaction::new("Rick", "Morty", f32::MAX).has_encodable_value());
        assert!(Transaction::new("Rick", "Morty", -0.0).has_encodable_value());

        for value in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            let transaction = Transaction::new("Rick", "Morty", value);
            assert!(!transaction.has_encodable_value());
            // All three collapse onto the same bytes
            assert_eq!(
                transaction.canonical_digest(),
                Transaction::new("Rick", "Morty", f32::INFINITY).canonical_digest()
            );
        }
    }

    #[test]
    fn test_digest_tracks_every_field() {
        let base = Transaction::new("Rick", "Morty", 127.0).canonical_digest();

        assert_eq!(base, Transaction::new("Rick", "Morty", 127.0).canonical_digest());
        assert_ne!(base, Transaction::new("Rick", "Morty", 127.5).canonical_digest());
        assert_ne!(base, Transaction::new("Morty", "Rick", 127.0).canonical_digest());
        assert_ne!(base, Transaction::new("Rick", "Summer", 127.0).canonical_digest());
    }

    #[test]
    fn test_wire_round_trip_keeps_digest() {
        let transaction = Transaction::new("Rick", "Morty", 0.1);
        let json = serde_json::to_string(&transaction).unwrap();
        let decoded: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, transaction);
        assert_eq!(decoded.canonical_digest(), transaction.canonical_digest());
    }
}
