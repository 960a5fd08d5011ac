use p256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

use super::encoding::CanonicalEncode;
use super::transaction::Transaction;

/// Version byte prefixed to every derived address
pub const ADDRESS_VERSION: u8 = 0x00;

/// Number of double-SHA-256 bytes appended as checksum
pub const ADDRESS_CHECKSUM_SIZE: usize = 4;

/// Size of the decoded Base58 address payload (version + hash160 + checksum)
pub const ADDRESS_PAYLOAD_SIZE: usize = 1 + 20 + ADDRESS_CHECKSUM_SIZE;

/// Size of the public key coordinates (x || y)
pub const PUBLIC_KEY_SIZE: usize = 64;

/// Size of a private key scalar
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to sign message: {0}")]
    SigningError(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents a ledger address
///
/// Wallet addresses are Base58Check strings, but any identifier is accepted
/// as a transaction endpoint. Use [`Address::decode_payload`] to check one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Derives the address of a public key
    ///
    /// SHA-256 over the raw coordinates, then RIPEMD-160, then Base58Check
    /// with version byte `0x00`.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let sha = Sha256::digest(public_key.coordinates());
        let hash160: [u8; 20] = Ripemd160::digest(sha).into();
        Address::from_hash160(&hash160)
    }

    /// Encodes a RIPEMD-160 public key hash as a versioned, checksummed address
    pub fn from_hash160(hash160: &[u8; 20]) -> Self {
        let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_SIZE);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(hash160);

        let checksum = checksum(&payload);
        payload.extend_from_slice(&checksum);

        Address(bs58::encode(payload).into_string())
    }

    /// Decodes the address and verifies its version byte and checksum
    ///
    /// # Returns
    ///
    /// The 25-byte payload: version, public key hash, checksum
    pub fn decode_payload(&self) -> Result<[u8; ADDRESS_PAYLOAD_SIZE], CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let payload: [u8; ADDRESS_PAYLOAD_SIZE] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            CryptoError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_PAYLOAD_SIZE,
                bytes.len()
            ))
        })?;

        if payload[0] != ADDRESS_VERSION {
            return Err(CryptoError::InvalidAddress(format!(
                "unknown version byte {:#04x}",
                payload[0]
            )));
        }

        let (versioned, stated) = payload.split_at(ADDRESS_PAYLOAD_SIZE - ADDRESS_CHECKSUM_SIZE);
        if checksum(versioned) != stated {
            return Err(CryptoError::InvalidAddress("checksum mismatch".to_string()));
        }

        Ok(payload)
    }

    /// Checks if the address is a well-formed wallet address
    pub fn is_valid(&self) -> bool {
        self.decode_payload().is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First four bytes of SHA-256(SHA-256(data))
fn checksum(data: &[u8]) -> [u8; ADDRESS_CHECKSUM_SIZE] {
    let digest = Sha256::digest(Sha256::digest(data));
    let mut out = [0u8; ADDRESS_CHECKSUM_SIZE];
    out.copy_from_slice(&digest[..ADDRESS_CHECKSUM_SIZE]);
    out
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    /// Parses a wallet address, rejecting anything with a bad checksum
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.decode_payload()?;
        Ok(address)
    }
}

/// P-256 public key used to verify transaction signatures
#[derive(Debug, Clone)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Returns the affine coordinates x || y, each 32 bytes big-endian
    pub fn coordinates(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.0.as_affine().to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        // Skip the SEC1 uncompressed tag
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    /// Parses a 128-character hex string of x || y
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }

        let mut sec1 = Vec::with_capacity(PUBLIC_KEY_SIZE + 1);
        sec1.push(0x04);
        sec1.extend_from_slice(&bytes);

        VerifyingKey::from_sec1_bytes(&sec1)
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.coordinates())
    }

    /// Derives the address of this key
    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.coordinates() == other.coordinates()
    }
}

impl Eq for PublicKey {}

/// P-256 private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Samples a new key from the OS random source
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Parses a 64-character hex scalar
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )));
        }

        SigningKey::from_slice(&bytes)
            .map(PrivateKey)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(VerifyingKey::from(&self.0))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Represents a detached ECDSA signature, hex of r || s
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.to_bytes()))
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        Signature::from_slice(&bytes).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    /// Returns the two integer components (r, s) as hex
    pub fn components(&self) -> Result<(String, String), CryptoError> {
        let (r, s) = self.to_signature()?.split_bytes();
        Ok((hex::encode(r), hex::encode(s)))
    }
}

impl fmt::Display for DigitalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signs the canonical digest of a transaction
///
/// Uses a fresh random nonce per signature, so signing the same transaction
/// twice gives two different (both valid) signatures.
pub fn sign(private_key: &PrivateKey, transaction: &Transaction) -> Result<DigitalSignature, CryptoError> {
    if !transaction.has_encodable_value() {
        return Err(CryptoError::SigningError(format!(
            "value {} has no canonical encoding",
            transaction.value()
        )));
    }

    let digest = transaction.canonical_digest();
    let signature: Signature = private_key
        .0
        .sign_prehash_with_rng(&mut OsRng, digest.as_bytes())
        .map_err(|e| CryptoError::SigningError(e.to_string()))?;

    Ok(DigitalSignature::from_signature(&signature))
}

/// Verifies a signature over the canonical digest of a transaction
///
/// A wrong key, a tampered transaction and an undecodable signature all
/// yield `false`.
pub fn verify(public_key: &PublicKey, signature: &DigitalSignature, transaction: &Transaction) -> bool {
    if !transaction.has_encodable_value() {
        return false;
    }

    let signature = match signature.to_signature() {
        Ok(signature) => signature,
        Err(_) => return false,
    };

    let digest = transaction.canonical_digest();
    public_key.0.verify_prehash(digest.as_bytes(), &signature).is_ok()
}

/// Represents a wallet with a keypair
///
/// The keypair is fixed for the wallet's lifetime; the public key and the
/// address are derived once and handed out read-only.
#[derive(Debug, Clone)]
pub struct Wallet {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        Wallet::from_private_key(PrivateKey::generate())
    }

    /// Creates a wallet from an existing private key
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let address = public_key.address();

        Wallet {
            private_key,
            public_key,
            address,
        }
    }

    /// Creates a wallet from a hex-encoded private key
    pub fn from_private_key_hex(hex_str: &str) -> Result<Self, CryptoError> {
        Ok(Wallet::from_private_key(PrivateKey::from_hex(hex_str)?))
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Signs an arbitrary transaction with the wallet's private key
    pub fn sign(&self, transaction: &Transaction) -> Result<DigitalSignature, CryptoError> {
        sign(&self.private_key, transaction)
    }

    /// Builds a transfer from this wallet and signs it
    ///
    /// # Returns
    ///
    /// The transaction together with its detached signature
    pub fn sign_transfer(
        &self,
        recipient: impl Into<Address>,
        value: f32,
    ) -> Result<(Transaction, DigitalSignature), CryptoError> {
        let transaction = Transaction::new(self.address.clone(), recipient, value);
        let signature = self.sign(&transaction)?;
        Ok((transaction, signature))
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Wallet::new()
    }
}
