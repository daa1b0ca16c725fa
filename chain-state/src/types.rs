//! Core types for the chain state
//!
//! All types are designed for:
//! - Stable JSON on disk (field names fixed by serde attributes)
//! - Deterministic hashing (see [`crate::crypto`])
//! - Exact arithmetic (unsigned integer amounts)

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// `data` tag marking a transaction as a mint
pub const TX_REWARD: &str = "reward";

/// Account identifier (opaque name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    /// Create new account
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Account {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Account {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Value transfer between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// Sender (ignored for rewards)
    pub from: Account,
    /// Recipient
    pub to: Account,
    /// Amount moved or minted
    pub value: u64,
    /// Empty for transfers, [`TX_REWARD`] for mints
    pub data: String,
}

impl Tx {
    /// Create new transaction
    pub fn new(
        from: impl Into<Account>,
        to: impl Into<Account>,
        value: u64,
        data: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value,
            data: data.into(),
        }
    }

    /// Mint `value` into `to`
    pub fn reward(to: impl Into<Account>, value: u64) -> Self {
        let to = to.into();
        Self {
            from: to.clone(),
            to,
            value,
            data: TX_REWARD.to_string(),
        }
    }

    /// Check if this transaction mints value
    pub fn is_reward(&self) -> bool {
        self.data == TX_REWARD
    }
}

/// 32-byte SHA-256 content hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Parent of the first block
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check for the all-zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Lowercase hex, 64 characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Block header linking to the parent block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Content hash of the previous block (zero for block 0)
    pub parent: Hash,
    /// Sequence number, starting at 0
    pub number: u64,
    /// Unix seconds at construction
    pub time: u64,
}

/// Ordered batch of transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Header
    pub header: BlockHeader,
    /// Transactions in application order
    pub txs: Vec<Tx>,
}

impl Block {
    /// Create new block
    pub fn new(parent: Hash, number: u64, time: u64, txs: Vec<Tx>) -> Self {
        Self {
            header: BlockHeader {
                parent,
                number,
                time,
            },
            txs,
        }
    }

    /// Compute content hash
    pub fn hash(&self) -> Hash {
        crate::crypto::hash_block(self)
    }
}

/// One persisted line of the block log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnvelope {
    /// Block hash, computed once at persist time
    #[serde(rename = "k")]
    pub key: Hash,
    /// The block
    #[serde(rename = "v")]
    pub value: Block,
}

impl BlockEnvelope {
    /// Wrap a block under its freshly computed hash
    pub fn seal(block: Block) -> Self {
        Self {
            key: block.hash(),
            value: block,
        }
    }
}
