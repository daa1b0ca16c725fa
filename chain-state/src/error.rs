//! Error types for the chain state

use crate::types::Account;
use thiserror::Error;

/// Result type for chain state operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chain state errors
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (data dir, genesis file, block log)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Genesis descriptor is not valid JSON
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A block log line is not a valid envelope
    #[error("Decode error at block log line {line}: {source}")]
    LineDecode {
        /// 1-based line number in the log
        line: usize,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Sender cannot cover an ordinary transfer
    #[error("Insufficient balance: {account} has {balance}, needs {value}")]
    InsufficientBalance {
        /// Sending account
        account: Account,
        /// Balance at the time of the attempt
        balance: u64,
        /// Requested transfer amount
        value: u64,
    },

    /// Credit would overflow the recipient's balance
    #[error("Balance overflow crediting {account}")]
    Overflow {
        /// Receiving account
        account: Account,
    },

    /// A block was rejected as a whole
    #[error("Block rejected at tx #{index}: {source}")]
    BlockRejected {
        /// Position of the failing transaction inside the block
        index: usize,
        /// Why that transaction failed
        #[source]
        source: Box<Error>,
    },

    /// Recorded block hash disagrees with the block's content
    #[error("Hash mismatch in block {number}: recorded {recorded}, computed {computed}")]
    HashMismatch {
        /// Block number
        number: u64,
        /// Hash stored in the log line
        recorded: String,
        /// Hash recomputed from the block
        computed: String,
    },

    /// Log is structurally valid JSON but breaks the chain
    #[error("Corrupt block log at block {number}: {reason}")]
    Corrupt {
        /// Block number as recorded
        number: u64,
        /// What was wrong
        reason: String,
    },

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller may recover by submitting something else
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. } | Error::Overflow { .. } | Error::BlockRejected { .. }
        )
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
