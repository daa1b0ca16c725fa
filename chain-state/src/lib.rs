//! TBB Chain State
//!
//! Account balances derived from a replayable, hash-linked block log.
//!
//! # Architecture
//!
//! - **Genesis**: One-time initial allocation seeds the balance table
//! - **Replay**: Every persisted block is re-applied in file order on open
//! - **Mempool**: Accepted transactions wait in memory until `persist`
//! - **Hash Chain**: Each block names its parent's SHA-256 content hash
//!
//! # Invariants
//!
//! - Balances never go negative: ordinary transfers require funds
//! - Rewards mint value into the recipient with no debit
//! - Block numbers start at 0 and increase by exactly 1
//! - Deterministic replay: Same log → same balances and same tip
//! - Append-only: Persisted lines are never rewritten or reordered
//!
//! # Example
//!
//! ```no_run
//! use chain_state::{State, Tx};
//!
//! fn main() -> chain_state::Result<()> {
//!     let mut state = State::open("./data")?;
//!
//!     state.add_tx(Tx::new("andrej", "babayaga", 100, ""))?;
//!     let hash = state.persist()?;
//!     println!("persisted block {hash}");
//!
//!     state.close()
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod crypto;
pub mod genesis;
pub mod storage;
pub mod state;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;
pub mod migrate;

// Re-exports
pub use error::{Error, Result};
pub use types::{Account, Block, BlockEnvelope, BlockHeader, Hash, Tx};
pub use genesis::Genesis;
pub use storage::{BlockLog, FileLog, MemoryLog};
pub use state::{Balances, State};
pub use actor::{spawn_state_actor, StateHandle};
pub use config::Config;
