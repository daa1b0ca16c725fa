//! Demo chain used by the `chain-migrate` binary
//!
//! Three blocks: a self-transfer plus a reward, a round of transfers between
//! andrej, babayaga and caesar, and a final reward of 24700 to andrej.

use crate::actor::StateHandle;
use crate::state::unix_now;
use crate::types::{Block, Hash, Tx};
use crate::Result;

/// Transactions of each demo block, in chain order
pub fn demo_blocks() -> Vec<Vec<Tx>> {
    vec![
        vec![
            Tx::new("andrej", "andrej", 3, ""),
            Tx::new("andrej", "andrej", 700, "reward"),
        ],
        vec![
            Tx::new("andrej", "babayaga", 2000, ""),
            Tx::new("andrej", "andrej", 100, "reward"),
            Tx::new("babayaga", "andrej", 1, ""),
            Tx::new("babayaga", "caesar", 1000, ""),
            Tx::new("babayaga", "andrej", 50, ""),
            Tx::new("andrej", "andrej", 600, "reward"),
        ],
        vec![Tx::new("andrej", "andrej", 24700, "reward")],
    ]
}

/// Submit and persist every demo block through the actor.
///
/// Returns the hash of each persisted block.
pub async fn seed_demo_chain(handle: &StateHandle) -> Result<Vec<Hash>> {
    let mut hashes = Vec::new();

    for txs in demo_blocks() {
        let parent = handle.latest_block_hash().await?;
        let number = handle
            .latest_block()
            .await?
            .map_or(0, |block| block.header.number + 1);

        handle
            .add_block(Block::new(parent, number, unix_now(), txs))
            .await?;
        let hash = handle.persist().await?;

        tracing::info!(number, %hash, "Demo block persisted");
        hashes.push(hash);
    }

    Ok(hashes)
}
