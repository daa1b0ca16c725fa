//! State engine: balances, mempool and the block log
//!
//! A [`State`] is built by [`State::open`], which bootstraps the data
//! directory if needed, loads genesis and replays every persisted block.
//! After that, callers submit transactions ([`State::add_tx`],
//! [`State::add_block`]) and seal the mempool into a new block with
//! [`State::persist`].
//!
//! # Durability
//!
//! Balances returned by [`State::balances`] are optimistic: they include
//! mempool transactions that are not yet in the log. If the process stops
//! before `persist` succeeds, those transactions are gone and the next
//! `open` replays the log to the last durable block.

use crate::{
    config::Config,
    genesis::{load_genesis, Genesis},
    metrics::Metrics,
    storage::{block_db_path, genesis_path, init_data_dir_if_not_exists, BlockLog, FileLog},
    types::{Account, Block, BlockEnvelope, Hash, Tx},
    Error, Result,
};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

/// Account → balance
pub type Balances = BTreeMap<Account, u64>;

/// Apply one transaction to a balance table.
///
/// The only place balances change. On error the table is untouched.
pub fn apply_tx(balances: &mut Balances, tx: &Tx) -> Result<()> {
    let to_balance = balances.get(&tx.to).copied().unwrap_or(0);

    if tx.is_reward() {
        let credited = to_balance
            .checked_add(tx.value)
            .ok_or_else(|| Error::Overflow {
                account: tx.to.clone(),
            })?;
        balances.insert(tx.to.clone(), credited);
        return Ok(());
    }

    let from_balance = balances.get(&tx.from).copied().unwrap_or(0);
    if from_balance < tx.value {
        return Err(Error::InsufficientBalance {
            account: tx.from.clone(),
            balance: from_balance,
            value: tx.value,
        });
    }

    if tx.from == tx.to {
        balances.entry(tx.from.clone()).or_insert(0);
        return Ok(());
    }

    let credited = to_balance
        .checked_add(tx.value)
        .ok_or_else(|| Error::Overflow {
            account: tx.to.clone(),
        })?;
    balances.insert(tx.from.clone(), from_balance - tx.value);
    balances.insert(tx.to.clone(), credited);

    Ok(())
}

pub(crate) fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// In-memory chain state over an open block log
pub struct State {
    balances: Balances,
    mempool: Vec<Tx>,
    latest_block: Option<Block>,
    latest_hash: Hash,
    log: Box<dyn BlockLog>,
    closed: bool,
    metrics: Metrics,
}

impl State {
    /// Bootstrap-or-load the chain stored under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let config = Config {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Config::default()
        };
        Self::open_with_config(&config)
    }

    /// Bootstrap-or-load using full configuration
    pub fn open_with_config(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir.as_path();

        init_data_dir_if_not_exists(data_dir)?;
        let genesis = load_genesis(genesis_path(data_dir))?;
        let log = FileLog::open(block_db_path(data_dir), config.storage.sync_on_persist)?;

        Self::from_log(genesis, log, config.storage.verify_block_hashes)
    }

    /// Replay `log` on top of `genesis`.
    ///
    /// Any failure closes the log and aborts; no partial state is returned.
    pub fn from_log(
        genesis: Genesis,
        log: impl BlockLog + 'static,
        verify_block_hashes: bool,
    ) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| Error::Other(format!("metrics: {e}")))?;

        let mut state = Self {
            balances: genesis.balances,
            mempool: Vec::new(),
            latest_block: None,
            latest_hash: Hash::zero(),
            log: Box::new(log),
            closed: false,
            metrics,
        };

        if let Err(e) = state.replay(verify_block_hashes) {
            tracing::error!(error = %e, "Block log replay failed");
            state.closed = true;
            if let Err(close_err) = state.log.close() {
                tracing::warn!(error = %close_err, "Failed to close block log after replay error");
            }
            return Err(e);
        }

        tracing::info!(
            accounts = state.balances.len(),
            tip = %state.latest_hash,
            height = state.latest_block.as_ref().map(|b| b.header.number),
            "Chain state loaded"
        );

        Ok(state)
    }

    fn replay(&mut self, verify_block_hashes: bool) -> Result<()> {
        let lines = self.log.read_lines()?;
        let mut end_of_data = None;

        for (index, line) in lines.iter().enumerate() {
            let line_no = index + 1;

            // Blank line ends the valid data; only more blank lines may follow
            if line.trim().is_empty() {
                end_of_data.get_or_insert(line_no);
                continue;
            }
            if let Some(blank) = end_of_data {
                return Err(Error::Corrupt {
                    number: self.next_number(),
                    reason: format!("line {line_no} follows the blank line {blank} that ends the log"),
                });
            }

            let envelope: BlockEnvelope = serde_json::from_str(line)
                .map_err(|source| Error::LineDecode { line: line_no, source })?;
            self.replay_block(envelope, verify_block_hashes)?;
        }

        if let Some(blank) = end_of_data {
            tracing::debug!(line = blank, "Ignored trailing blank lines in block log");
        }

        if let Some(block) = &self.latest_block {
            self.metrics.set_tip(block.header.number);
        }
        Ok(())
    }

    fn replay_block(&mut self, envelope: BlockEnvelope, verify_block_hashes: bool) -> Result<()> {
        let BlockEnvelope { key, value: block } = envelope;
        let number = block.header.number;

        let expected = self.next_number();
        if number != expected {
            return Err(Error::Corrupt {
                number,
                reason: format!("expected block number {expected}"),
            });
        }
        if block.header.parent != self.latest_hash {
            return Err(Error::Corrupt {
                number,
                reason: format!(
                    "parent {} does not match previous hash {}",
                    block.header.parent, self.latest_hash
                ),
            });
        }
        if verify_block_hashes {
            let computed = block.hash();
            if computed != key {
                return Err(Error::HashMismatch {
                    number,
                    recorded: key.to_hex(),
                    computed: computed.to_hex(),
                });
            }
        }

        for (index, tx) in block.txs.iter().enumerate() {
            apply_tx(&mut self.balances, tx).map_err(|e| Error::Corrupt {
                number,
                reason: format!("tx #{index} invalid: {e}"),
            })?;
        }

        tracing::debug!(number, hash = %key, txs = block.txs.len(), "Block replayed");

        self.latest_hash = key;
        self.latest_block = Some(block);
        Ok(())
    }

    fn next_number(&self) -> u64 {
        self.latest_block
            .as_ref()
            .map_or(0, |block| block.header.number + 1)
    }

    /// Validate and apply `tx`, then queue it for the next block
    pub fn add_tx(&mut self, tx: Tx) -> Result<()> {
        if let Err(e) = apply_tx(&mut self.balances, &tx) {
            self.metrics.record_tx_rejected();
            tracing::warn!(from = %tx.from, to = %tx.to, value = tx.value, error = %e, "Transaction rejected");
            return Err(e);
        }

        tracing::debug!(from = %tx.from, to = %tx.to, value = tx.value, reward = tx.is_reward(), "Transaction applied");

        self.metrics.record_tx_applied();
        self.mempool.push(tx);
        Ok(())
    }

    /// Apply every transaction of `block`, all or nothing.
    ///
    /// The transactions join the mempool; the block's own header is not
    /// kept, `persist` builds a fresh one linked to the current tip.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let mut staged = self.balances.clone();

        for (index, tx) in block.txs.iter().enumerate() {
            if let Err(e) = apply_tx(&mut staged, tx) {
                self.metrics.record_tx_rejected();
                tracing::warn!(index, error = %e, "Block rejected");
                return Err(Error::BlockRejected {
                    index,
                    source: Box::new(e),
                });
            }
        }

        self.balances = staged;
        for _ in &block.txs {
            self.metrics.record_tx_applied();
        }
        self.mempool.extend(block.txs);
        Ok(())
    }

    /// Seal the mempool into a new block and append it to the log.
    ///
    /// An empty mempool still produces a block. On error nothing in memory
    /// changes and the mempool is kept for a retry.
    pub fn persist(&mut self) -> Result<Hash> {
        let started = Instant::now();

        let block = Block::new(
            self.latest_hash,
            self.next_number(),
            unix_now(),
            self.mempool.clone(),
        );
        let envelope = BlockEnvelope::seal(block);
        let line = serde_json::to_string(&envelope)?;

        self.log.append_line(&line)?;

        let BlockEnvelope { key, value: block } = envelope;
        let number = block.header.number;

        tracing::info!(number, hash = %key, txs = block.txs.len(), "Block persisted");

        self.latest_hash = key;
        self.latest_block = Some(block);
        self.mempool.clear();
        self.metrics
            .record_block_persisted(number, started.elapsed().as_secs_f64());

        Ok(key)
    }

    /// Hash of the latest block (zero before the first block)
    pub fn latest_block_hash(&self) -> Hash {
        self.latest_hash
    }

    /// Latest persisted or replayed block
    pub fn latest_block(&self) -> Option<&Block> {
        self.latest_block.as_ref()
    }

    /// Current balances, mempool included
    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    /// Balance of one account (0 if unknown)
    pub fn balance(&self, account: &Account) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Transactions waiting for the next `persist`
    pub fn pending_txs(&self) -> &[Tx] {
        &self.mempool
    }

    /// Metrics for this state
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Release the block log
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.log.close()
    }
}

impl Drop for State {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.log.close() {
                tracing::warn!(error = %e, "Failed to close block log on drop");
            }
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("accounts", &self.balances.len())
            .field("pending", &self.mempool.len())
            .field("latest_hash", &self.latest_hash)
            .field("log", &self.log)
            .finish()
    }
}
