//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the chain state.
//! Each [`Metrics`] owns its registry, so several states can live in one
//! process (tests, tooling) without name clashes.
//!
//! # Metrics
//!
//! - `chain_txs_applied_total` - Transactions applied to the balance table
//! - `chain_txs_rejected_total` - Transactions rejected by validation
//! - `chain_blocks_persisted_total` - Blocks appended to the log
//! - `chain_tip_number` - Number of the latest block
//! - `chain_persist_duration_seconds` - Histogram of persist latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Transactions applied
    pub txs_applied: IntCounter,

    /// Transactions rejected
    pub txs_rejected: IntCounter,

    /// Blocks persisted by this process
    pub blocks_persisted: IntCounter,

    /// Latest block number
    pub tip_number: IntGauge,

    /// Persist duration histogram
    pub persist_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let txs_applied = IntCounter::new(
            "chain_txs_applied_total",
            "Transactions applied to the balance table",
        )?;
        registry.register(Box::new(txs_applied.clone()))?;

        let txs_rejected = IntCounter::new(
            "chain_txs_rejected_total",
            "Transactions rejected by validation",
        )?;
        registry.register(Box::new(txs_rejected.clone()))?;

        let blocks_persisted = IntCounter::new(
            "chain_blocks_persisted_total",
            "Blocks appended to the log",
        )?;
        registry.register(Box::new(blocks_persisted.clone()))?;

        let tip_number = IntGauge::new("chain_tip_number", "Number of the latest block")?;
        registry.register(Box::new(tip_number.clone()))?;

        let persist_duration = Histogram::with_opts(
            HistogramOpts::new(
                "chain_persist_duration_seconds",
                "Histogram of persist latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(persist_duration.clone()))?;

        Ok(Self {
            txs_applied,
            txs_rejected,
            blocks_persisted,
            tip_number,
            persist_duration,
            registry,
        })
    }

    /// Record an applied transaction
    pub fn record_tx_applied(&self) {
        self.txs_applied.inc();
    }

    /// Record a rejected transaction
    pub fn record_tx_rejected(&self) {
        self.txs_rejected.inc();
    }

    /// Record a persisted block
    pub fn record_block_persisted(&self, number: u64, duration_seconds: f64) {
        self.blocks_persisted.inc();
        self.persist_duration.observe(duration_seconds);
        self.set_tip(number);
    }

    /// Update the tip gauge
    pub fn set_tip(&self, number: u64) {
        self.tip_number.set(i64::try_from(number).unwrap_or(i64::MAX));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("txs_applied", &self.txs_applied.get())
            .field("txs_rejected", &self.txs_rejected.get())
            .field("blocks_persisted", &self.blocks_persisted.get())
            .field("tip_number", &self.tip_number.get())
            .finish()
    }
}
