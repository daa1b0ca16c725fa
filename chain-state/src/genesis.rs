//! Genesis allocation
//!
//! `genesis.json` is a flat JSON object mapping account name to its initial
//! balance, e.g. `{"andrej": 1000000}`.

use crate::{types::Account, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Account credited by the default genesis
pub const DEFAULT_GENESIS_ACCOUNT: &str = "andrej";

/// Amount credited by the default genesis
pub const DEFAULT_GENESIS_BALANCE: u64 = 1_000_000;

/// Initial account-balance allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genesis {
    /// Initial balances
    pub balances: BTreeMap<Account, u64>,
}

impl Genesis {
    /// Create from an existing allocation
    pub fn new(balances: BTreeMap<Account, u64>) -> Self {
        Self { balances }
    }
}

impl Default for Genesis {
    fn default() -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(Account::new(DEFAULT_GENESIS_ACCOUNT), DEFAULT_GENESIS_BALANCE);
        Self { balances }
    }
}

/// Load genesis from disk
pub fn load_genesis(path: impl AsRef<Path>) -> Result<Genesis> {
    let content = std::fs::read(path.as_ref())?;
    let genesis: Genesis = serde_json::from_slice(&content)?;

    tracing::debug!(
        path = %path.as_ref().display(),
        accounts = genesis.balances.len(),
        "Genesis loaded"
    );

    Ok(genesis)
}

/// Write genesis to disk (pretty-printed)
pub fn write_genesis(path: impl AsRef<Path>, genesis: &Genesis) -> Result<()> {
    let json = serde_json::to_string_pretty(genesis)?;
    std::fs::write(path, json)?;
    Ok(())
}
