//! Seeds a data directory with the demo chain
//!
//! Data dir comes from `CHAIN_DATA_DIR` (default: current directory).

use anyhow::Context;
use chain_state::{migrate::seed_demo_chain, spawn_state_actor, Config, State, StateHandle};

async fn migrate(handle: &StateHandle) -> anyhow::Result<()> {
    seed_demo_chain(handle)
        .await
        .context("failed to seed demo chain")?;

    let tip = handle.latest_block_hash().await?;
    let balances = handle.balances().await?;

    println!("Account balances at {tip}:");
    println!("-----------------");
    for (account, balance) in &balances {
        println!("{account}: {balance}");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        data_dir = %config.data_dir.display(),
        "Migrating chain state"
    );

    let state = State::open_with_config(&config)?;
    let handle = spawn_state_actor(state, config.actor.mailbox_capacity);

    let result = migrate(&handle).await;
    let closed = handle.shutdown().await;

    result?;
    closed?;
    Ok(())
}
