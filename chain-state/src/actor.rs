//! Actor-based access to the chain state
//!
//! [`State`] has no internal locking. When several tasks need it, it is moved
//! into a single actor task and reached through a cloneable [`StateHandle`]:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │        StateHandle (Clone, many tasks)      │
//! └─────────────────────┬──────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌────────────────────────────────────────────┐
//! │          StateActor (single task)           │
//! │  add_tx / add_block / persist / reads       │
//! │  handled strictly one at a time             │
//! └─────────────────────┬──────────────────────┘
//!                       ▼
//!               State + block log
//! ```
//!
//! The log is closed exactly once: on `Shutdown`, or when every handle is
//! dropped.

use crate::state::{Balances, State};
use crate::types::{Block, Hash, Tx};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};

/// Message sent to the state actor
#[derive(Debug)]
pub enum StateMessage {
    /// Submit one transaction
    AddTx {
        tx: Tx,
        response: oneshot::Sender<Result<()>>,
    },

    /// Submit a block of transactions (all or nothing)
    AddBlock {
        block: Block,
        response: oneshot::Sender<Result<()>>,
    },

    /// Seal the mempool into a block
    Persist {
        response: oneshot::Sender<Result<Hash>>,
    },

    /// Snapshot of balances
    Balances {
        response: oneshot::Sender<Balances>,
    },

    /// Latest block hash
    LatestBlockHash {
        response: oneshot::Sender<Hash>,
    },

    /// Latest block
    LatestBlock {
        response: oneshot::Sender<Option<Block>>,
    },

    /// Close the log and stop
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that owns the state
#[derive(Debug)]
pub struct StateActor {
    state: State,
    mailbox: mpsc::Receiver<StateMessage>,
}

impl StateActor {
    /// Create new actor
    pub fn new(state: State, mailbox: mpsc::Receiver<StateMessage>) -> Self {
        Self { state, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                StateMessage::Shutdown { response } => {
                    let result = self.state.close();
                    if let Err(e) = &result {
                        tracing::error!("Error closing state: {}", e);
                    }
                    let _ = response.send(result);
                    return;
                }
                other => self.handle_message(other),
            }
        }

        // Every handle dropped
        tracing::debug!("State actor mailbox closed");
        if let Err(e) = self.state.close() {
            tracing::error!("Error closing state: {}", e);
        }
    }

    fn handle_message(&mut self, msg: StateMessage) {
        match msg {
            StateMessage::AddTx { tx, response } => {
                let _ = response.send(self.state.add_tx(tx));
            }

            StateMessage::AddBlock { block, response } => {
                let _ = response.send(self.state.add_block(block));
            }

            StateMessage::Persist { response } => {
                let result = self.state.persist();
                if let Err(e) = &result {
                    tracing::error!("Error persisting block: {}", e);
                }
                let _ = response.send(result);
            }

            StateMessage::Balances { response } => {
                let _ = response.send(self.state.balances().clone());
            }

            StateMessage::LatestBlockHash { response } => {
                let _ = response.send(self.state.latest_block_hash());
            }

            StateMessage::LatestBlock { response } => {
                let _ = response.send(self.state.latest_block().cloned());
            }

            StateMessage::Shutdown { .. } => {
                // Handled in run loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct StateHandle {
    sender: mpsc::Sender<StateMessage>,
}

impl StateHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<StateMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StateMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Submit one transaction
    pub async fn add_tx(&self, tx: Tx) -> Result<()> {
        self.call(|response| StateMessage::AddTx { tx, response }).await?
    }

    /// Submit a block of transactions
    pub async fn add_block(&self, block: Block) -> Result<()> {
        self.call(|response| StateMessage::AddBlock { block, response })
            .await?
    }

    /// Seal the mempool into a block
    pub async fn persist(&self) -> Result<Hash> {
        self.call(|response| StateMessage::Persist { response }).await?
    }

    /// Snapshot of balances
    pub async fn balances(&self) -> Result<Balances> {
        self.call(|response| StateMessage::Balances { response }).await
    }

    /// Latest block hash
    pub async fn latest_block_hash(&self) -> Result<Hash> {
        self.call(|response| StateMessage::LatestBlockHash { response })
            .await
    }

    /// Latest block
    pub async fn latest_block(&self) -> Result<Option<Block>> {
        self.call(|response| StateMessage::LatestBlock { response })
            .await
    }

    /// Close the log and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.call(|response| StateMessage::Shutdown { response })
            .await?
    }
}

/// Spawn the state actor
pub fn spawn_state_actor(state: State, mailbox_capacity: usize) -> StateHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = StateActor::new(state, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    StateHandle::new(tx)
}
