//! Per-node addressed queues forwarding room messages between
//! nodes.
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

use crevice_protocol::{BusMessage, NodeId};

use crate::{Error, Result};

/// Delivers a room message to the node hosting the other
/// participant.
///
/// Each node provisions exactly one inbound queue addressed by
/// its own identity at startup. Delivery is at-least-once and
/// preserves per-target ordering from a single publisher;
/// consumers must tolerate the occasional duplicate.
#[async_trait]
pub trait RelayBus: Send + Sync {
    /// Provision this node's inbound queue.
    async fn subscribe(
        &self,
        node_id: NodeId,
    ) -> Result<mpsc::UnboundedReceiver<BusMessage>>;

    /// Enqueue a message to the target node's queue.
    async fn publish(
        &self,
        target: NodeId,
        message: BusMessage,
    ) -> Result<()>;
}

/// In-process bus implementation over tokio channels.
///
/// Backs a single-process deployment and the multi-node
/// simulation tests; a fleet deployment implements [RelayBus]
/// against an external message broker.
#[derive(Default)]
pub struct MemoryBus {
    queues: RwLock<HashMap<NodeId, mpsc::UnboundedSender<BusMessage>>>,
}

impl MemoryBus {
    /// Create a bus with no provisioned queues.
    pub fn new() -> Self {
        Default::default()
    }
}

#[async_trait]
impl RelayBus for MemoryBus {
    async fn subscribe(
        &self,
        node_id: NodeId,
    ) -> Result<mpsc::UnboundedReceiver<BusMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut queues = self.queues.write().await;
        queues.insert(node_id, tx);
        Ok(rx)
    }

    async fn publish(
        &self,
        target: NodeId,
        message: BusMessage,
    ) -> Result<()> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(&target)
            .ok_or(Error::BusTargetUnknown(target))?;
        queue.send(message).map_err(|_| Error::BusClosed)
    }
}
