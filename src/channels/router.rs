//! Conversation router: fans updates out to one worker task per user.
//!
//! A user's updates are handled strictly in arrival order by that user's
//! worker; different users proceed in parallel. Workers exit once idle and
//! are respawned on the user's next update.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::{Channel, IncomingUpdate, UpdateStream};
use crate::intake::IntakeEngine;

/// How long a worker waits for its user's next update before exiting.
pub const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(300);

pub struct ConversationRouter {
    engine: Arc<IntakeEngine>,
    channel: Arc<dyn Channel>,
    worker_idle: Duration,
    workers: Mutex<HashMap<String, UnboundedSender<IncomingUpdate>>>,
}

impl ConversationRouter {
    pub fn new(
        engine: Arc<IntakeEngine>,
        channel: Arc<dyn Channel>,
        worker_idle: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            channel,
            worker_idle,
            workers: Mutex::new(HashMap::new()),
        })
    }

    /// Route every update from `stream` until it ends.
    pub async fn run(self: Arc<Self>, mut stream: UpdateStream) {
        info!(channel = self.channel.name(), "Conversation router ready");
        while let Some(update) = stream.next().await {
            self.route(update).await;
        }
        info!("Update stream ended");
    }

    /// Hand an update to its user's worker, spawning one if needed.
    pub async fn route(self: &Arc<Self>, update: IncomingUpdate) {
        let mut workers = self.workers.lock().await;

        let update = match workers.get(&update.user_id) {
            Some(tx) => match tx.send(update) {
                Ok(()) => return,
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let user_id = update.user_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive until the spawned worker drops it.
        let _ = tx.send(update);
        workers.insert(user_id.clone(), tx);
        debug!(user_id = %user_id, "Worker spawned");
        tokio::spawn(Arc::clone(self).worker(user_id, rx));
    }

    /// Number of live per-user workers.
    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    async fn worker(self: Arc<Self>, user_id: String, mut rx: UnboundedReceiver<IncomingUpdate>) {
        loop {
            let update = match tokio::time::timeout(self.worker_idle, rx.recv()).await {
                Ok(Some(update)) => update,
                Ok(None) => break,
                Err(_) => {
                    // Deregister under the lock so no update slips in between
                    // the emptiness check and the removal.
                    let mut workers = self.workers.lock().await;
                    match rx.try_recv() {
                        Ok(update) => update,
                        Err(_) => {
                            workers.remove(&user_id);
                            debug!(user_id = %user_id, "Worker idle, exiting");
                            break;
                        }
                    }
                }
            };
            self.process(update).await;
        }
    }

    async fn process(&self, update: IncomingUpdate) {
        let replies = self
            .engine
            .handle(&update.user_id, update.event.clone())
            .await;
        if let Err(e) = self.channel.respond(&update, replies).await {
            warn!(
                user_id = %update.user_id,
                channel = self.channel.name(),
                error = %e,
                "Failed to deliver replies"
            );
        }
    }
}
