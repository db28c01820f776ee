//! Queue consumer loop: polls on a fixed tick, dispatches by action tag,
//! deletes on success. Delivery is at-least-once, so every handler must be
//! idempotent under redelivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::{ACTION_TRANSACTION_CREATED, QueueMessage};
use crate::ports::MessageQueue;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const RECEIVE_BATCH_SIZE: i32 = 10;

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, message: &QueueMessage) -> Result<(), AppError>;
}

/// Post-commit notification for a created transaction. All side effects were
/// already applied during ingest, so the handler acknowledges and nothing more.
pub struct TransactionCreatedHandler;

#[async_trait]
impl ActionHandler for TransactionCreatedHandler {
    async fn handle(&self, message: &QueueMessage) -> Result<(), AppError> {
        info!(
            transaction_id = %message.transaction_id,
            region = %message.region,
            "transaction created notification processed"
        );
        Ok(())
    }
}

/// Dispatch table keyed by action tag. New actions register here without
/// touching the loop itself.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(ACTION_TRANSACTION_CREATED, Arc::new(TransactionCreatedHandler));
        registry
    }

    pub fn register(&mut self, action: &'static str, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action, handler);
    }

    pub fn get(&self, action: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(action)
    }
}

pub struct ConsumerLoop {
    queue: Arc<dyn MessageQueue>,
    registry: ActionRegistry,
}

impl ConsumerLoop {
    pub fn new(queue: Arc<dyn MessageQueue>, registry: ActionRegistry) -> Self {
        Self { queue, registry }
    }

    /// Runs until the shutdown flag flips. The flag is only observed between
    /// ticks; an iteration in flight always completes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_once().await,
                _ = shutdown.changed() => {
                    info!("consumer loop stopping");
                    break;
                }
            }
        }
    }

    /// One receive-dispatch-delete pass over the queue.
    pub async fn poll_once(&self) {
        let envelopes = match self.queue.receive(RECEIVE_BATCH_SIZE, 0).await {
            Ok(envelopes) => envelopes,
            Err(e) => {
                warn!(error = %e, "failed to receive queue messages");
                return;
            }
        };

        for envelope in envelopes {
            let message = &envelope.message;
            info!(
                transaction_id = %message.transaction_id,
                action = %message.action,
                "processing queue message"
            );

            let processed = match self.registry.get(message.action.as_str()) {
                Some(handler) => match handler.handle(message).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            transaction_id = %message.transaction_id,
                            action = %message.action,
                            error = %e,
                            "action handler failed; message left for redelivery"
                        );
                        false
                    }
                },
                None => {
                    // Unknown actions are still deleted so a poison message
                    // cannot loop forever.
                    info!(action = %message.action, "unknown queue action");
                    true
                }
            };

            if processed {
                if let Err(e) = self.queue.delete_by_receipt(&envelope.receipt_handle).await {
                    error!(
                        transaction_id = %message.transaction_id,
                        error = %e,
                        "failed to delete queue message after processing; it will be redelivered"
                    );
                }
            }
        }
    }
}
