//! Abstract capabilities the handler surface and consumer loop depend on.
//! The production implementations live in `db`, `s3` and `sqs`; tests
//! substitute in-memory stand-ins without touching handler code.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{QueueMessage, Transaction, TransactionStats, TransactionStatus};

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts the transaction and returns the row read back from the store.
    async fn create(&self, tx: &Transaction) -> Result<Transaction, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Transaction, AppError>;

    /// Ordered by timestamp descending.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>, AppError>;

    /// Does not validate the transition; callers enforce forward-only moves.
    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<(), AppError>;

    async fn stats(&self) -> Result<TransactionStats, AppError>;

    async fn health(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Writes an immutable blob at the caller-supplied key. Idempotent by the
    /// caller's choice of key; never retried here.
    async fn write(&self, key: &str, body: Vec<u8>) -> Result<(), AppError>;

    /// Writes under `<prefix>/<YYYY-MM-DDThh-mm-ss>-<unix-nanos>.json`.
    async fn write_timestamped(&self, prefix: &str, body: Vec<u8>) -> Result<(), AppError>;

    async fn health(&self) -> Result<(), AppError>;
}

/// A message leased from the queue. The receipt handle must be presented to
/// delete; an undeleted message is redelivered after the visibility timeout.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message: QueueMessage,
    pub receipt_handle: String,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, msg: &QueueMessage) -> Result<(), AppError>;

    /// Receives up to `max_messages` (capped at 10 by the wire contract),
    /// waiting at most `wait_seconds`. Undecodable bodies are dropped with a
    /// warning; they are neither returned nor deleted.
    async fn receive(
        &self,
        max_messages: i32,
        wait_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, AppError>;

    async fn delete_by_receipt(&self, receipt_handle: &str) -> Result<(), AppError>;

    async fn health(&self) -> Result<(), AppError>;
}
