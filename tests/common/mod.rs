//! In-memory stand-ins for the three external-resource ports. The handler
//! surface and consumer loop run against these without modification.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use ledgerd::error::AppError;
use ledgerd::models::{QueueMessage, Transaction, TransactionStats, TransactionStatus};
use ledgerd::ports::{AuditStore, MessageQueue, ReceivedMessage, TransactionStore};
use ledgerd::{AppState, create_app};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    pub transactions: Mutex<Vec<Transaction>>,
    pub fail_storage: AtomicBool,
    pub fail_health: AtomicBool,
}

impl InMemoryStore {
    pub fn seed(&self, tx: Transaction) {
        self.transactions.lock().unwrap().push(tx);
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }

    fn check_storage(&self) -> Result<(), AppError> {
        if self.fail_storage.load(Ordering::SeqCst) {
            return Err(AppError::Storage(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn create(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        self.check_storage()?;
        self.transactions.lock().unwrap().push(tx.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Transaction, AppError> {
        self.check_storage()?;
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .find(|tx| tx.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("transaction not found: {id}")))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>, AppError> {
        self.check_storage()?;
        let mut transactions = self.transactions.lock().unwrap().clone();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(transactions
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<(), AppError> {
        self.check_storage()?;
        let mut transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or_else(|| AppError::NotFound(format!("transaction not found: {id}")))?;
        tx.status = status;
        Ok(())
    }

    async fn stats(&self) -> Result<TransactionStats, AppError> {
        self.check_storage()?;
        let transactions = self.transactions.lock().unwrap();

        let mut stats = TransactionStats {
            total_transactions: transactions.len() as i64,
            by_status: Default::default(),
            by_region: Default::default(),
        };
        for tx in transactions.iter() {
            *stats
                .by_status
                .entry(tx.status.as_str().to_string())
                .or_insert(0) += 1;
            *stats.by_region.entry(tx.region.clone()).or_insert(0) += 1;
        }

        Ok(stats)
    }

    async fn health(&self) -> Result<(), AppError> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(AppError::Storage(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAuditStore {
    pub writes: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail_writes: AtomicBool,
    pub fail_health: AtomicBool,
}

impl RecordingAuditStore {
    pub fn keys(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl AuditStore for RecordingAuditStore {
    async fn write(&self, key: &str, body: Vec<u8>) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Infra("object store unreachable".to_string()));
        }
        self.writes.lock().unwrap().push((key.to_string(), body));
        Ok(())
    }

    async fn write_timestamped(&self, prefix: &str, body: Vec<u8>) -> Result<(), AppError> {
        let key = format!("{prefix}/2026-01-01T00-00-00-0.json");
        self.write(&key, body).await
    }

    async fn health(&self) -> Result<(), AppError> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(AppError::Infra("object store unreachable".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub published: Mutex<Vec<QueueMessage>>,
    pub pending: Mutex<Vec<ReceivedMessage>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_publish: AtomicBool,
    pub fail_receive: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_health: AtomicBool,
}

impl RecordingQueue {
    pub fn enqueue(&self, message: QueueMessage, receipt_handle: &str) {
        self.pending.lock().unwrap().push(ReceivedMessage {
            message,
            receipt_handle: receipt_handle.to_string(),
        });
    }

    pub fn deleted_receipts(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageQueue for RecordingQueue {
    async fn publish(&self, msg: &QueueMessage) -> Result<(), AppError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(AppError::Infra("queue unreachable".to_string()));
        }
        self.published.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: i32,
        _wait_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, AppError> {
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(AppError::Infra("queue unreachable".to_string()));
        }
        let mut pending = self.pending.lock().unwrap();
        let count = pending.len().min(max_messages as usize);
        Ok(pending.drain(..count).collect())
    }

    async fn delete_by_receipt(&self, receipt_handle: &str) -> Result<(), AppError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::Infra("queue unreachable".to_string()));
        }
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn health(&self) -> Result<(), AppError> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(AppError::Infra("queue unreachable".to_string()));
        }
        Ok(())
    }
}

pub struct TestHarness {
    pub app: Router,
    pub store: Arc<InMemoryStore>,
    pub audit: Arc<RecordingAuditStore>,
    pub queue: Arc<RecordingQueue>,
}

pub fn test_harness() -> TestHarness {
    let store = Arc::new(InMemoryStore::default());
    let audit = Arc::new(RecordingAuditStore::default());
    let queue = Arc::new(RecordingQueue::default());

    let app = create_app(AppState {
        store: store.clone(),
        audit: audit.clone(),
        queue: queue.clone(),
        region: "us-east-1".to_string(),
    });

    TestHarness {
        app,
        store,
        audit,
        queue,
    }
}
