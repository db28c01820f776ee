//! Ledger entities and the serialization contracts shared by the SQL store,
//! the audit object store, and the queue.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;
use thiserror::Error;
use uuid::Uuid;

/// Action tag carried by audit records and queue messages for a created
/// transaction.
pub const ACTION_TRANSACTION_CREATED: &str = "transaction_created";

/// A financial transaction in the ledger.
///
/// `region`, `from_account`, `to_account` and `amount` are immutable after
/// insert; only `status` moves, and only forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub region: String,
    pub amount: BigDecimal,
    pub from_account: String,
    pub to_account: String,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        region: String,
        amount: BigDecimal,
        from_account: String,
        to_account: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            region,
            amount,
            from_account,
            to_account,
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
        }
    }
}

// Hand-rolled so a malformed `status` surfaces as a column decode error,
// which the list path skips row-by-row instead of failing the whole call.
impl<'r> sqlx::FromRow<'r, PgRow> for Transaction {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<TransactionStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            region: row.try_get("region")?,
            amount: row.try_get("amount")?,
            from_account: row.try_get("from_account")?,
            to_account: row.try_get("to_account")?,
            status,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

/// Transaction lifecycle states. Transitions are forward-only:
/// `pending` may move to `completed` or `failed`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (
                TransactionStatus::Pending,
                TransactionStatus::Completed | TransactionStatus::Failed
            )
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown transaction status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for TransactionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Immutable audit record written to the object store for each created
/// transaction, keyed `transactions/<region>/<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub transaction_id: Uuid,
    pub region: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

impl AuditRecord {
    pub fn new(
        transaction_id: Uuid,
        region: String,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            region,
            action: action.into(),
            timestamp: Utc::now(),
            details: details.into(),
        }
    }

    /// The object-store key for this record.
    pub fn key(&self) -> String {
        format!("transactions/{}/{}.json", self.region, self.transaction_id)
    }
}

/// Body of a queue message. `Region` and `Action` are duplicated as string
/// message attributes for coarse filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub transaction_id: Uuid,
    pub region: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub data: String,
}

/// Aggregated ledger counts served by GET /stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total_transactions: i64,
    pub by_status: HashMap<String, i64>,
    pub by_region: HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_transaction() -> Transaction {
        Transaction::new(
            "us-east-1".to_string(),
            BigDecimal::from_str("100.50").unwrap(),
            "acct-a".to_string(),
            "acct-b".to_string(),
        )
    }

    #[test]
    fn new_transaction_starts_pending() {
        let tx = sample_transaction();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.region, "us-east-1");
        assert!((Utc::now() - tx.timestamp).num_seconds() < 5);
    }

    #[test]
    fn fresh_transactions_get_distinct_ids() {
        let a = sample_transaction();
        let b = sample_transaction();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn transaction_json_round_trip() {
        let tx = sample_transaction();
        let encoded = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn amount_serializes_as_decimal_string() {
        let tx = sample_transaction();
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["amount"], "100.50");
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn status_parses_and_displays() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(
                TransactionStatus::from_str(status.as_str()).unwrap(),
                status
            );
        }
        assert!(TransactionStatus::from_str("cancelled").is_err());
        assert!(TransactionStatus::from_str("Pending").is_err());
    }

    #[test]
    fn status_transitions_are_forward_only() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn audit_record_key_layout() {
        let id = Uuid::new_v4();
        let record = AuditRecord::new(
            id,
            "eu-central-1".to_string(),
            ACTION_TRANSACTION_CREATED,
            "Transaction created via API",
        );
        assert_eq!(record.key(), format!("transactions/eu-central-1/{id}.json"));
    }

    #[test]
    fn queue_message_round_trip() {
        let msg = QueueMessage {
            transaction_id: Uuid::new_v4(),
            region: "us-east-1".to_string(),
            action: ACTION_TRANSACTION_CREATED.to_string(),
            timestamp: Utc::now(),
            data: r#"{"details":"x"}"#.to_string(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: QueueMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }
}
