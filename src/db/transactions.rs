//! Postgres-wire implementation of the `TransactionStore` port.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Transaction, TransactionStats, TransactionStatus};
use crate::ports::TransactionStore;

#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn create(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, region, amount, from_account, to_account, status, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, region, amount, from_account, to_account, status, timestamp
            "#,
        )
        .bind(tx.id)
        .bind(&tx.region)
        .bind(&tx.amount)
        .bind(&tx.from_account)
        .bind(&tx.to_account)
        .bind(tx.status.as_str())
        .bind(tx.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Transaction, AppError> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, region, amount, from_account, to_account, status, timestamp
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("transaction not found: {id}")))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, region, amount, from_account, to_account, status, timestamp
            FROM transactions
            ORDER BY timestamp DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            match Transaction::from_row(&row) {
                Ok(tx) => transactions.push(tx),
                // One bad row must not fail the whole page.
                Err(e) => warn!(error = %e, "skipping undecodable transaction row"),
            }
        }

        Ok(transactions)
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE transactions SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("transaction not found: {id}")));
        }

        Ok(())
    }

    async fn stats(&self) -> Result<TransactionStats, AppError> {
        let total_transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        let by_status = self
            .grouped_counts("SELECT status AS label, COUNT(*) AS count FROM transactions GROUP BY status")
            .await?;
        let by_region = self
            .grouped_counts("SELECT region AS label, COUNT(*) AS count FROM transactions GROUP BY region")
            .await?;

        Ok(TransactionStats {
            total_transactions,
            by_status,
            by_region,
        })
    }

    async fn health(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl PostgresTransactionStore {
    async fn grouped_counts(&self, query: &str) -> Result<HashMap<String, i64>, AppError> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            match (row.try_get::<String, _>("label"), row.try_get::<i64, _>("count")) {
                (Ok(label), Ok(count)) => {
                    counts.insert(label, count);
                }
                _ => warn!("skipping unscannable aggregation row"),
            }
        }

        Ok(counts)
    }
}
