//! # Transaction Repository
//!
//! Money movements for any [`Transactionable`] owner: payments and refunds
//! of sells, purchases and expenses. Rows are never updated; an order's
//! paid amount is always re-derived from the full list.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use storefront_core::payment::summarize_payments;
use storefront_core::validation::{validate_payment_amount, validate_required_text};
use storefront_core::{
    PaymentSummary, Transaction, TransactionKind, TransactionStatus, Transactionable,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const TRANSACTION_SELECT: &str = r#"
    SELECT id, transactionable_type, transactionable_id, kind, status, amount,
           currency_code, payment_method_id, gateway_transaction_id,
           failure_reason, created_at
    FROM transactions
"#;

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// All transactions of an owner, oldest first.
    pub async fn list_for(&self, owner: &Transactionable) -> DbResult<Vec<Transaction>> {
        list_for(&self.pool, owner).await
    }

    pub async fn get_by_gateway_id(
        &self,
        gateway_transaction_id: &str,
    ) -> DbResult<Option<Transaction>> {
        fetch_by_gateway_id(&self.pool, gateway_transaction_id).await
    }

    /// Succeeded-transaction totals of an owner.
    pub async fn summarize(&self, owner: &Transactionable) -> DbResult<PaymentSummary> {
        let transactions = self.list_for(owner).await?;
        Ok(summarize_payments(&transactions)?)
    }

    /// Records a movement for a purchase or expense.
    ///
    /// Sell transactions go through the checkout service, which keeps the
    /// order's paid amount in step.
    pub async fn record(&self, transaction: &Transaction) -> DbResult<()> {
        if matches!(transaction.owner(), Transactionable::Sell(_)) {
            return Err(DbError::Internal(
                "sell transactions are recorded through the checkout service".to_string(),
            ));
        }

        insert_transaction(&self.pool, transaction).await
    }
}

pub(crate) async fn list_for<'e, E>(executor: E, owner: &Transactionable) -> DbResult<Vec<Transaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{TRANSACTION_SELECT} WHERE transactionable_type = ?1 AND transactionable_id = ?2 \
         ORDER BY created_at, id"
    );
    let transactions = sqlx::query_as::<_, Transaction>(&sql)
        .bind(owner.kind())
        .bind(owner.id())
        .fetch_all(executor)
        .await?;

    Ok(transactions)
}

pub(crate) async fn fetch_by_gateway_id<'e, E>(
    executor: E,
    gateway_transaction_id: &str,
) -> DbResult<Option<Transaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{TRANSACTION_SELECT} WHERE gateway_transaction_id = ?1");
    let transaction = sqlx::query_as::<_, Transaction>(&sql)
        .bind(gateway_transaction_id)
        .fetch_optional(executor)
        .await?;

    Ok(transaction)
}

pub(crate) async fn insert_transaction<'e, E>(executor: E, transaction: &Transaction) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    validate_payment_amount(transaction.amount)?;
    validate_required_text("currency_code", &transaction.currency_code, 3)?;

    debug!(
        owner = ?transaction.owner(),
        kind = ?transaction.kind,
        status = ?transaction.status,
        amount = transaction.amount,
        "Recording transaction"
    );

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, transactionable_type, transactionable_id, kind, status, amount,
            currency_code, payment_method_id, gateway_transaction_id,
            failure_reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&transaction.id)
    .bind(transaction.transactionable_type)
    .bind(&transaction.transactionable_id)
    .bind(transaction.kind)
    .bind(transaction.status)
    .bind(transaction.amount)
    .bind(&transaction.currency_code)
    .bind(&transaction.payment_method_id)
    .bind(&transaction.gateway_transaction_id)
    .bind(&transaction.failure_reason)
    .bind(transaction.created_at)
    .execute(executor)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } if field.ends_with(".gateway_transaction_id") => {
            DbError::duplicate(
                "gateway_transaction_id",
                transaction.gateway_transaction_id.clone().unwrap_or_default(),
            )
        }
        other => other,
    })?;

    Ok(())
}

/// Builds a transaction row with a fresh id and the current time.
pub fn new_transaction(
    owner: &Transactionable,
    kind: TransactionKind,
    status: TransactionStatus,
    amount: i64,
    currency_code: &str,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4().to_string(),
        transactionable_type: owner.kind(),
        transactionable_id: owner.id().to_string(),
        kind,
        status,
        amount,
        currency_code: currency_code.to_ascii_uppercase(),
        payment_method_id: None,
        gateway_transaction_id: None,
        failure_reason: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_record_expense_and_summarize() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();
        let owner = Transactionable::Expense("exp-1".to_string());

        let paid = new_transaction(
            &owner,
            TransactionKind::Payment,
            TransactionStatus::Succeeded,
            7_500,
            "xof",
        );
        let failed = new_transaction(
            &owner,
            TransactionKind::Payment,
            TransactionStatus::Failed,
            2_000,
            "XOF",
        );
        repo.record(&paid).await.unwrap();
        repo.record(&failed).await.unwrap();

        let rows = repo.list_for(&owner).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].currency_code, "XOF");
        assert_eq!(rows[0].owner(), owner);

        let summary = repo.summarize(&owner).await.unwrap();
        assert_eq!(summary.net_paid.minor(), 7_500);

        let other = Transactionable::Purchase("exp-1".to_string());
        assert!(repo.list_for(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sell_transactions_refused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let owner = Transactionable::Sell("order-1".to_string());

        let tx = new_transaction(
            &owner,
            TransactionKind::Payment,
            TransactionStatus::Succeeded,
            100,
            "XOF",
        );
        assert!(db.transactions().record(&tx).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_gateway_id_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();
        let owner = Transactionable::Purchase("po-1".to_string());

        let mut first = new_transaction(
            &owner,
            TransactionKind::Payment,
            TransactionStatus::Succeeded,
            100,
            "XOF",
        );
        first.gateway_transaction_id = Some("gw-1".to_string());
        let mut second = first.clone();
        second.id = Uuid::new_v4().to_string();

        repo.record(&first).await.unwrap();
        let err = repo.record(&second).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::UniqueViolation { ref field, .. } if field == "gateway_transaction_id"
        ));

        let found = repo.get_by_gateway_id("gw-1").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let owner = Transactionable::Expense("exp-2".to_string());

        let tx = new_transaction(
            &owner,
            TransactionKind::Payment,
            TransactionStatus::Succeeded,
            0,
            "XOF",
        );
        let err = db.transactions().record(&tx).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
