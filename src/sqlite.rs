use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;

use crate::error::{InsightsError, Result};
use crate::periods::DateRange;
use crate::schema::{Transaction, TransactionType};
use crate::store::TransactionStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL,
    amount      REAL    NOT NULL CHECK (amount > 0),
    category    TEXT    NOT NULL,
    description TEXT    NOT NULL DEFAULT '',
    type        TEXT    NOT NULL,
    date        INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_user_type_date
    ON transactions (user_id, type, date);
";

const SELECT_COLUMNS: &str = "id, user_id, amount, category, description, type, date";

/// Transaction store on an embedded SQLite database. Dates are Unix milliseconds.
///
/// Queries run on tokio's blocking pool, so callers never stall the executor.
pub struct SqliteTransactionStore {
    conn: Arc<Mutex<Connection>>,
    changes: watch::Sender<u64>,
}

impl SqliteTransactionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| InsightsError::Store("connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| InsightsError::Store(format!("blocking task failed: {}", e)))?
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(InsightsError::Store(message)),
    )
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let raw_type: String = row.get(5)?;
    let transaction_type = TransactionType::parse(&raw_type)
        .ok_or_else(|| conversion_error(5, format!("unknown transaction type '{}'", raw_type)))?;

    let millis: i64 = row.get(6)?;
    let date = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_error(6, format!("timestamp {} out of range", millis)))?;

    Ok(Transaction {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        transaction_type,
        date,
    })
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn sum_amount(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<f64> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                "SELECT COALESCE(SUM(amount), 0.0) FROM transactions
                 WHERE user_id = ?1 AND type = ?2 AND date BETWEEN ?3 AND ?4",
                params![
                    user_id,
                    transaction_type.as_str(),
                    range.start.timestamp_millis(),
                    range.end.timestamp_millis()
                ],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn sum_amount_by_category(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<Vec<(String, f64)>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT category, SUM(amount) AS total FROM transactions
                 WHERE user_id = ?1 AND type = ?2 AND date BETWEEN ?3 AND ?4
                 GROUP BY category",
            )?;
            let rows = stmt.query_map(
                params![
                    user_id,
                    transaction_type.as_str(),
                    range.start.timestamp_millis(),
                    range.end.timestamp_millis()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transactions WHERE user_id = ?1 ORDER BY date DESC, id DESC",
                SELECT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_transaction)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn transaction_by_id(&self, user_id: &str, id: i64) -> Result<Option<Transaction>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM transactions WHERE id = ?1 AND user_id = ?2",
                        SELECT_COLUMNS
                    ),
                    params![id, user_id],
                    row_to_transaction,
                )
                .optional()?)
        })
        .await
    }

    async fn insert(&self, transaction: Transaction) -> Result<i64> {
        if transaction.user_id.trim().is_empty() {
            return Err(InsightsError::MissingUserId);
        }

        let id = self
            .with_conn(move |conn| {
                // an existing id is only replaced when the caller owns that row
                let changed = conn.execute(
                    "INSERT INTO transactions
                     (id, user_id, amount, category, description, type, date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                         amount = excluded.amount,
                         category = excluded.category,
                         description = excluded.description,
                         type = excluded.type,
                         date = excluded.date
                     WHERE transactions.user_id = excluded.user_id",
                    params![
                        transaction.id,
                        transaction.user_id,
                        transaction.amount,
                        transaction.category,
                        transaction.description,
                        transaction.transaction_type.as_str(),
                        transaction.date.timestamp_millis()
                    ],
                )?;

                match transaction.id {
                    Some(id) if changed == 0 => Err(InsightsError::TransactionNotFound(id)),
                    Some(id) => Ok(id),
                    None => Ok(conn.last_insert_rowid()),
                }
            })
            .await?;

        self.notify();
        Ok(id)
    }

    async fn update(&self, transaction: Transaction) -> Result<()> {
        let id = transaction.id.ok_or_else(|| {
            InsightsError::InvalidTransaction("cannot update a transaction without an id".to_string())
        })?;

        let changed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "UPDATE transactions
                     SET amount = ?1, category = ?2, description = ?3, type = ?4, date = ?5
                     WHERE id = ?6 AND user_id = ?7",
                    params![
                        transaction.amount,
                        transaction.category,
                        transaction.description,
                        transaction.transaction_type.as_str(),
                        transaction.date.timestamp_millis(),
                        id,
                        transaction.user_id
                    ],
                )?)
            })
            .await?;

        if changed == 0 {
            return Err(InsightsError::TransactionNotFound(id));
        }
        self.notify();
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: i64) -> Result<()> {
        let user_id = user_id.to_string();
        let changed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM transactions WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                )?)
            })
            .await?;

        if changed == 0 {
            return Err(InsightsError::TransactionNotFound(id));
        }
        self.notify();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn expense(user: &str, amount: f64, category: &str, day: u32) -> Transaction {
        Transaction {
            id: None,
            user_id: user.to_string(),
            amount,
            category: category.to_string(),
            description: String::new(),
            transaction_type: TransactionType::Expense,
            date: Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap(),
        }
    }

    fn march() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_sqlite_sums_coalesce_to_zero() {
        let store = SqliteTransactionStore::open_in_memory().unwrap();
        let total = store
            .sum_amount("alice", TransactionType::Expense, march())
            .await
            .unwrap();
        assert_eq!(total, 0.0);
        assert!(store
            .sum_amount_by_category("alice", TransactionType::Expense, march())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_and_grouping() {
        let store = SqliteTransactionStore::open_in_memory().unwrap();
        let first = store.insert(expense("alice", 100.0, "Food", 2)).await.unwrap();
        store.insert(expense("alice", 50.0, "Food", 9)).await.unwrap();
        store.insert(expense("alice", 50.0, "Transport", 4)).await.unwrap();
        store.insert(expense("bob", 70.0, "Food", 4)).await.unwrap();

        let total = store
            .sum_amount("alice", TransactionType::Expense, march())
            .await
            .unwrap();
        assert_eq!(total, 200.0);

        let mut grouped = store
            .sum_amount_by_category("alice", TransactionType::Expense, march())
            .await
            .unwrap();
        grouped.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            grouped,
            vec![("Food".to_string(), 150.0), ("Transport".to_string(), 50.0)]
        );

        let all = store.all_transactions("alice").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].amount, 50.0);
        assert_eq!(all[0].category, "Food");

        let loaded = store.transaction_by_id("alice", first).await.unwrap().unwrap();
        assert_eq!(loaded.date, Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap());
        assert!(store.transaction_by_id("bob", first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_update_delete_scoped_to_owner() {
        let store = SqliteTransactionStore::open_in_memory().unwrap();
        let id = store.insert(expense("alice", 10.0, "Food", 2)).await.unwrap();

        assert!(matches!(
            store.delete("bob", id).await,
            Err(InsightsError::TransactionNotFound(_))
        ));

        let mut edited = store.transaction_by_id("alice", id).await.unwrap().unwrap();
        edited.category = "Groceries".to_string();
        store.update(edited).await.unwrap();
        assert_eq!(
            store.transaction_by_id("alice", id).await.unwrap().unwrap().category,
            "Groceries"
        );

        store.delete("alice", id).await.unwrap();
        assert!(store.all_transactions("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_insert_with_id_keeps_other_users_row() {
        let store = SqliteTransactionStore::open_in_memory().unwrap();
        let id = store.insert(expense("alice", 10.0, "Food", 2)).await.unwrap();

        let mut intruder = expense("bob", 1.0, "Food", 2);
        intruder.id = Some(id);
        assert!(matches!(
            store.insert(intruder).await,
            Err(InsightsError::TransactionNotFound(_))
        ));
        let alice = store.all_transactions("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].amount, 10.0);
        assert!(store.all_transactions("bob").await.unwrap().is_empty());

        let mut own = expense("alice", 30.0, "Groceries", 3);
        own.id = Some(id);
        assert_eq!(store.insert(own).await.unwrap(), id);
        let alice = store.all_transactions("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].category, "Groceries");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sqlite_runs_on_multi_thread_runtime() {
        let store = std::sync::Arc::new(SqliteTransactionStore::open_in_memory().unwrap());
        let writers: Vec<_> = (1..=4)
            .map(|day| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move { store.insert(expense("alice", 5.0, "Food", day)).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let total = store
            .sum_amount("alice", TransactionType::Expense, march())
            .await
            .unwrap();
        assert_eq!(total, 20.0);
    }
}
