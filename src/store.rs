use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::error::{InsightsError, Result};
use crate::periods::DateRange;
use crate::schema::{Transaction, TransactionType};

/// Per-user persisted transaction collection.
///
/// Aggregates over an empty match must come back as `0.0`, never an error.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn sum_amount(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<f64>;

    async fn sum_amount_by_category(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<Vec<(String, f64)>>;

    /// Newest first.
    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>>;

    async fn transaction_by_id(&self, user_id: &str, id: i64) -> Result<Option<Transaction>>;

    /// Returns the assigned id.
    async fn insert(&self, transaction: Transaction) -> Result<i64>;

    /// Full replace, scoped to `transaction.user_id`.
    async fn update(&self, transaction: Transaction) -> Result<()>;

    async fn delete(&self, user_id: &str, id: i64) -> Result<()>;

    /// Ticks once per successful write.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionFilter {
    #[default]
    All,
    ByType(TransactionType),
    ByCategory(String),
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            TransactionFilter::All => true,
            TransactionFilter::ByType(kind) => transaction.transaction_type == *kind,
            TransactionFilter::ByCategory(category) => transaction.category == *category,
        }
    }
}

/// Applies `filter`, then a case-insensitive search over description and category.
/// A blank query matches everything. Input order is preserved.
pub fn filter_transactions(
    transactions: Vec<Transaction>,
    filter: &TransactionFilter,
    query: &str,
) -> Vec<Transaction> {
    let needle = query.trim().to_lowercase();

    transactions
        .into_iter()
        .filter(|t| filter.matches(t))
        .filter(|t| {
            needle.is_empty()
                || t.description.to_lowercase().contains(&needle)
                || t.category.to_lowercase().contains(&needle)
        })
        .collect()
}

struct MemoryState {
    next_id: i64,
    rows: Vec<Transaction>,
}

/// Store adapter backed by a `Vec` behind an async lock.
pub struct InMemoryTransactionStore {
    state: RwLock<MemoryState>,
    changes: watch::Sender<u64>,
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(MemoryState {
                next_id: 1,
                rows: Vec::new(),
            }),
            changes,
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }

    fn matching<'a>(
        rows: &'a [Transaction],
        user_id: &'a str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        rows.iter().filter(move |t| {
            t.user_id == user_id
                && t.transaction_type == transaction_type
                && range.contains(&t.date)
        })
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn sum_amount(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<f64> {
        let state = self.state.read().await;
        Ok(Self::matching(&state.rows, user_id, transaction_type, range)
            .map(|t| t.amount)
            .sum())
    }

    async fn sum_amount_by_category(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<Vec<(String, f64)>> {
        let state = self.state.read().await;
        let mut totals: Vec<(String, f64)> = Vec::new();

        for txn in Self::matching(&state.rows, user_id, transaction_type, range) {
            match totals.iter_mut().find(|(category, _)| *category == txn.category) {
                Some((_, total)) => *total += txn.amount,
                None => totals.push((txn.category.clone(), txn.amount)),
            }
        }

        Ok(totals)
    }

    async fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .rows
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn transaction_by_id(&self, user_id: &str, id: i64) -> Result<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .rows
            .iter()
            .find(|t| t.id == Some(id) && t.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, mut transaction: Transaction) -> Result<i64> {
        if transaction.user_id.trim().is_empty() {
            return Err(InsightsError::MissingUserId);
        }

        let id = {
            let mut state = self.state.write().await;
            let id = match transaction.id {
                Some(id) => {
                    // replace-on-conflict, only over the caller's own row
                    if let Some(existing) = state.rows.iter().find(|t| t.id == Some(id)) {
                        if existing.user_id != transaction.user_id {
                            return Err(InsightsError::TransactionNotFound(id));
                        }
                    }
                    state.rows.retain(|t| t.id != Some(id));
                    state.next_id = state.next_id.max(id.saturating_add(1));
                    id
                }
                None => {
                    let id = state.next_id;
                    state.next_id = id.checked_add(1).ok_or_else(|| {
                        InsightsError::Store("transaction id space exhausted".to_string())
                    })?;
                    id
                }
            };
            transaction.id = Some(id);
            state.rows.push(transaction);
            id
        };

        self.notify();
        Ok(id)
    }

    async fn update(&self, transaction: Transaction) -> Result<()> {
        let id = transaction.id.ok_or_else(|| {
            InsightsError::InvalidTransaction("cannot update a transaction without an id".to_string())
        })?;

        {
            let mut state = self.state.write().await;
            let slot = state
                .rows
                .iter_mut()
                .find(|t| t.id == Some(id) && t.user_id == transaction.user_id)
                .ok_or(InsightsError::TransactionNotFound(id))?;
            *slot = transaction;
        }

        self.notify();
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: i64) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let before = state.rows.len();
            state
                .rows
                .retain(|t| !(t.id == Some(id) && t.user_id == user_id));
            if state.rows.len() == before {
                return Err(InsightsError::TransactionNotFound(id));
            }
        }

        self.notify();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
