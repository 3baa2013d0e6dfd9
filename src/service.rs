use std::fmt;
use std::sync::Arc;

use chrono::TimeZone;
use futures::stream::{self, Stream};
use log::{debug, info};
use tokio::sync::watch;

use crate::config::InsightsConfig;
use crate::dashboard::DashboardAggregator;
use crate::error::{InsightsError, Result};
use crate::export;
use crate::insights::{InsightGenerator, InsightService};
use crate::periods::Clock;
use crate::preferences::PreferenceStore;
use crate::schema::{validate_fields, DashboardData, NewTransaction, Transaction};
use crate::store::{filter_transactions, TransactionFilter, TransactionStore};

/// Use cases the UI layer calls: dashboard snapshots, CRUD, history and export.
///
/// All state lives in the injected store and preference adapters; the service
/// itself is a cheap handle and can be cloned freely.
pub struct FinanceService<C: Clock> {
    store: Arc<dyn TransactionStore>,
    preferences: Arc<dyn PreferenceStore>,
    clock: Arc<C>,
    config: InsightsConfig,
    aggregator: DashboardAggregator,
    insights: InsightService,
}

impl<C: Clock> Clone for FinanceService<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            preferences: Arc::clone(&self.preferences),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            aggregator: self.aggregator.clone(),
            insights: self.insights.clone(),
        }
    }
}

impl<C> FinanceService<C>
where
    C: Clock,
    <C::Tz as TimeZone>::Offset: fmt::Display,
{
    /// Service that only uses the local insight heuristic.
    pub fn new(
        store: Arc<dyn TransactionStore>,
        preferences: Arc<dyn PreferenceStore>,
        clock: C,
        config: InsightsConfig,
    ) -> Self {
        Self {
            aggregator: DashboardAggregator::new(Arc::clone(&store), config.locale),
            insights: InsightService::local_only(config.locale),
            store,
            preferences,
            clock: Arc::new(clock),
            config,
        }
    }

    /// Tries `generator` first for insights, falling back to the local heuristic.
    pub fn with_generator(mut self, generator: Arc<dyn InsightGenerator>) -> Self {
        self.insights = InsightService::new(generator, self.config.locale);
        self
    }

    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    /// Current snapshot for `user_id`.
    ///
    /// Aggregation errors are returned; insight generation never fails and is
    /// skipped entirely while the user has AI insights switched off.
    pub async fn dashboard(&self, user_id: &str) -> Result<DashboardData> {
        let now = self.clock.now();
        let data = self.aggregator.build(user_id, &now).await?;

        let ai_enabled = *self.preferences.ai_insights_enabled().borrow();
        if !ai_enabled {
            debug!("AI insights disabled for user {}", user_id);
            return Ok(data);
        }

        let transactions = self
            .store
            .all_transactions(user_id)
            .await
            .map_err(|e| InsightsError::AggregationFailed(e.to_string()))?;

        let insights = self
            .insights
            .insights(&transactions, self.config.period_days, &now.timezone())
            .await;

        Ok(data.with_insights(insights))
    }

    pub async fn add_transaction(
        &self,
        user_id: &str,
        transaction: NewTransaction,
    ) -> Result<Transaction> {
        let mut transaction = transaction.into_transaction(user_id)?;
        let id = self.store.insert(transaction.clone()).await?;
        transaction.id = Some(id);

        info!("Added transaction {} for user {}", id, user_id);
        Ok(transaction)
    }

    /// Replaces a stored transaction owned by `user_id`.
    pub async fn update_transaction(&self, user_id: &str, mut transaction: Transaction) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(InsightsError::MissingUserId);
        }
        validate_fields(transaction.amount, &transaction.category)?;

        transaction.user_id = user_id.to_string();
        transaction.category = transaction.category.trim().to_string();
        self.store.update(transaction).await
    }

    pub async fn delete_transaction(&self, user_id: &str, id: i64) -> Result<()> {
        self.store.delete(user_id, id).await?;
        info!("Deleted transaction {} for user {}", id, user_id);
        Ok(())
    }

    /// Newest-first history narrowed by `filter` and a free-text `query`.
    pub async fn history(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        query: &str,
    ) -> Result<Vec<Transaction>> {
        let all = self.store.all_transactions(user_id).await?;
        Ok(filter_transactions(all, filter, query))
    }

    pub async fn export_csv(&self, user_id: &str) -> Result<String> {
        let transactions = self.store.all_transactions(user_id).await?;
        let tz = self.clock.now().timezone();
        export::export_csv(&transactions, self.config.locale, &tz)
    }
}

struct WatchState<C: Clock> {
    service: FinanceService<C>,
    user_id: String,
    changes: watch::Receiver<u64>,
    ai_enabled: watch::Receiver<bool>,
    started: bool,
}

impl<C> FinanceService<C>
where
    C: Clock + 'static,
    <C::Tz as TimeZone>::Offset: fmt::Display,
{
    /// Yields a snapshot right away, then a fresh one after every store write
    /// or change of the AI insights flag. Ends when either source is dropped.
    pub fn watch_dashboard(&self, user_id: &str) -> impl Stream<Item = Result<DashboardData>> {
        let state = WatchState {
            service: self.clone(),
            user_id: user_id.to_string(),
            changes: self.store.subscribe(),
            ai_enabled: self.preferences.ai_insights_enabled(),
            started: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.started {
                tokio::select! {
                    changed = state.changes.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                    changed = state.ai_enabled.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                }
            } else {
                state.started = true;
            }

            let _ = state.changes.borrow_and_update();
            let _ = state.ai_enabled.borrow_and_update();

            let snapshot = state.service.dashboard(&state.user_id).await;
            Some((snapshot, state))
        })
    }
}
