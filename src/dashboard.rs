use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use log::debug;

use crate::error::{InsightsError, Result};
use crate::format::Locale;
use crate::periods::{current_month_range, trailing_months, DateRange, TREND_MONTHS};
use crate::schema::{CategorySpending, DashboardData, MonthlyChartData, TransactionType};
use crate::store::TransactionStore;

/// Builds [`DashboardData`] snapshots from store aggregates.
///
/// Every call issues its queries sequentially and fails as a whole: a single
/// store error aborts the snapshot with [`InsightsError::AggregationFailed`].
#[derive(Clone)]
pub struct DashboardAggregator {
    store: Arc<dyn TransactionStore>,
    locale: Locale,
}

impl DashboardAggregator {
    pub fn new(store: Arc<dyn TransactionStore>, locale: Locale) -> Self {
        Self { store, locale }
    }

    /// Snapshot for `user_id` as of `now`. `ai_insights` is left empty.
    pub async fn build<Tz: TimeZone>(
        &self,
        user_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<DashboardData> {
        if user_id.trim().is_empty() {
            return Err(InsightsError::MissingUserId);
        }

        let current = current_month_range(now);
        let months = trailing_months(now, TREND_MONTHS, self.locale);

        debug!(
            "Aggregating dashboard for user {} from {} to {}",
            user_id, current.start, current.end
        );

        let monthly_income = self.sum(user_id, TransactionType::Income, current).await?;
        let monthly_expense = self.sum(user_id, TransactionType::Expense, current).await?;

        let category_totals = self
            .store
            .sum_amount_by_category(user_id, TransactionType::Expense, current)
            .await
            .map_err(aggregation_error)?;
        let category_spendings = category_breakdown(category_totals);

        let mut monthly_chart_data = Vec::with_capacity(months.len());
        for period in months {
            let income = self.sum(user_id, TransactionType::Income, period.range).await?;
            let expense = self.sum(user_id, TransactionType::Expense, period.range).await?;
            monthly_chart_data.push(MonthlyChartData {
                month: period.label,
                income,
                expense,
            });
        }

        Ok(DashboardData {
            total_balance: monthly_income - monthly_expense,
            monthly_income,
            monthly_expense,
            category_spendings,
            monthly_chart_data,
            ai_insights: Vec::new(),
        })
    }

    async fn sum(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        range: DateRange,
    ) -> Result<f64> {
        self.store
            .sum_amount(user_id, transaction_type, range)
            .await
            .map_err(aggregation_error)
    }
}

fn aggregation_error(err: InsightsError) -> InsightsError {
    match err {
        InsightsError::AggregationFailed(_) => err,
        other => InsightsError::AggregationFailed(other.to_string()),
    }
}

/// Percentages of the grouped total, largest category first.
///
/// A zero total yields 0% for every category.
pub fn category_breakdown(totals: Vec<(String, f64)>) -> Vec<CategorySpending> {
    let grand_total: f64 = totals.iter().map(|(_, total)| total).sum();

    let mut spendings: Vec<CategorySpending> = totals
        .into_iter()
        .map(|(category, total)| CategorySpending {
            percentage: if grand_total > 0.0 {
                round_to_tenth(total / grand_total * 100.0)
            } else {
                0.0
            },
            category,
            total,
        })
        .collect();

    spendings.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    spendings
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
