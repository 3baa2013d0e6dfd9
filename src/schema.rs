use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INCOME" => Some(TransactionType::Income),
            "EXPENSE" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

/// A single income or expense entry owned by one user.
///
/// `amount` is always positive; direction is carried by `transaction_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Surrogate key, `None` until the store assigns one
    pub id: Option<i64>,
    pub user_id: String,
    pub amount: f64,
    /// Free-text label. The suggested category list is a UI concern.
    pub category: String,
    pub description: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub date: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }

    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    /// Income as positive, expense as negative.
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}

/// User input for the add-transaction flow, before an owner and id are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub date: DateTime<Utc>,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<()> {
        validate_fields(self.amount, &self.category)
    }

    pub fn into_transaction(self, user_id: &str) -> Result<Transaction> {
        self.validate()?;
        if user_id.trim().is_empty() {
            return Err(InsightsError::MissingUserId);
        }

        Ok(Transaction {
            id: None,
            user_id: user_id.to_string(),
            amount: self.amount,
            category: self.category.trim().to_string(),
            description: self.description,
            transaction_type: self.transaction_type,
            date: self.date,
        })
    }
}

pub(crate) fn validate_fields(amount: f64, category: &str) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(InsightsError::InvalidTransaction(format!(
            "invalid amount {}: must be greater than zero",
            amount
        )));
    }
    if category.trim().is_empty() {
        return Err(InsightsError::InvalidTransaction(
            "category is required".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub total: f64,
    /// Share of the period total, 0-100 with one decimal
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyChartData {
    /// "{short month}\n{year}" in the display locale
    pub month: String,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub total_balance: f64,
    pub monthly_income: f64,
    pub monthly_expense: f64,
    /// Expense categories for the current month
    pub category_spendings: Vec<CategorySpending>,
    /// Six consecutive months, oldest first, ending at the current month
    pub monthly_chart_data: Vec<MonthlyChartData>,
    pub ai_insights: Vec<AiInsight>,
}

impl DashboardData {
    pub fn with_insights(mut self, insights: Vec<AiInsight>) -> Self {
        self.ai_insights = insights;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Warning,
    Suggestion,
    Positive,
}

impl InsightType {
    /// Case-insensitive; anything unrecognised is treated as positive.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "warning" => InsightType::Warning,
            "suggestion" => InsightType::Suggestion,
            _ => InsightType::Positive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsight {
    pub message: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_suggestion: Option<f64>,
}

impl AiInsight {
    pub fn new(message: impl Into<String>, insight_type: InsightType) -> Self {
        Self {
            message: message.into(),
            insight_type,
            savings_suggestion: None,
        }
    }
}

/// Strict JSON shape requested from the remote generator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InsightResponse {
    #[schemars(description = "Short, actionable observations about the user's spending")]
    pub insights: Vec<InsightDto>,

    #[schemars(
        description = "Estimated amount the user could save in the period by cutting unnecessary spending, or null"
    )]
    #[serde(default)]
    pub savings_suggestion: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InsightDto {
    #[schemars(description = "User-facing message in the user's language")]
    pub message: String,

    #[schemars(description = "One of: warning, suggestion, positive")]
    #[serde(rename = "type")]
    pub insight_type: String,
}

impl From<InsightDto> for AiInsight {
    fn from(dto: InsightDto) -> Self {
        AiInsight::new(dto.message, InsightType::from_label(&dto.insight_type))
    }
}
