use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeZone;
use log::{debug, info, warn};

use crate::error::{InsightsError, Result};
use crate::format::{format_money, Locale};
use crate::prompts::{build_insight_prompt, strip_code_fences};
use crate::schema::{AiInsight, InsightResponse, InsightType, Transaction};

/// Whole-percent share of total expenses a single category must exceed to raise a warning.
pub const WARNING_THRESHOLD_PERCENT: u32 = 30;

/// Remote text generator, e.g. an LLM endpoint.
///
/// Implementations may fail for any reason; callers treat every error the same.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedInsights {
    pub source: InsightSource,
    /// Never empty
    pub insights: Vec<AiInsight>,
}

/// Remote-first insight generation with a deterministic local fallback.
#[derive(Clone)]
pub struct InsightService {
    generator: Option<Arc<dyn InsightGenerator>>,
    locale: Locale,
}

impl InsightService {
    pub fn new(generator: Arc<dyn InsightGenerator>, locale: Locale) -> Self {
        Self {
            generator: Some(generator),
            locale,
        }
    }

    /// Service without a remote generator; always uses the local heuristic.
    pub fn local_only(locale: Locale) -> Self {
        Self {
            generator: None,
            locale,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Never fails and never returns an empty list. Remote errors are logged and
    /// replaced by [`local_insights`].
    pub async fn generate<Tz: TimeZone>(
        &self,
        transactions: &[Transaction],
        period_days: u32,
        tz: &Tz,
    ) -> GeneratedInsights
    where
        Tz::Offset: fmt::Display,
    {
        if let Some(generator) = &self.generator {
            let prompt = build_insight_prompt(transactions, period_days, self.locale, tz);

            match self.remote_insights(generator.as_ref(), &prompt).await {
                Ok(insights) => {
                    info!("Generated {} insights remotely", insights.len());
                    return GeneratedInsights {
                        source: InsightSource::Remote,
                        insights,
                    };
                }
                Err(e) => warn!("Remote insight generation failed, using local analysis: {}", e),
            }
        }

        let insights = local_insights(transactions, self.locale);
        info!("Generated {} insights locally", insights.len());
        GeneratedInsights {
            source: InsightSource::Local,
            insights,
        }
    }

    pub async fn insights<Tz: TimeZone>(
        &self,
        transactions: &[Transaction],
        period_days: u32,
        tz: &Tz,
    ) -> Vec<AiInsight>
    where
        Tz::Offset: fmt::Display,
    {
        self.generate(transactions, period_days, tz).await.insights
    }

    async fn remote_insights(
        &self,
        generator: &dyn InsightGenerator,
        prompt: &str,
    ) -> Result<Vec<AiInsight>> {
        let raw = generator.generate(prompt).await?;
        debug!("Remote generator returned {} bytes", raw.len());
        parse_insight_response(&raw, self.locale)
    }
}

/// Parses a (possibly fenced) JSON insight response.
///
/// A positive `savings_suggestion` becomes one extra suggestion insight. A
/// response that yields no insights at all is an error.
pub fn parse_insight_response(raw: &str, locale: Locale) -> Result<Vec<AiInsight>> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(InsightsError::EmptyResponse);
    }

    let response: InsightResponse = serde_json::from_str(body)?;

    let mut insights: Vec<AiInsight> = response.insights.into_iter().map(AiInsight::from).collect();

    if let Some(savings) = response
        .savings_suggestion
        .filter(|amount| amount.is_finite() && *amount > 0.0)
    {
        insights.push(AiInsight {
            message: savings_message(savings, locale),
            insight_type: InsightType::Suggestion,
            savings_suggestion: Some(savings),
        });
    }

    if insights.is_empty() {
        return Err(InsightsError::EmptyResponse);
    }
    Ok(insights)
}

/// Deterministic heuristic over `transactions`; always returns at least one insight.
///
/// Emits a warning when the largest expense category's share, truncated to a
/// whole percent, strictly exceeds [`WARNING_THRESHOLD_PERCENT`]. Otherwise a
/// single encouragement to keep tracking.
pub fn local_insights(transactions: &[Transaction], locale: Locale) -> Vec<AiInsight> {
    let mut by_category: Vec<(&str, f64)> = Vec::new();
    for txn in transactions.iter().filter(|t| t.is_expense()) {
        match by_category.iter_mut().find(|(category, _)| *category == txn.category) {
            Some((_, total)) => *total += txn.amount,
            None => by_category.push((txn.category.as_str(), txn.amount)),
        }
    }

    let total_expense: f64 = by_category.iter().map(|(_, total)| total).sum();

    if total_expense > 0.0 {
        // first category wins ties
        let top = by_category
            .iter()
            .fold(None::<(&str, f64)>, |best, &(category, total)| match best {
                Some((_, best_total)) if total <= best_total => best,
                _ => Some((category, total)),
            });

        if let Some((category, total)) = top {
            let percent = (total / total_expense * 100.0) as u32;
            if percent > WARNING_THRESHOLD_PERCENT {
                return vec![AiInsight::new(
                    category_warning_message(category, percent, locale),
                    InsightType::Warning,
                )];
            }
        }
    }

    vec![AiInsight::new(
        keep_tracking_message(locale),
        InsightType::Positive,
    )]
}

fn category_warning_message(category: &str, percent: u32, locale: Locale) -> String {
    match locale {
        Locale::PtBr => format!(
            "Você gastou {}% dos seus gastos em {}. Considere reduzir.",
            percent, category
        ),
        Locale::EnUs => format!(
            "You spent {}% of your expenses on {}. Consider cutting back.",
            percent, category
        ),
    }
}

fn savings_message(amount: f64, locale: Locale) -> String {
    let money = format_money(amount, locale);
    match locale {
        Locale::PtBr => format!(
            "Você poderia economizar {} reduzindo gastos desnecessários.",
            money
        ),
        Locale::EnUs => format!("You could save {} by cutting unnecessary expenses.", money),
    }
}

fn keep_tracking_message(locale: Locale) -> String {
    match locale {
        Locale::PtBr => {
            "Continue registrando suas transações para receber insights mais precisos!".to_string()
        }
        Locale::EnUs => "Keep logging your transactions to get more accurate insights!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TransactionType;
    use chrono::Utc;
    use std::sync::Mutex;

    fn txn(kind: TransactionType, amount: f64, category: &str) -> Transaction {
        Transaction {
            id: None,
            user_id: "alice".to_string(),
            amount,
            category: category.to_string(),
            description: String::new(),
            transaction_type: kind,
            date: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        }
    }

    fn food_heavy() -> Vec<Transaction> {
        vec![
            txn(TransactionType::Expense, 100.0, "Food"),
            txn(TransactionType::Expense, 50.0, "Food"),
            txn(TransactionType::Expense, 50.0, "Transport"),
        ]
    }

    struct ScriptedGenerator {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InsightGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| InsightsError::GenerationFailed("quota exceeded".to_string()))
        }
    }

    #[test]
    fn test_local_warns_on_dominant_category() {
        let insights = local_insights(&food_heavy(), Locale::PtBr);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Warning);
        assert!(insights[0].message.contains("Food"));
        assert!(insights[0].message.contains("75%"));
    }

    #[test]
    fn test_local_never_empty() {
        let empty = local_insights(&[], Locale::PtBr);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].insight_type, InsightType::Positive);

        let income_only = local_insights(
            &[txn(TransactionType::Income, 5000.0, "Salary")],
            Locale::EnUs,
        );
        assert_eq!(income_only.len(), 1);
        assert_eq!(income_only[0].insight_type, InsightType::Positive);
    }

    #[test]
    fn test_local_threshold_uses_whole_percent() {
        let split = |food: f64, misc: f64| {
            vec![
                txn(TransactionType::Expense, food, "Food"),
                txn(TransactionType::Expense, 30.0, "Rent"),
                txn(TransactionType::Expense, 30.0, "Fun"),
                txn(TransactionType::Expense, misc, "Misc"),
            ]
        };

        // exactly 30%
        let insights = local_insights(&split(30.0, 10.0), Locale::PtBr);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Positive);

        // 30.5% truncates to 30%
        let insights = local_insights(&split(30.5, 9.5), Locale::PtBr);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Positive);

        let insights = local_insights(&split(31.0, 9.0), Locale::PtBr);
        assert_eq!(insights[0].insight_type, InsightType::Warning);
        assert_eq!(
            insights[0].message,
            "Você gastou 31% dos seus gastos em Food. Considere reduzir."
        );
    }

    #[test]
    fn test_local_ignores_income() {
        let mut rows = food_heavy();
        rows.push(txn(TransactionType::Income, 10_000.0, "Salary"));
        let insights = local_insights(&rows, Locale::EnUs);
        assert_eq!(insights[0].insight_type, InsightType::Warning);
        assert!(insights[0].message.contains("75%"));
        assert!(insights[0].message.contains("Food"));
    }

    #[test]
    fn test_parse_fenced_response_with_savings() {
        let raw = "```json\n{\"insights\":[{\"message\":\"Watch delivery apps\",\"type\":\"WARNING\"},{\"message\":\"Nice\",\"type\":\"other\"}],\"savings_suggestion\":120.5}\n```";
        let insights = parse_insight_response(raw, Locale::PtBr).unwrap();

        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0].insight_type, InsightType::Warning);
        assert_eq!(insights[1].insight_type, InsightType::Positive);
        assert_eq!(insights[2].insight_type, InsightType::Suggestion);
        assert_eq!(insights[2].savings_suggestion, Some(120.5));
        assert!(insights[2].message.contains("R$ 120,50"));
    }

    #[test]
    fn test_parse_ignores_non_positive_savings() {
        let raw = r#"{"insights":[{"message":"ok","type":"positive"}],"savings_suggestion":0}"#;
        let insights = parse_insight_response(raw, Locale::EnUs).unwrap();
        assert_eq!(insights.len(), 1);
        assert!(insights.iter().all(|i| i.savings_suggestion.is_none()));
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(
            parse_insight_response("  ", Locale::PtBr),
            Err(InsightsError::EmptyResponse)
        ));
        assert!(matches!(
            parse_insight_response(r#"{"insights":[],"savings_suggestion":null}"#, Locale::PtBr),
            Err(InsightsError::EmptyResponse)
        ));
        assert!(matches!(
            parse_insight_response(r#"{"insights":[{"message":"trunc"#, Locale::PtBr),
            Err(InsightsError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_success_is_used() {
        let generator = Arc::new(ScriptedGenerator::replying(
            r#"{"insights":[{"message":"Great month","type":"positive"}],"savings_suggestion":null}"#,
        ));
        let service = InsightService::new(generator.clone(), Locale::EnUs);

        let result = service.generate(&food_heavy(), 30, &Utc).await;
        assert_eq!(result.source, InsightSource::Remote);
        assert_eq!(result.insights, vec![AiInsight::new("Great month", InsightType::Positive)]);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Food - 100.00 (EXPENSE)"));
        assert!(prompts[0].contains("last 30 days"));
    }

    #[tokio::test]
    async fn test_malformed_remote_matches_local_fallback() {
        let service = InsightService::new(
            Arc::new(ScriptedGenerator::replying("{\"insights\": [")),
            Locale::PtBr,
        );
        let result = service.generate(&food_heavy(), 30, &Utc).await;
        assert_eq!(result.source, InsightSource::Local);
        assert_eq!(result.insights, local_insights(&food_heavy(), Locale::PtBr));
    }

    #[tokio::test]
    async fn test_remote_error_falls_back() {
        let service = InsightService::new(Arc::new(ScriptedGenerator::failing()), Locale::PtBr);
        let insights = service.insights(&[], 30, &Utc).await;
        assert_eq!(insights, local_insights(&[], Locale::PtBr));
    }

    #[tokio::test]
    async fn test_local_only_service_skips_remote() {
        let service = InsightService::local_only(Locale::EnUs);
        let result = service.generate(&food_heavy(), 30, &Utc).await;
        assert_eq!(result.source, InsightSource::Local);
        assert_eq!(result.insights.len(), 1);
    }
}
