// Prompt construction and response clean-up for the remote insight generator

use std::fmt;

use chrono::TimeZone;

use crate::format::Locale;
use crate::schema::Transaction;

const INSIGHT_PROMPT_TEMPLATE: &str = r#"You are a personal finance assistant. Analyze the user's transactions from the last {period_days} days and produce short, practical insights about their spending habits.

Write every message in {language}. Monetary values are in {currency}.

## TRANSACTIONS (date: category - amount (type))
{transactions}

## OUTPUT FORMAT
Respond ONLY with valid JSON, without markdown or commentary, using exactly this structure:
{"insights": [{"message": "string", "type": "warning" | "suggestion" | "positive"}], "savings_suggestion": number | null}

## RULES
- Return between 1 and 5 insights.
- Use "warning" for overspending or risky patterns, "suggestion" for a concrete action, "positive" for healthy habits.
- `savings_suggestion` is how much the user could realistically save in the period, or null when there is no clear estimate.
"#;

const NO_TRANSACTIONS: &str = "(no transactions recorded)";

fn language_name(locale: Locale) -> &'static str {
    match locale {
        Locale::PtBr => "Brazilian Portuguese",
        Locale::EnUs => "English",
    }
}

fn currency_code(locale: Locale) -> &'static str {
    match locale {
        Locale::PtBr => "BRL",
        Locale::EnUs => "USD",
    }
}

/// `date: category - amount (type)`, with the date taken in `tz`.
pub fn summarize_transaction<Tz: TimeZone>(transaction: &Transaction, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    format!(
        "{}: {} - {:.2} ({})",
        transaction.date.with_timezone(tz).format("%Y-%m-%d"),
        transaction.category,
        transaction.amount,
        transaction.transaction_type.as_str()
    )
}

pub fn build_insight_prompt<Tz: TimeZone>(
    transactions: &[Transaction],
    period_days: u32,
    locale: Locale,
    tz: &Tz,
) -> String
where
    Tz::Offset: fmt::Display,
{
    let lines = if transactions.is_empty() {
        NO_TRANSACTIONS.to_string()
    } else {
        transactions
            .iter()
            .map(|t| summarize_transaction(t, tz))
            .collect::<Vec<_>>()
            .join("\n")
    };

    INSIGHT_PROMPT_TEMPLATE
        .replace("{period_days}", &period_days.to_string())
        .replace("{language}", language_name(locale))
        .replace("{currency}", currency_code(locale))
        .replace("{transactions}", &lines)
}

/// Removes a surrounding Markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
        if text.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            text = &text[4..];
        }
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TransactionType;
    use chrono::{FixedOffset, Utc};

    fn lunch() -> Transaction {
        Transaction {
            id: Some(1),
            user_id: "alice".to_string(),
            amount: 42.5,
            category: "Food".to_string(),
            description: "Lunch".to_string(),
            transaction_type: TransactionType::Expense,
            date: Utc.with_ymd_and_hms(2024, 3, 15, 1, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_summary_line_format() {
        assert_eq!(
            summarize_transaction(&lunch(), &Utc),
            "2024-03-15: Food - 42.50 (EXPENSE)"
        );

        // 01:30 UTC is the previous evening in UTC-3
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(
            summarize_transaction(&lunch(), &brt),
            "2024-03-14: Food - 42.50 (EXPENSE)"
        );
    }

    #[test]
    fn test_prompt_embeds_transactions_and_schema() {
        let prompt = build_insight_prompt(&[lunch()], 30, Locale::PtBr, &Utc);
        assert!(prompt.contains("last 30 days"));
        assert!(prompt.contains("Brazilian Portuguese"));
        assert!(prompt.contains("2024-03-15: Food - 42.50 (EXPENSE)"));
        assert!(prompt.contains(r#""savings_suggestion": number | null"#));
        assert!(!prompt.contains("{transactions}"));
    }

    #[test]
    fn test_prompt_without_transactions() {
        let prompt = build_insight_prompt(&[], 7, Locale::EnUs, &Utc);
        assert!(prompt.contains(NO_TRANSACTIONS));
        assert!(prompt.contains("USD"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```JSON{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n```"), "");
    }
}
