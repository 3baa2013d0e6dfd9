use chrono::{Duration, Utc};
use dotenv::dotenv;
use spending_insights::*;
use std::error::Error;
use std::sync::Arc;

fn sample_transactions() -> Vec<NewTransaction> {
    let now = Utc::now();
    let entry = |kind, amount, category: &str, description: &str, days_ago| NewTransaction {
        amount,
        category: category.to_string(),
        description: description.to_string(),
        transaction_type: kind,
        date: now - Duration::days(days_ago),
    };

    vec![
        entry(TransactionType::Income, 6500.0, "Salary", "Monthly salary", 2),
        entry(TransactionType::Expense, 1800.0, "Rent", "Apartment", 3),
        entry(TransactionType::Expense, 640.0, "Food", "Groceries", 5),
        entry(TransactionType::Expense, 320.0, "Food", "Delivery apps", 1),
        entry(TransactionType::Expense, 210.0, "Transport", "Ride sharing", 8),
        entry(TransactionType::Expense, 150.0, "Leisure", "Streaming and cinema", 12),
        entry(TransactionType::Income, 6500.0, "Salary", "Monthly salary", 33),
        entry(TransactionType::Expense, 1800.0, "Rent", "Apartment", 34),
        entry(TransactionType::Expense, 890.0, "Food", "Groceries", 40),
    ]
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    dotenv().ok();

    let config = InsightsConfig::from_env()?;
    let client = GeminiClient::from_env(&config)?;

    println!("📊 Spending insights demo (model: {})\n", client.model());

    let service = FinanceService::new(
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(InMemoryPreferences::default()),
        SystemClock,
        config.clone(),
    )
    .with_generator(Arc::new(client));

    for transaction in sample_transactions() {
        service.add_transaction("demo-user", transaction).await?;
    }

    let dashboard = service.dashboard("demo-user").await?;

    println!(
        "Balance: {}  (income {}, expenses {})",
        format_money(dashboard.total_balance, config.locale),
        format_money(dashboard.monthly_income, config.locale),
        format_money(dashboard.monthly_expense, config.locale)
    );

    println!("\nBy category:");
    for spending in &dashboard.category_spendings {
        println!(
            "  {:<12} {:>12}  {:>5.1}%",
            spending.category,
            format_money(spending.total, config.locale),
            spending.percentage
        );
    }

    println!("\nLast {} months:", TREND_MONTHS);
    for point in &dashboard.monthly_chart_data {
        println!(
            "  {:<10} +{:>10.2}  -{:>10.2}",
            point.month.replace('\n', " "),
            point.income,
            point.expense
        );
    }

    println!("\n💡 Insights:");
    for insight in &dashboard.ai_insights {
        println!("  [{:?}] {}", insight.insight_type, insight.message);
    }

    println!("\n📄 CSV export:\n{}", service.export_csv("demo-user").await?);

    Ok(())
}
