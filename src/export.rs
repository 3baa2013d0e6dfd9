use std::fmt;

use chrono::TimeZone;
use log::debug;

use crate::error::{InsightsError, Result};
use crate::format::Locale;
use crate::schema::Transaction;

/// Renders `transactions` as CSV text: a localized header, then one line per row.
///
/// Dates are shown in `tz` using the locale's pattern, amounts always use a
/// `.` separator with two decimals, and descriptions are always quoted.
/// An empty input is [`InsightsError::NothingToExport`] rather than a header-only file.
pub fn export_csv<Tz: TimeZone>(
    transactions: &[Transaction],
    locale: Locale,
    tz: &Tz,
) -> Result<String>
where
    Tz::Offset: fmt::Display,
{
    if transactions.is_empty() {
        return Err(InsightsError::NothingToExport);
    }

    let mut out = String::with_capacity(64 * (transactions.len() + 1));
    out.push_str(locale.csv_header());
    out.push('\n');

    for transaction in transactions {
        out.push_str(&csv_line(transaction, locale, tz));
        out.push('\n');
    }

    debug!("Exported {} transactions", transactions.len());
    Ok(out)
}

fn csv_line<Tz: TimeZone>(transaction: &Transaction, locale: Locale, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    format!(
        "{},{:.2},{},{}",
        transaction
            .date
            .with_timezone(tz)
            .format(locale.date_time_pattern()),
        transaction.amount,
        locale.transaction_type_label(transaction.transaction_type),
        quote(&transaction.description)
    )
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
