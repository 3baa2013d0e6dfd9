use serde::{Deserialize, Serialize};

use crate::schema::TransactionType;

const MONTHS_PT_BR: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

const MONTHS_EN_US: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Display language used for labels, messages and number formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    /// Accepts BCP-47 style tags (`pt-BR`, `en_US`, `pt`, ...), case-insensitive.
    pub fn parse(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "pt" | "pt-br" => Some(Locale::PtBr),
            "en" | "en-us" => Some(Locale::EnUs),
            _ => None,
        }
    }

    /// `month` is 1-based, as returned by `chrono::Datelike::month`.
    pub fn short_month_name(&self, month: u32) -> &'static str {
        let idx = (month.clamp(1, 12) - 1) as usize;
        match self {
            Locale::PtBr => MONTHS_PT_BR[idx],
            Locale::EnUs => MONTHS_EN_US[idx],
        }
    }

    pub fn decimal_separator(&self) -> char {
        match self {
            Locale::PtBr => ',',
            Locale::EnUs => '.',
        }
    }

    pub fn currency_prefix(&self) -> &'static str {
        match self {
            Locale::PtBr => "R$ ",
            Locale::EnUs => "$",
        }
    }

    pub fn transaction_type_label(&self, transaction_type: TransactionType) -> &'static str {
        match (self, transaction_type) {
            (Locale::PtBr, TransactionType::Income) => "Receita",
            (Locale::PtBr, TransactionType::Expense) => "Despesa",
            (Locale::EnUs, TransactionType::Income) => "Income",
            (Locale::EnUs, TransactionType::Expense) => "Expense",
        }
    }

    pub fn csv_header(&self) -> &'static str {
        match self {
            Locale::PtBr => "Data,Valor,Tipo,Descrição",
            Locale::EnUs => "Date,Amount,Type,Description",
        }
    }

    /// chrono pattern for timestamps shown to the user.
    pub fn date_time_pattern(&self) -> &'static str {
        match self {
            Locale::PtBr => "%d/%m/%Y %H:%M",
            Locale::EnUs => "%m/%d/%Y %H:%M",
        }
    }
}

/// Two decimals with the locale's decimal separator and no grouping.
pub fn format_decimal(value: f64, locale: Locale) -> String {
    let plain = format!("{:.2}", value);
    match locale.decimal_separator() {
        '.' => plain,
        sep => plain.replace('.', &sep.to_string()),
    }
}

pub fn format_money(value: f64, locale: Locale) -> String {
    format!("{}{}", locale.currency_prefix(), format_decimal(value, locale))
}

pub fn month_label(year: i32, month: u32, locale: Locale) -> String {
    format!("{}\n{}", locale.short_month_name(month), year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal_uses_locale_separator() {
        assert_eq!(format_decimal(1234.5, Locale::PtBr), "1234,50");
        assert_eq!(format_decimal(1234.5, Locale::EnUs), "1234.50");
        assert_eq!(format_decimal(2.499, Locale::EnUs), "2.50");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(150.0, Locale::PtBr), "R$ 150,00");
        assert_eq!(format_money(19.9, Locale::EnUs), "$19.90");
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(2024, 3, Locale::PtBr), "Mar\n2024");
        assert_eq!(month_label(2023, 12, Locale::PtBr), "Dez\n2023");
        assert_eq!(month_label(2023, 2, Locale::EnUs), "Feb\n2023");
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!(Locale::parse("pt_BR"), Some(Locale::PtBr));
        assert_eq!(Locale::parse("EN-us"), Some(Locale::EnUs));
        assert_eq!(Locale::parse("fr-FR"), None);
    }
}
