use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{InsightsError, Result};
use crate::format::Locale;

pub const DEFAULT_PERIOD_DAYS: u32 = 30;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub locale: Locale,
    /// Lookback window quoted to the insight generator
    pub period_days: u32,
    pub gemini_model: String,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            period_days: DEFAULT_PERIOD_DAYS,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl InsightsConfig {
    /// Defaults overridden by `INSIGHTS_LOCALE`, `INSIGHTS_PERIOD_DAYS` and `GEMINI_MODEL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(tag) = lookup("INSIGHTS_LOCALE") {
            config.locale = Locale::parse(&tag).ok_or_else(|| {
                InsightsError::Config(format!("unsupported INSIGHTS_LOCALE '{}'", tag))
            })?;
        }

        if let Some(raw) = lookup("INSIGHTS_PERIOD_DAYS") {
            config.period_days = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or_else(|| {
                    InsightsError::Config(format!(
                        "INSIGHTS_PERIOD_DAYS must be a positive integer, got '{}'",
                        raw
                    ))
                })?;
        }

        if let Some(model) = lookup("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.gemini_model = model.trim().to_string();
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = InsightsConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, InsightsConfig::default());
        assert_eq!(config.period_days, 30);
        assert_eq!(config.locale, Locale::PtBr);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = InsightsConfig::from_lookup(lookup_from(&[
            ("INSIGHTS_LOCALE", "en-US"),
            ("INSIGHTS_PERIOD_DAYS", "90"),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
        ]))
        .unwrap();
        assert_eq!(config.locale, Locale::EnUs);
        assert_eq!(config.period_days, 90);
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let bad_days = InsightsConfig::from_lookup(lookup_from(&[("INSIGHTS_PERIOD_DAYS", "0")]));
        assert!(matches!(bad_days, Err(InsightsError::Config(_))));

        let bad_locale = InsightsConfig::from_lookup(lookup_from(&[("INSIGHTS_LOCALE", "xx")]));
        assert!(matches!(bad_locale, Err(InsightsError::Config(_))));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: InsightsConfig = serde_json::from_str(r#"{"locale":"en-US"}"#).unwrap();
        assert_eq!(config.locale, Locale::EnUs);
        assert_eq!(config.period_days, DEFAULT_PERIOD_DAYS);
    }
}
