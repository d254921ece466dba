use crate::error::{AccountingError, Result};
use crate::payments::{subscription_end, Plan};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_DATE_FORMAT: &str = "DD/MM/YYYY";
pub const DEFAULT_FISCAL_YEAR_START: &str = "April";
const FALLBACK_SYMBOL: &str = "₹";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
}

pub const CURRENCIES: &[CurrencyInfo] = &[
    CurrencyInfo { code: "INR", symbol: "₹", name: "Indian Rupee" },
    CurrencyInfo { code: "USD", symbol: "$", name: "US Dollar" },
    CurrencyInfo { code: "EUR", symbol: "€", name: "Euro" },
    CurrencyInfo { code: "GBP", symbol: "£", name: "British Pound" },
    CurrencyInfo { code: "JPY", symbol: "¥", name: "Japanese Yen" },
    CurrencyInfo { code: "AUD", symbol: "A$", name: "Australian Dollar" },
    CurrencyInfo { code: "CAD", symbol: "C$", name: "Canadian Dollar" },
    CurrencyInfo { code: "CHF", symbol: "CHF", name: "Swiss Franc" },
    CurrencyInfo { code: "CNY", symbol: "¥", name: "Chinese Yuan" },
    CurrencyInfo { code: "AED", symbol: "د.إ", name: "UAE Dirham" },
    CurrencyInfo { code: "SGD", symbol: "S$", name: "Singapore Dollar" },
];

pub const DATE_FORMATS: &[&str] = &["DD/MM/YYYY", "MM/DD/YYYY", "YYYY-MM-DD"];

/// `April` is the Indian financial year, `January` the calendar year.
pub const FISCAL_YEAR_STARTS: &[&str] = &["April", "January"];

pub fn currency_symbol(code: &str) -> &'static str {
    CURRENCIES
        .iter()
        .find(|c| c.code == code)
        .map(|c| c.symbol)
        .unwrap_or(FALLBACK_SYMBOL)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    pub currency: String,
    pub date_format: String,
    pub fiscal_year_start: String,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_end: Option<DateTime<Utc>>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    pub fn defaults_for(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            fiscal_year_start: DEFAULT_FISCAL_YEAR_START.to_string(),
            subscription_plan: SubscriptionPlan::Free,
            subscription_end: None,
            razorpay_payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn currency_symbol(&self) -> &'static str {
        currency_symbol(&self.currency)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsStore {
    by_user: HashMap<String, UserSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing settings, or freshly stored defaults on first access.
    pub fn get_or_create(&mut self, user_id: &str, now: DateTime<Utc>) -> &UserSettings {
        self.by_user.entry(user_id.to_string()).or_insert_with(|| {
            debug!("Creating default settings for user {}", user_id);
            UserSettings::defaults_for(user_id, now)
        })
    }

    /// Sets the currency and, when given, the date format and fiscal year
    /// start. Settings are created first if the user has none.
    pub fn update(
        &mut self,
        user_id: &str,
        currency: &str,
        date_format: Option<&str>,
        fiscal_year_start: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&UserSettings> {
        if !CURRENCIES.iter().any(|c| c.code == currency) {
            return Err(AccountingError::ValidationError(format!(
                "unsupported currency '{}'",
                currency
            )));
        }
        if let Some(format) = date_format {
            if !DATE_FORMATS.contains(&format) {
                return Err(AccountingError::ValidationError(format!(
                    "unsupported date format '{}'",
                    format
                )));
            }
        }
        if let Some(start) = fiscal_year_start {
            if !FISCAL_YEAR_STARTS.contains(&start) {
                return Err(AccountingError::ValidationError(format!(
                    "unsupported fiscal year start '{}'",
                    start
                )));
            }
        }

        let settings = self
            .by_user
            .entry(user_id.to_string())
            .or_insert_with(|| UserSettings::defaults_for(user_id, now));
        settings.currency = currency.to_string();
        if let Some(format) = date_format {
            settings.date_format = format.to_string();
        }
        if let Some(start) = fiscal_year_start {
            settings.fiscal_year_start = start.to_string();
        }
        settings.updated_at = now;
        Ok(settings)
    }

    /// Marks the user premium until `now` plus the plan's duration.
    pub fn activate_premium(
        &mut self,
        user_id: &str,
        plan: Plan,
        payment_id: &str,
        now: DateTime<Utc>,
    ) -> &UserSettings {
        let settings = self
            .by_user
            .entry(user_id.to_string())
            .or_insert_with(|| UserSettings::defaults_for(user_id, now));
        settings.subscription_plan = SubscriptionPlan::Premium;
        settings.subscription_end = Some(subscription_end(plan, now));
        settings.razorpay_payment_id = Some(payment_id.to_string());
        settings.updated_at = now;
        info!("Activated {} premium for user {}", plan, user_id);
        settings
    }

    pub fn delete_user(&mut self, user_id: &str) -> bool {
        self.by_user.remove(user_id).is_some()
    }
}
