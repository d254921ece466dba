use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AccountingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[schemars(description = "Selling goods or services to customers")]
    Sales,

    #[schemars(description = "Buying inventory, raw materials, or goods for resale")]
    Purchase,

    #[schemars(
        description = "Business expenses like rent, utilities, office supplies, salaries"
    )]
    Expense,

    #[schemars(
        description = "Money received (interest, dividends, rent received, consulting fees, payments)"
    )]
    Income,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Sales,
        Category::Purchase,
        Category::Expense,
        Category::Income,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sales => "sales",
            Category::Purchase => "purchase",
            Category::Expense => "expense",
            Category::Income => "income",
        }
    }

    /// Maps a label produced by the model onto the closed category set.
    ///
    /// Only the four exact lowercase literals are recognized. Anything else,
    /// including `"Sales"` or `"refund"`, falls back to [`Category::Expense`].
    pub fn from_model_label(label: &str) -> Category {
        label.parse().unwrap_or(Category::Expense)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AccountingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AccountingError::ValidationError(format!("unknown category '{}'", s)))
    }
}

/// Structured reading of one natural-language transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionAnalysis {
    pub category: Category,

    #[schemars(description = "A brief, clear description of the transaction (max 100 characters)")]
    pub description: String,

    #[schemars(description = "Amount in the user's base currency, without a currency symbol")]
    pub amount: f64,

    #[schemars(description = "Customer, vendor or other party involved, if mentioned")]
    pub party_name: Option<String>,
}

impl TransactionAnalysis {
    /// Builds an analysis from a parsed model reply, coercing every field
    /// rather than trusting its shape.
    ///
    /// Returns `None` only when the reply is not a JSON object at all.
    pub fn from_model_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let category = object
            .get("category")
            .and_then(Value::as_str)
            .map(Category::from_model_label)
            .unwrap_or(Category::Expense);

        let description = match object.get("description") {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        let party_name = match object.get("party_name") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Some(Self {
            category,
            description,
            amount: coerce_amount(object.get("amount")),
            party_name,
        })
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TransactionAnalysis)
    }
}

/// Numeric coercion for the `amount` field: numbers pass through, numeric
/// strings are parsed, everything else (and non-finite results) becomes zero.
pub fn coerce_amount(raw: Option<&Value>) -> f64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// A classified transaction once it has been stored for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub category: Category,
    pub description: String,
    pub amount: f64,
    pub original_prompt: String,
    pub party_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn analysis(&self) -> TransactionAnalysis {
        TransactionAnalysis {
            category: self.category,
            description: self.description.clone(),
            amount: self.amount,
            party_name: self.party_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = AccountingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "all" {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(s.parse()?))
        }
    }
}
