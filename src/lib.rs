//! # Account AI
//!
//! Small-business bookkeeping driven by plain-language input. A sentence such
//! as "Paid ₹5000 for office rent" is classified by a Gemini model into a
//! structured [`TransactionAnalysis`], which can then be stored, reported on
//! and invoiced.
//!
//! ## Core Concepts
//!
//! - **Classification**: one text in, one analysis out. Model candidates are
//!   tried in a fixed preference order and the first usable answer wins.
//! - **Untrusted output**: the model's reply is parsed, validated and coerced
//!   before it becomes financial data (unknown categories become `expense`,
//!   unusable amounts become `0`).
//! - **Per-user books**: ledger, invoices and settings are always scoped to a
//!   single user id.
//!
//! ## Example
//!
//! ```rust,ignore
//! use account_ai::*;
//!
//! let classifier = TransactionClassifier::from_env()?;
//! let analysis = classifier.classify("Sold 10 laptops to ABC Corp for 5 lakh").await?;
//!
//! let mut books = Bookkeeper::new();
//! books.ledger.record("user-1", "Sold 10 laptops", analysis, None);
//! ```

pub mod error;
pub mod invoices;
pub mod ledger;
pub mod payments;
pub mod reports;
pub mod schema;
pub mod settings;
pub mod utils;

#[cfg(feature = "gemini")]
pub mod llm;

pub use error::{AccountingError, Result};
pub use invoices::*;
pub use ledger::{CategoryTotals, Ledger, TransactionUpdate};
pub use payments::*;
pub use reports::*;
pub use schema::*;
pub use settings::*;

#[cfg(feature = "gemini")]
pub use llm::{ClassifierConfig, GeminiClient, ModelBackend, ModelCandidate, TransactionClassifier};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// The books of every user: transactions, invoices and settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bookkeeper {
    pub ledger: Ledger,
    pub invoices: InvoiceBook,
    pub settings: SettingsStore,
}

impl Bookkeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `prompt` and stores the result for `user_id`.
    ///
    /// Nothing is stored when classification fails.
    #[cfg(feature = "gemini")]
    pub async fn record_from_prompt<B: ModelBackend>(
        &mut self,
        classifier: &TransactionClassifier<B>,
        user_id: &str,
        prompt: &str,
        custom_date: Option<DateTime<Utc>>,
    ) -> Result<Transaction> {
        let analysis = classifier.classify(prompt).await?;
        Ok(self.ledger.record(user_id, prompt, analysis, custom_date))
    }

    /// Report over the user's transactions for `period`.
    pub fn report(&self, user_id: &str, period: ReportPeriod) -> ReportData {
        let transactions = self.ledger.list(user_id, CategoryFilter::All);
        generate_report(&transactions, period)
    }

    /// Verifies a checkout callback and, when the signature holds, upgrades
    /// the user to premium.
    #[allow(clippy::too_many_arguments)]
    pub fn confirm_premium(
        &mut self,
        key_secret: &str,
        user_id: &str,
        plan: Plan,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<&UserSettings> {
        if let Err(e) = verify_payment_signature(key_secret, order_id, payment_id, signature) {
            warn!("Rejected payment {} for user {}: {}", payment_id, user_id, e);
            return Err(e);
        }
        Ok(self.settings.activate_premium(user_id, plan, payment_id, now))
    }

    /// Removes every record held for the user.
    pub fn delete_account(&mut self, user_id: &str) {
        let transactions = self.ledger.delete_user(user_id);
        let invoices = self.invoices.delete_user(user_id);
        self.settings.delete_user(user_id);
        info!(
            "Deleted account data for {}: {} transactions, {} invoices",
            user_id, transactions, invoices
        );
    }
}
