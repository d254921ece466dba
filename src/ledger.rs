use crate::error::{AccountingError, Result};
use crate::schema::{Category, CategoryFilter, Transaction, TransactionAnalysis};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

/// Replacement values for an existing transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub category: Category,
    pub description: String,
    pub amount: f64,
    pub party_name: Option<String>,
    /// Leaves the stored timestamp alone when `None`.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub sales: f64,
    pub purchase: f64,
    pub expense: f64,
    pub income: f64,
}

impl CategoryTotals {
    pub fn add(&mut self, category: Category, amount: f64) {
        match category {
            Category::Sales => self.sales += amount,
            Category::Purchase => self.purchase += amount,
            Category::Expense => self.expense += amount,
            Category::Income => self.income += amount,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Sales => self.sales,
            Category::Purchase => self.purchase,
            Category::Expense => self.expense,
            Category::Income => self.income,
        }
    }
}

/// Stored transactions for every user. Every operation is scoped to a
/// single `user_id`; records owned by other users are invisible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a ledger previously written by [`Ledger::save_to_path`]. A
    /// missing file yields an empty ledger.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {}, starting empty", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Persists a classifier result verbatim, stamped with a fresh id and
    /// either `custom_date` or the current time.
    pub fn record(
        &mut self,
        user_id: &str,
        original_prompt: &str,
        analysis: TransactionAnalysis,
        custom_date: Option<DateTime<Utc>>,
    ) -> Transaction {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            category: analysis.category,
            description: analysis.description,
            amount: analysis.amount,
            original_prompt: original_prompt.to_string(),
            party_name: analysis.party_name,
            created_at: custom_date.unwrap_or_else(Utc::now),
        };
        info!(
            "Recorded {} transaction {} for user {}",
            transaction.category, transaction.id, user_id
        );
        self.transactions.push(transaction.clone());
        transaction
    }

    /// The user's transactions, newest first.
    pub fn list(&self, user_id: &str, filter: CategoryFilter) -> Vec<Transaction> {
        let mut found: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && filter.matches(t.category))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    pub fn get(&self, user_id: &str, id: Uuid) -> Result<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .ok_or_else(|| not_found(id))
    }

    pub fn update(&mut self, user_id: &str, id: Uuid, update: TransactionUpdate) -> Result<Transaction> {
        let transaction = self
            .transactions
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .ok_or_else(|| not_found(id))?;

        transaction.category = update.category;
        transaction.description = update.description;
        transaction.amount = update.amount;
        transaction.party_name = update.party_name.filter(|p| !p.is_empty());
        if let Some(created_at) = update.created_at {
            transaction.created_at = created_at;
        }

        Ok(transaction.clone())
    }

    pub fn delete(&mut self, user_id: &str, id: Uuid) -> Result<()> {
        let before = self.transactions.len();
        self.transactions
            .retain(|t| !(t.id == id && t.user_id == user_id));
        if self.transactions.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Removes every record owned by the user; returns how many went.
    pub fn delete_user(&mut self, user_id: &str) -> usize {
        let before = self.transactions.len();
        self.transactions.retain(|t| t.user_id != user_id);
        before - self.transactions.len()
    }

    pub fn summary(&self, user_id: &str) -> CategoryTotals {
        self.transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .fold(CategoryTotals::default(), |mut totals, t| {
                totals.add(t.category, t.amount);
                totals
            })
    }
}

fn not_found(id: Uuid) -> AccountingError {
    AccountingError::NotFound {
        entity: "Transaction",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn analysis(category: Category, amount: f64) -> TransactionAnalysis {
        TransactionAnalysis {
            category,
            description: format!("{} entry", category),
            amount,
            party_name: None,
        }
    }

    fn at(day: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_record_keeps_analysis_verbatim() {
        let mut ledger = Ledger::new();
        let input = TransactionAnalysis {
            category: Category::Sales,
            description: "Sold 10 laptops to ABC Corp".to_string(),
            amount: 500000.0,
            party_name: Some("ABC Corp".to_string()),
        };
        let stored = ledger.record("u1", "Sold 10 laptops", input.clone(), at(3));
        assert_eq!(stored.analysis(), input);
        assert_eq!(stored.original_prompt, "Sold 10 laptops");
        assert_eq!(stored.created_at, at(3).unwrap());
    }

    #[test]
    fn test_list_is_scoped_filtered_and_newest_first() {
        let mut ledger = Ledger::new();
        ledger.record("u1", "a", analysis(Category::Expense, 10.0), at(1));
        ledger.record("u1", "b", analysis(Category::Sales, 20.0), at(5));
        ledger.record("u1", "c", analysis(Category::Expense, 30.0), at(9));
        ledger.record("u2", "d", analysis(Category::Expense, 40.0), at(7));

        let all = ledger.list("u1", CategoryFilter::All);
        let amounts: Vec<f64> = all.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![30.0, 20.0, 10.0]);

        let expenses = ledger.list("u1", CategoryFilter::Only(Category::Expense));
        assert_eq!(expenses.len(), 2);
        assert!(expenses.iter().all(|t| t.category == Category::Expense));
    }

    #[test]
    fn test_other_users_records_are_not_reachable() {
        let mut ledger = Ledger::new();
        let tx = ledger.record("owner", "p", analysis(Category::Income, 5.0), at(2));

        assert!(ledger.get("intruder", tx.id).is_err());
        assert!(ledger.delete("intruder", tx.id).is_err());
        assert!(ledger.get("owner", tx.id).is_ok());
    }

    #[test]
    fn test_update_clears_empty_party_and_keeps_date() {
        let mut ledger = Ledger::new();
        let tx = ledger.record("u1", "p", analysis(Category::Expense, 5.0), at(2));

        let updated = ledger
            .update(
                "u1",
                tx.id,
                TransactionUpdate {
                    category: Category::Purchase,
                    description: "Stock".to_string(),
                    amount: 75.0,
                    party_name: Some(String::new()),
                    created_at: None,
                },
            )
            .unwrap();

        assert_eq!(updated.category, Category::Purchase);
        assert_eq!(updated.amount, 75.0);
        assert_eq!(updated.party_name, None);
        assert_eq!(updated.created_at, tx.created_at);
    }

    #[test]
    fn test_summary_and_delete_user() {
        let mut ledger = Ledger::new();
        ledger.record("u1", "a", analysis(Category::Sales, 100.0), at(1));
        ledger.record("u1", "b", analysis(Category::Sales, 50.0), at(2));
        ledger.record("u1", "c", analysis(Category::Expense, 30.0), at(3));
        ledger.record("u2", "d", analysis(Category::Income, 99.0), at(3));

        let totals = ledger.summary("u1");
        assert_eq!(totals.sales, 150.0);
        assert_eq!(totals.expense, 30.0);
        assert_eq!(totals.income, 0.0);

        assert_eq!(ledger.delete_user("u1"), 3);
        assert_eq!(ledger.summary("u1"), CategoryTotals::default());
        assert_eq!(ledger.summary("u2").income, 99.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut ledger = Ledger::new();
        let tx = ledger.record("u1", "p", analysis(Category::Income, 12.5), at(4));
        ledger.save_to_path(&path).unwrap();

        let loaded = Ledger::load_from_path(&path).unwrap();
        assert_eq!(loaded.get("u1", tx.id).unwrap(), &tx);

        let missing = Ledger::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert!(missing.list("u1", CategoryFilter::All).is_empty());
    }
}
