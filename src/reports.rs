//! Profit & loss style summaries over a user's stored transactions.

use crate::error::{AccountingError, Result};
use crate::ledger::CategoryTotals;
use crate::schema::{Category, Transaction};
use crate::utils::{first_day_of_month, last_day_of_month, month_key};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

const EXPENSE_GROUP_KEY_CHARS: usize = 30;
const EXPENSE_GROUP_LIMIT: usize = 10;
const TOP_TRANSACTION_LIMIT: usize = 5;

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(AccountingError::ValidationError(format!(
                "report period ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// The calendar month containing `today`.
    pub fn current_month(today: NaiveDate) -> Self {
        Self {
            start: first_day_of_month(today),
            end: last_day_of_month(today),
        }
    }

    /// Either bound left out falls back to the current month's.
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Result<Self> {
        let default = Self::current_month(today);
        Self::new(start.unwrap_or(default.start), end.unwrap_or(default.end))
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseGroup {
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub month: String,
    pub sales: f64,
    pub income: f64,
    pub purchases: f64,
    pub expenses: f64,
    pub net_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTransaction {
    pub id: Uuid,
    pub description: String,
    pub amount: f64,
    pub category: Category,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub period: ReportPeriod,

    pub total_sales: f64,
    pub total_income: f64,
    /// sales + income
    pub total_revenue: f64,

    pub total_purchases: f64,
    pub total_expenses: f64,
    /// purchases + expenses
    pub total_costs: f64,

    /// sales - purchases
    pub gross_profit: f64,
    /// revenue - costs
    pub net_profit: f64,

    pub category_breakdown: Vec<CategoryBreakdown>,
    pub expenses_by_description: Vec<ExpenseGroup>,
    pub monthly: Vec<MonthlyTrend>,
    pub top_transactions: Vec<TopTransaction>,
}

/// Aggregates the transactions that fall inside `period`.
///
/// `transactions` is expected to already be scoped to one user.
pub fn generate_report(transactions: &[Transaction], period: ReportPeriod) -> ReportData {
    let in_period: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| period.contains(&t.created_at))
        .collect();

    debug!(
        "Building report for {}..{} over {} of {} transactions",
        period.start,
        period.end,
        in_period.len(),
        transactions.len()
    );

    let mut totals = CategoryTotals::default();
    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for t in &in_period {
        totals.add(t.category, t.amount);
        *counts.entry(t.category).or_default() += 1;
    }

    let total_revenue = totals.sales + totals.income;
    let total_costs = totals.purchase + totals.expense;

    let category_breakdown = [
        ("Sales", Category::Sales),
        ("Income", Category::Income),
        ("Purchases", Category::Purchase),
        ("Expenses", Category::Expense),
    ]
    .into_iter()
    .map(|(label, category)| CategoryBreakdown {
        category: label.to_string(),
        amount: totals.get(category),
        count: counts.get(&category).copied().unwrap_or(0),
    })
    .collect();

    ReportData {
        period,
        total_sales: totals.sales,
        total_income: totals.income,
        total_revenue,
        total_purchases: totals.purchase,
        total_expenses: totals.expense,
        total_costs,
        gross_profit: totals.sales - totals.purchase,
        net_profit: total_revenue - total_costs,
        category_breakdown,
        expenses_by_description: group_expenses(&in_period),
        monthly: monthly_trends(&in_period),
        top_transactions: top_transactions(&in_period),
    }
}

fn group_expenses(transactions: &[&Transaction]) -> Vec<ExpenseGroup> {
    // Insertion order is kept so equal amounts stay in first-seen order.
    let mut groups: Vec<ExpenseGroup> = Vec::new();
    for t in transactions.iter().filter(|t| t.category == Category::Expense) {
        let key: String = t.description.chars().take(EXPENSE_GROUP_KEY_CHARS).collect();
        match groups.iter_mut().find(|g| g.description == key) {
            Some(group) => group.amount += t.amount,
            None => groups.push(ExpenseGroup {
                description: key,
                amount: t.amount,
            }),
        }
    }
    groups.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    groups.truncate(EXPENSE_GROUP_LIMIT);
    groups
}

fn monthly_trends(transactions: &[&Transaction]) -> Vec<MonthlyTrend> {
    let mut months: BTreeMap<String, CategoryTotals> = BTreeMap::new();
    for t in transactions {
        months
            .entry(month_key(&t.created_at))
            .or_default()
            .add(t.category, t.amount);
    }

    months
        .into_iter()
        .map(|(month, totals)| MonthlyTrend {
            month,
            sales: totals.sales,
            income: totals.income,
            purchases: totals.purchase,
            expenses: totals.expense,
            net_profit: (totals.sales + totals.income) - (totals.purchase + totals.expense),
        })
        .collect()
}

fn top_transactions(transactions: &[&Transaction]) -> Vec<TopTransaction> {
    let mut sorted: Vec<&Transaction> = transactions.to_vec();
    sorted.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    sorted
        .into_iter()
        .take(TOP_TRANSACTION_LIMIT)
        .map(|t| TopTransaction {
            id: t.id,
            description: t.description.clone(),
            amount: t.amount,
            category: t.category,
            date: t.created_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tx(category: Category, description: &str, amount: f64, y: i32, m: u32, d: u32) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            category,
            description: description.to_string(),
            amount,
            original_prompt: description.to_string(),
            party_name: None,
            created_at: Utc.with_ymd_and_hms(y, m, d, 23, 30, 0).unwrap(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_totals_and_profit_lines() {
        let txns = vec![
            tx(Category::Sales, "Laptops", 1000.0, 2024, 4, 2),
            tx(Category::Income, "Interest", 50.0, 2024, 4, 3),
            tx(Category::Purchase, "Stock", 400.0, 2024, 4, 4),
            tx(Category::Expense, "Rent", 300.0, 2024, 4, 5),
        ];
        let report = generate_report(&txns, ReportPeriod::new(date(2024, 4, 1), date(2024, 4, 30)).unwrap());

        assert_eq!(report.total_revenue, 1050.0);
        assert_eq!(report.total_costs, 700.0);
        assert_eq!(report.gross_profit, 600.0);
        assert_eq!(report.net_profit, 350.0);

        let labels: Vec<&str> = report.category_breakdown.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(labels, vec!["Sales", "Income", "Purchases", "Expenses"]);
        assert!(report.category_breakdown.iter().all(|c| c.count == 1));
    }

    #[test]
    fn test_period_is_inclusive_of_end_day() {
        let txns = vec![
            tx(Category::Sales, "In", 10.0, 2024, 4, 30),
            tx(Category::Sales, "Out", 99.0, 2024, 5, 1),
            tx(Category::Sales, "Before", 99.0, 2024, 3, 31),
        ];
        let report = generate_report(&txns, ReportPeriod::new(date(2024, 4, 1), date(2024, 4, 30)).unwrap());
        assert_eq!(report.total_sales, 10.0);
    }

    #[test]
    fn test_expense_groups_use_description_prefix() {
        let long = "Electricity bill for the main office building";
        let txns = vec![
            tx(Category::Expense, long, 100.0, 2024, 4, 2),
            tx(Category::Expense, "Electricity bill for the main office annex", 50.0, 2024, 4, 3),
            tx(Category::Expense, "Tea", 500.0, 2024, 4, 4),
        ];
        let report = generate_report(&txns, ReportPeriod::new(date(2024, 4, 1), date(2024, 4, 30)).unwrap());

        assert_eq!(report.expenses_by_description.len(), 2);
        assert_eq!(report.expenses_by_description[0].description, "Tea");
        assert_eq!(report.expenses_by_description[1].description, "Electricity bill for the main ");
        assert_eq!(report.expenses_by_description[1].amount, 150.0);
    }

    #[test]
    fn test_monthly_trends_are_ascending() {
        let txns = vec![
            tx(Category::Sales, "May sale", 200.0, 2024, 5, 10),
            tx(Category::Expense, "March rent", 80.0, 2024, 3, 1),
            tx(Category::Sales, "March sale", 100.0, 2024, 3, 20),
        ];
        let report = generate_report(&txns, ReportPeriod::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap());

        let months: Vec<&str> = report.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-03", "2024-05"]);
        assert_eq!(report.monthly[0].net_profit, 20.0);
    }

    #[test]
    fn test_top_transactions_limited_to_five() {
        let txns: Vec<Transaction> = (1..=7)
            .map(|i| tx(Category::Sales, &format!("Sale {}", i), i as f64 * 10.0, 2024, 4, i))
            .collect();
        let report = generate_report(&txns, ReportPeriod::new(date(2024, 4, 1), date(2024, 4, 30)).unwrap());

        let amounts: Vec<f64> = report.top_transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![70.0, 60.0, 50.0, 40.0, 30.0]);
    }

    #[test]
    fn test_period_defaults_to_current_month() {
        let today = date(2024, 2, 10);
        let period = ReportPeriod::resolve(None, None, today).unwrap();
        assert_eq!(period.start, date(2024, 2, 1));
        assert_eq!(period.end, date(2024, 2, 29));

        assert!(ReportPeriod::resolve(Some(date(2024, 3, 1)), Some(date(2024, 2, 1)), today).is_err());
    }
}
