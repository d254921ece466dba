use crate::error::{AccountingError, Result};
use crate::schema::{Category, Transaction};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const INVOICE_PREFIX: &str = "INV-";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for InvoiceStatus {
    type Err = AccountingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(AccountingError::ValidationError(format!(
                "unknown invoice status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Line total as entered; not recomputed from quantity and unit price.
    pub amount: f64,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            amount: quantity * unit_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    /// Percentage, e.g. `18.0` for 18%.
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
}

impl InvoiceTotals {
    pub fn from_items(items: &[InvoiceItem], tax_rate: Option<f64>) -> Self {
        let subtotal: f64 = items.iter().map(|i| i.amount).sum();
        let tax_rate = tax_rate.unwrap_or(0.0);
        let tax_amount = subtotal * (tax_rate / 100.0);
        Self {
            subtotal,
            tax_rate,
            tax_amount,
            total: subtotal + tax_amount,
        }
    }
}

/// Number following `latest` in the `INV-001` sequence; `INV-001` when
/// there is no usable predecessor.
pub fn next_invoice_number(latest: Option<&str>) -> String {
    let next = latest
        .and_then(sequence_number)
        .and_then(|n| n.checked_add(1))
        .unwrap_or(1);
    format!("{}{:03}", INVOICE_PREFIX, next)
}

/// Digits after the first `INV-` that is followed by at least one digit.
fn sequence_number(number: &str) -> Option<u64> {
    number.match_indices(INVOICE_PREFIX).find_map(|(start, _)| {
        let rest = &number[start + INVOICE_PREFIX.len()..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest[..end].parse::<u64>().ok()
    })
}

/// Everything needed to issue an invoice, before numbering and totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub transaction_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<f64>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItem>,
}

impl InvoiceDraft {
    /// Prefills a draft from a recorded sale: customer from the party name,
    /// one line item carrying the sale amount, dated on the sale day.
    pub fn from_sales_transaction(transaction: &Transaction) -> Result<Self> {
        if transaction.category != Category::Sales {
            return Err(AccountingError::NotFound {
                entity: "Sales transaction",
                id: transaction.id.to_string(),
            });
        }
        Ok(Self {
            transaction_id: Some(transaction.id),
            customer_name: transaction.party_name.clone().unwrap_or_default(),
            invoice_date: Some(transaction.created_at.date_naive()),
            items: vec![InvoiceItem::new(
                transaction.description.clone(),
                1.0,
                transaction.amount,
            )],
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_id: Option<Uuid>,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub totals: InvoiceTotals,
    pub notes: Option<String>,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user invoice register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceBook {
    invoices: Vec<Invoice>,
}

impl InvoiceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, user_id: &str, draft: InvoiceDraft, now: DateTime<Utc>) -> Result<Invoice> {
        if draft.customer_name.trim().is_empty() {
            return Err(AccountingError::ValidationError(
                "invoice needs a customer name".to_string(),
            ));
        }

        let latest = self
            .invoices
            .iter()
            .filter(|i| i.user_id == user_id)
            .max_by_key(|i| i.created_at)
            .map(|i| i.invoice_number.as_str());
        let invoice_number = next_invoice_number(latest);

        let invoice = Invoice {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            transaction_id: draft.transaction_id,
            invoice_number,
            customer_name: draft.customer_name,
            customer_email: draft.customer_email.filter(|s| !s.is_empty()),
            customer_phone: draft.customer_phone.filter(|s| !s.is_empty()),
            customer_address: draft.customer_address.filter(|s| !s.is_empty()),
            invoice_date: draft.invoice_date.unwrap_or_else(|| now.date_naive()),
            due_date: draft.due_date,
            totals: InvoiceTotals::from_items(&draft.items, draft.tax_rate),
            notes: draft.notes.filter(|s| !s.is_empty()),
            status: InvoiceStatus::Draft,
            items: draft.items,
            created_at: now,
            updated_at: now,
        };

        info!("Created invoice {} for user {}", invoice.invoice_number, user_id);
        self.invoices.push(invoice.clone());
        Ok(invoice)
    }

    /// Newest first, optionally restricted to one status.
    pub fn list(&self, user_id: &str, status: Option<InvoiceStatus>) -> Vec<Invoice> {
        let mut found: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|i| i.user_id == user_id && status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    pub fn get(&self, user_id: &str, id: Uuid) -> Result<&Invoice> {
        self.invoices
            .iter()
            .find(|i| i.id == id && i.user_id == user_id)
            .ok_or_else(|| not_found(id))
    }

    pub fn update_status(
        &mut self,
        user_id: &str,
        id: Uuid,
        status: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let invoice = self
            .invoices
            .iter_mut()
            .find(|i| i.id == id && i.user_id == user_id)
            .ok_or_else(|| not_found(id))?;
        invoice.status = status;
        invoice.updated_at = now;
        Ok(())
    }

    pub fn delete(&mut self, user_id: &str, id: Uuid) -> Result<()> {
        let before = self.invoices.len();
        self.invoices.retain(|i| !(i.id == id && i.user_id == user_id));
        if self.invoices.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    pub fn delete_user(&mut self, user_id: &str) -> usize {
        let before = self.invoices.len();
        self.invoices.retain(|i| i.user_id != user_id);
        before - self.invoices.len()
    }
}

fn not_found(id: Uuid) -> AccountingError {
    AccountingError::NotFound {
        entity: "Invoice",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn draft(customer: &str) -> InvoiceDraft {
        InvoiceDraft {
            customer_name: customer.to_string(),
            tax_rate: Some(18.0),
            items: vec![
                InvoiceItem::new("Consulting", 2.0, 1500.0),
                InvoiceItem::new("Travel", 1.0, 1000.0),
            ],
            ..InvoiceDraft::default()
        }
    }

    #[test]
    fn test_totals_apply_percentage_tax() {
        let totals = InvoiceTotals::from_items(&draft("x").items, Some(18.0));
        assert_eq!(totals.subtotal, 4000.0);
        assert!((totals.tax_amount - 720.0).abs() < 1e-9);
        assert!((totals.total - 4720.0).abs() < 1e-9);

        let untaxed = InvoiceTotals::from_items(&draft("x").items, None);
        assert_eq!(untaxed.tax_amount, 0.0);
        assert_eq!(untaxed.total, 4000.0);
    }

    #[test]
    fn test_invoice_numbering() {
        assert_eq!(next_invoice_number(None), "INV-001");
        assert_eq!(next_invoice_number(Some("INV-007")), "INV-008");
        assert_eq!(next_invoice_number(Some("INV-999")), "INV-1000");
        assert_eq!(next_invoice_number(Some("custom")), "INV-001");
        assert_eq!(next_invoice_number(Some("INV-draft/INV-041")), "INV-042");
        assert_eq!(next_invoice_number(Some("INV-18446744073709551615")), "INV-001");
    }

    #[test]
    fn test_numbers_are_sequenced_per_user() {
        let mut book = InvoiceBook::new();
        let first = book.create("u1", draft("A"), now()).unwrap();
        let second = book.create("u1", draft("B"), now() + Duration::minutes(1)).unwrap();
        let other = book.create("u2", draft("C"), now() + Duration::minutes(2)).unwrap();

        assert_eq!(first.invoice_number, "INV-001");
        assert_eq!(second.invoice_number, "INV-002");
        assert_eq!(other.invoice_number, "INV-001");
        assert_eq!(first.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_status_update_and_filtering() {
        let mut book = InvoiceBook::new();
        let a = book.create("u1", draft("A"), now()).unwrap();
        book.create("u1", draft("B"), now() + Duration::minutes(1)).unwrap();

        book.update_status("u1", a.id, InvoiceStatus::Paid, now() + Duration::hours(1))
            .unwrap();
        let paid = book.list("u1", Some(InvoiceStatus::Paid));
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].updated_at, now() + Duration::hours(1));
        assert_eq!(book.list("u1", None).len(), 2);

        assert!(book.update_status("u2", a.id, InvoiceStatus::Sent, now()).is_err());
        book.delete("u1", a.id).unwrap();
        assert!(book.get("u1", a.id).is_err());
    }

    #[test]
    fn test_draft_from_sales_transaction_only() {
        let sale = Transaction {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            category: Category::Sales,
            description: "Sold 10 laptops".to_string(),
            amount: 500000.0,
            original_prompt: "Sold 10 laptops".to_string(),
            party_name: Some("ABC Corp".to_string()),
            created_at: now(),
        };
        let draft = InvoiceDraft::from_sales_transaction(&sale).unwrap();
        assert_eq!(draft.customer_name, "ABC Corp");
        assert_eq!(draft.items[0].amount, 500000.0);
        assert_eq!(draft.transaction_id, Some(sale.id));

        let expense = Transaction {
            category: Category::Expense,
            ..sale
        };
        assert!(InvoiceDraft::from_sales_transaction(&expense).is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("sent".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Sent);
        assert!("void".parse::<InvoiceStatus>().is_err());
    }
}
