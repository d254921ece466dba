//! Premium subscription checkout through Razorpay.

use crate::error::{AccountingError, Result};
use crate::utils::{add_months, to_base36};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

pub const KEY_ID_ENV: &str = "RAZORPAY_KEY_ID";
pub const KEY_SECRET_ENV: &str = "RAZORPAY_KEY_SECRET";
pub const ORDER_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Yearly,
}

impl Plan {
    /// Price in paise (1 INR = 100 paise).
    pub fn amount(&self) -> u64 {
        match self {
            Plan::Monthly => 39_900,
            Plan::Yearly => 199_900,
        }
    }

    pub fn duration_months(&self) -> u32 {
        match self {
            Plan::Monthly => 1,
            Plan::Yearly => 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Plan::Monthly => "Premium Monthly",
            Plan::Yearly => "Premium Yearly",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Plan::Monthly => "Premium subscription - Monthly",
            Plan::Yearly => "Premium subscription - Yearly (Save ₹2,789)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = AccountingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "monthly" => Ok(Plan::Monthly),
            "yearly" => Ok(Plan::Yearly),
            other => Err(AccountingError::ValidationError(format!(
                "Invalid plan type '{}'",
                other
            ))),
        }
    }
}

/// When a subscription bought at `now` runs out.
pub fn subscription_end(plan: Plan, now: DateTime<Utc>) -> DateTime<Utc> {
    add_months(now, plan.duration_months())
}

/// Body of a Razorpay "create order" call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

impl OrderRequest {
    pub fn for_plan(plan: Plan, user_id: &str, user_email: Option<&str>, now: DateTime<Utc>) -> Self {
        let user_tail: String = {
            let chars: Vec<char> = user_id.chars().collect();
            chars[chars.len().saturating_sub(8)..].iter().collect()
        };
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);

        let mut notes = BTreeMap::new();
        notes.insert("user_id".to_string(), user_id.to_string());
        notes.insert("user_email".to_string(), user_email.unwrap_or_default().to_string());
        notes.insert("plan_type".to_string(), plan.to_string());
        notes.insert("duration_months".to_string(), plan.duration_months().to_string());

        Self {
            amount: plan.amount(),
            currency: ORDER_CURRENCY.to_string(),
            receipt: format!("prem_{}_{}", user_tail, to_base36(millis)),
            notes,
        }
    }
}

/// What the checkout page needs to open the payment dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutOrder {
    pub order_id: String,
    pub amount: u64,
    pub currency: String,
    pub key_id: String,
    pub plan_name: String,
    pub plan_description: String,
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
}

impl RazorpayConfig {
    pub fn from_env() -> Result<Self> {
        let read = |var: &'static str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(AccountingError::PaymentNotConfigured(var))
        };
        Ok(Self {
            key_id: read(KEY_ID_ENV)?,
            key_secret: read(KEY_SECRET_ENV)?,
        })
    }
}

/// HMAC-SHA256 over `"{order_id}|{payment_id}"`, hex encoded.
pub fn sign_payment(key_secret: &str, order_id: &str, payment_id: &str) -> Result<String> {
    let mac = payment_mac(key_secret, order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the signature Razorpay attaches to a successful checkout callback.
/// The comparison runs in constant time.
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<()> {
    // Razorpay signs with lowercase hex; anything else is not its signature.
    if !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(AccountingError::InvalidSignature);
    }
    let provided = hex::decode(signature).map_err(|_| AccountingError::InvalidSignature)?;
    payment_mac(key_secret, order_id, payment_id)?
        .verify_slice(&provided)
        .map_err(|_| AccountingError::InvalidSignature)
}

fn payment_mac(key_secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| AccountingError::ValidationError(e.to_string()))?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    Ok(mac)
}

#[cfg(feature = "razorpay")]
pub use client::RazorpayClient;

#[cfg(feature = "razorpay")]
mod client {
    use super::*;
    use log::{error, info};
    use reqwest::Client;

    const RAZORPAY_BASE_URL: &str = "https://api.razorpay.com/v1";

    #[derive(Deserialize)]
    struct OrderResponse {
        id: String,
        amount: u64,
        currency: String,
    }

    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        description: Option<String>,
    }

    #[derive(Clone)]
    pub struct RazorpayClient {
        client: Client,
        config: RazorpayConfig,
        base_url: String,
    }

    impl RazorpayClient {
        pub fn new(config: RazorpayConfig) -> Self {
            Self {
                client: Client::new(),
                config,
                base_url: RAZORPAY_BASE_URL.to_string(),
            }
        }

        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into().trim_end_matches('/').to_string();
            self
        }

        pub async fn create_order(
            &self,
            plan: Plan,
            user_id: &str,
            user_email: Option<&str>,
        ) -> Result<CheckoutOrder> {
            let request = OrderRequest::for_plan(plan, user_id, user_email, Utc::now());
            let url = format!("{}/orders", self.base_url);

            let res = self
                .client
                .post(&url)
                .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
                .json(&request)
                .send()
                .await?;
            let status = res.status();

            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                let details = serde_json::from_str::<ErrorResponse>(&body)
                    .ok()
                    .and_then(|r| r.error)
                    .and_then(|e| e.description)
                    .unwrap_or(body);
                error!("Razorpay order creation failed ({}): {}", status, details);
                return Err(AccountingError::PaymentGateway {
                    status: status.as_u16(),
                    details,
                });
            }

            let order: OrderResponse = res.json().await?;
            info!("Created Razorpay order {} for receipt {}", order.id, request.receipt);

            Ok(CheckoutOrder {
                order_id: order.id,
                amount: order.amount,
                currency: order.currency,
                key_id: self.config.key_id.clone(),
                plan_name: plan.name().to_string(),
                plan_description: plan.description().to_string(),
            })
        }

        /// Verifies a checkout callback with this client's secret.
        pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<()> {
            verify_payment_signature(&self.config.key_secret, order_id, payment_id, signature)
        }
    }
}
