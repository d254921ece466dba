use std::time::Duration;
use thiserror::Error;

/// How many model names are quoted back when every candidate has failed.
const AVAILABLE_MODELS_IN_MESSAGE: usize = 5;

#[derive(Error, Debug)]
pub enum AccountingError {
    #[error("Gemini API key not configured. Please add {var} to your environment.")]
    MissingCredential { var: &'static str },

    #[error("{model}: {message}")]
    Api { model: String, message: String },

    #[error("{model}: no response within {timeout:?}")]
    Timeout { model: String, timeout: Duration },

    #[error("{model}: unusable model output: {details}")]
    MalformedResponse { model: String, details: String },

    #[error("All AI models failed. {}", describe_available(.available))]
    AllModelsFailed { available: Vec<String> },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment gateway not configured: missing {0}")]
    PaymentNotConfigured(&'static str),

    #[error("Payment gateway error (status {status}): {details}")]
    PaymentGateway { status: u16, details: String },

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[cfg(any(feature = "gemini", feature = "razorpay"))]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn describe_available(available: &[String]) -> String {
    if available.is_empty() {
        "Could not list available models. Your API key may be invalid or restricted.".to_string()
    } else {
        let shown: Vec<&str> = available
            .iter()
            .take(AVAILABLE_MODELS_IN_MESSAGE)
            .map(String::as_str)
            .collect();
        format!("Available models: {}", shown.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, AccountingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_message_without_listing() {
        let err = AccountingError::AllModelsFailed { available: vec![] };
        assert_eq!(
            err.to_string(),
            "All AI models failed. Could not list available models. Your API key may be invalid or restricted."
        );
    }

    #[test]
    fn test_exhaustion_message_quotes_first_five_models() {
        let available = (1..=7).map(|i| format!("models/m{}", i)).collect();
        let err = AccountingError::AllModelsFailed { available };
        assert_eq!(
            err.to_string(),
            "All AI models failed. Available models: models/m1, models/m2, models/m3, models/m4, models/m5"
        );
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = AccountingError::MissingCredential {
            var: "GOOGLE_GEMINI_API_KEY",
        };
        assert!(err.to_string().contains("GOOGLE_GEMINI_API_KEY"));
    }
}
