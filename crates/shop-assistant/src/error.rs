//! Error Types for the Shop Assistant

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShopError>;

#[derive(Error, Debug)]
pub enum ShopError {
    /// The shop API answered with a non-success status
    #[error("Shop API returned {status}: {body}")]
    Api {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ShopError {
    /// Value reported in the `error` field of a tool failure payload.
    ///
    /// API errors pass the response body through so the model sees the
    /// backend's own explanation.
    pub fn error_value(&self) -> serde_json::Value {
        match self {
            Self::Api { body, .. } if !body.is_null() => body.clone(),
            other => serde_json::Value::String(other.to_string()),
        }
    }

    /// Short human-readable reason
    pub fn reason(&self) -> String {
        match self {
            Self::Api { body, status } => body
                .get("message")
                .or_else(|| body.get("error"))
                .and_then(|m| m.as_str())
                .map_or_else(|| format!("the store returned status {status}"), str::to_string),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_passes_body_through() {
        let err = ShopError::Api {
            status: 404,
            body: serde_json::json!({"message": "Product not found"}),
        };
        assert_eq!(err.error_value()["message"], "Product not found");
        assert_eq!(err.reason(), "Product not found");
    }

    #[test]
    fn test_other_errors_render_as_text() {
        let err = ShopError::OutOfStock("USB-C Charger".into());
        assert_eq!(err.error_value(), "Out of stock: USB-C Charger");
    }
}
