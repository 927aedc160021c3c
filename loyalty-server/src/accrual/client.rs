//! Accrual system client
//!
//! `GET {base}/api/orders/{number}` answers `{order, status, accrual}` with
//! `accrual` as a decimal currency value. Anything but `200 OK` is a
//! structured rejection carrying the status and raw body.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shared::models::Amount;
use thiserror::Error;

/// Scoring status as reported by the accrual system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// Known to the accrual system, scoring not started
    Registered,
    Processing,
    Processed,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    /// Scaled to minor units on decode
    #[serde(default)]
    pub accrual: Option<Amount>,
}

#[derive(Debug, Error)]
pub enum OracleError {
    /// Non-200 answer (unknown order, rate limit, server error)
    #[error("accrual system answered {status}: {body}")]
    Rejected { status: u16, body: String },
    /// Transport failure or malformed response
    #[error("accrual system unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn fetch(&self, number: &str) -> Result<AccrualResponse, OracleError>;
}

/// reqwest-based accrual client
#[derive(Clone)]
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// `timeout = None` keeps the transport default
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

#[async_trait]
impl AccrualOracle for HttpAccrualClient {
    async fn fetch(&self, number: &str) -> Result<AccrualResponse, OracleError> {
        let response = self
            .client
            .get(self.order_url(number))
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        let parsed: AccrualResponse = serde_json::from_slice(&body)
            .map_err(|e| OracleError::Unavailable(format!("invalid response: {e}")))?;

        tracing::debug!(order = %parsed.order, status = ?parsed.status, "Accrual response");
        Ok(parsed)
    }
}
