//! Brokerage API client
//!
//! The brokerage is an external collaborator: it answers "what is this
//! amount worth in that currency right now" and executes conversions.
//! [`BrokerApi`] is the seam the trading loop depends on; [`HttpBroker`]
//! is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{Amount, Currency};
use crate::ledger::Transaction;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("no rate available for {from}/{to}")]
    RateUnavailable { from: Currency, to: Currency },
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("rate changed before execution: {0}")]
    RateChanged(String),
    #[error("authentication expired, re-run the onboarding flow to obtain a fresh token")]
    AuthExpired,
    #[error("rate limited by the brokerage API")]
    RateLimited,
    #[error("network failure talking to the brokerage")]
    Network(#[from] reqwest::Error),
    #[error("malformed brokerage payload: {0}")]
    Payload(String),
    #[error("unexpected brokerage response: {status} - {body}")]
    Api { status: StatusCode, body: String },
}

/// Quoting and exchange operations offered by the brokerage
#[async_trait]
pub trait BrokerApi {
    /// Current market-equivalent value of `from` in `to`
    async fn quote(&self, from: &Amount, to: Currency) -> Result<Amount, BrokerError>;

    /// Execute a real conversion of `from` into `to`
    async fn exchange(&self, from: &Amount, to: Currency) -> Result<Transaction, BrokerError>;
}

/// HTTP client for the brokerage quoting/exchange service
pub struct HttpBroker {
    client: Client,
    base_url: String,
    device_id: String,
    token: String,
}

impl HttpBroker {
    pub fn new(
        base_url: &str,
        device_id: &str,
        token: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            device_id: device_id.to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl BrokerApi for HttpBroker {
    async fn quote(&self, from: &Amount, to: Currency) -> Result<Amount, BrokerError> {
        let url = format!("{}/v1/quote", self.base_url);
        let amount = from.value.to_string();

        debug!("Requesting quote {} -> {} from {}", from, to, url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("X-Device-Id", &self.device_id)
            .query(&[
                ("from", from.currency.code()),
                ("to", to.code()),
                ("amount", amount.as_str()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let quote: QuoteResponse = response.json().await?;
                Amount::new(quote.to_value, to).map_err(|e| BrokerError::Payload(e.to_string()))
            }
            StatusCode::NOT_FOUND => Err(BrokerError::RateUnavailable {
                from: from.currency.clone(),
                to,
            }),
            status => Err(error_from_status(status, response).await),
        }
    }

    async fn exchange(&self, from: &Amount, to: Currency) -> Result<Transaction, BrokerError> {
        let url = format!("{}/v1/exchange", self.base_url);

        let req = ExchangeRequest {
            from_currency: from.currency.code(),
            from_value: from.value,
            to_currency: to.code(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-Device-Id", &self.device_id)
            .json(&req)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let executed: ExchangeResponse = response.json().await?;
                executed.into_transaction()
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(BrokerError::InsufficientFunds(body))
            }
            StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                Err(BrokerError::RateChanged(body))
            }
            status => Err(error_from_status(status, response).await),
        }
    }
}

async fn error_from_status(status: StatusCode, response: reqwest::Response) -> BrokerError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited,
        _ => {
            let body = response.text().await.unwrap_or_default();
            BrokerError::Api { status, body }
        }
    }
}

// Request/Response types

#[derive(Debug, Clone, Serialize)]
struct ExchangeRequest<'a> {
    from_currency: &'a str,
    from_value: Decimal,
    to_currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    to_value: Decimal,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    from_currency: Currency,
    from_value: Decimal,
    to_currency: Currency,
    to_value: Decimal,
    executed_at: DateTime<Utc>,
}

impl ExchangeResponse {
    fn into_transaction(self) -> Result<Transaction, BrokerError> {
        let from_amount = Amount::new(self.from_value, self.from_currency)
            .map_err(|e| BrokerError::Payload(e.to_string()))?;
        let to_amount = Amount::new(self.to_value, self.to_currency)
            .map_err(|e| BrokerError::Payload(e.to_string()))?;

        Ok(Transaction {
            from_amount,
            to_amount,
            date: self.executed_at.naive_utc(),
        })
    }
}
