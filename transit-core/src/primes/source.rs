//! Read-only access to the upstream OPS/CNV prime databases
//!
//! Every call is bounded by the configured timeout and every failure
//! surfaces as a typed [`SourceError`]; the reconciler decides whether
//! to degrade (reads) or hard-fail (payouts).

use async_trait::async_trait;
use shared::prime::ExternalPrime;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),
}

/// Read-only prime source (one per upstream system)
#[async_trait]
pub trait PrimeSource: Send + Sync {
    /// Primes whose upstream status indicates "paid"
    async fn fetch_paid_primes(&self) -> Result<Vec<ExternalPrime>, SourceError>;

    /// One prime by id, None when absent upstream
    async fn fetch_prime(&self, prime_id: i64) -> Result<Option<ExternalPrime>, SourceError>;

    /// Cheap availability probe
    async fn probe(&self) -> Result<(), SourceError>;
}

/// HTTP implementation against the read endpoint exposed in front of an
/// upstream operations database
pub struct HttpPrimeSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPrimeSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, SourceError>
    where
        F: std::future::Future<Output = Result<T, SourceError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl PrimeSource for HttpPrimeSource {
    async fn fetch_paid_primes(&self) -> Result<Vec<ExternalPrime>, SourceError> {
        let url = format!("{}/primes?statut=payee", self.base_url);
        self.bounded(async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(SourceError::Status(response.status().as_u16()));
            }
            Ok(response.json::<Vec<ExternalPrime>>().await?)
        })
        .await
    }

    async fn fetch_prime(&self, prime_id: i64) -> Result<Option<ExternalPrime>, SourceError> {
        let url = format!("{}/primes/{prime_id}", self.base_url);
        self.bounded(async {
            let response = self.client.get(&url).send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(SourceError::Status(response.status().as_u16()));
            }
            Ok(Some(response.json::<ExternalPrime>().await?))
        })
        .await
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let url = format!("{}/health", self.base_url);
        self.bounded(async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(SourceError::Status(response.status().as_u16()));
            }
            Ok(())
        })
        .await
    }
}
