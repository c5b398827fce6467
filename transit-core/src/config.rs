//! Engine configuration
//!
//! All settings can be overridden through environment variables:
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | DATA_DIR | /var/lib/transit/office | redb database location |
//! | TAUX_TVA | 18.0 | Current TVA rate (percent) |
//! | TAUX_CSS | 1.0 | Current CSS rate (percent) |
//! | TAUX_VERSION | 1 | Version stamp of the rate configuration |
//! | OPS_BASE_URL | http://localhost:4100 | OPS primes read endpoint |
//! | CNV_BASE_URL | http://localhost:4200 | CNV primes read endpoint |
//! | PRIME_TIMEOUT_MS | 5000 | Upstream request timeout |
//! | ENVIRONMENT | development | development \| staging \| production |
//!
//! Tax rates are only ever read through [`Config::taux_snapshot`]: the
//! snapshot is stamped onto documents at creation and later global rate
//! changes never touch existing documents.

use serde::{Deserialize, Serialize};

/// Versioned tax-rate snapshot captured at document creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TauxSnapshot {
    /// TVA rate in percent
    pub taux_tva: f64,
    /// CSS rate in percent
    pub taux_css: f64,
    /// Version of the rate configuration
    pub version: u32,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the redb database file
    pub data_dir: String,
    /// Current TVA rate (percent), applied to newly created documents
    pub taux_tva: f64,
    /// Current CSS rate (percent), applied to newly created documents
    pub taux_css: f64,
    /// Version stamp of the rate configuration
    pub taux_version: u32,
    /// OPS primes read-only endpoint
    pub ops_base_url: String,
    /// CNV primes read-only endpoint
    pub cnv_base_url: String,
    /// Upstream request timeout (milliseconds)
    pub prime_timeout_ms: u64,
    /// development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/var/lib/transit/office".into()),
            taux_tva: std::env::var("TAUX_TVA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(18.0),
            taux_css: std::env::var("TAUX_CSS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0),
            taux_version: std::env::var("TAUX_VERSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            ops_base_url: std::env::var("OPS_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4100".into()),
            cnv_base_url: std::env::var("CNV_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4200".into()),
            prime_timeout_ms: std::env::var("PRIME_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Current rates as an immutable versioned snapshot
    pub fn taux_snapshot(&self) -> TauxSnapshot {
        TauxSnapshot {
            taux_tva: self.taux_tva,
            taux_css: self.taux_css,
            version: self.taux_version,
        }
    }

    /// Database file under `data_dir`
    pub fn db_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("office.redb")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
