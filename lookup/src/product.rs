use greenscan_common::config::ProductConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub barcode: String,
    pub name: String,
    pub brand: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("product request failed: {0}")]
    Http(reqwest::Error),
    #[error("failed to decode product response: {0}")]
    Decode(reqwest::Error),
}

/// Open Food Facts v0 product response. Only the fields we read.
#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<ProductFields>,
}

#[derive(Debug, Deserialize)]
struct ProductFields {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    brands: Option<String>,
}

/// Client for the public Open Food Facts product database.
pub struct ProductClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProductClient {
    pub fn new(config: &ProductConfig) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LookupError::Client)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look a barcode up. `Ok(None)` means the database does not know it.
    ///
    /// Non-numeric codes (QR payloads, URLs) cannot be product barcodes and
    /// are reported as not found without a request.
    pub async fn lookup(&self, barcode: &str) -> Result<Option<Product>, LookupError> {
        if barcode.is_empty() || !barcode.bytes().all(|b| b.is_ascii_digit()) {
            info!(barcode, "not a product barcode");
            return Ok(None);
        }

        let url = format!("{}/api/v0/product/{barcode}", self.base_url);
        debug!(url, "product lookup");
        let response = self.http.get(&url).send().await.map_err(LookupError::Http)?;

        if response.status() != reqwest::StatusCode::OK {
            info!(barcode, status = %response.status(), "product lookup returned non-200");
            return Ok(None);
        }

        let body: ProductResponse = response.json().await.map_err(LookupError::Decode)?;
        if body.status != 1 {
            info!(barcode, status = body.status, "product not in database");
            return Ok(None);
        }
        let fields = body.product.unwrap_or(ProductFields {
            product_name: None,
            brands: None,
        });

        Ok(Some(Product {
            barcode: barcode.to_string(),
            name: or_unknown(fields.product_name),
            brand: or_unknown(fields.brands),
        }))
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
