use greenscan_common::config::EsgConfig;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Sustainability rating for one ticker. Lower total means lower ESG risk.
#[derive(Debug, Clone, PartialEq)]
pub struct EsgScore {
    pub ticker: String,
    pub total: f64,
    pub environment: Option<f64>,
    pub social: Option<f64>,
    pub governance: Option<f64>,
    pub peer_group: Option<String>,
    pub rating_year: Option<i32>,
}

impl fmt::Display for EsgScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total ESG score for {}: {:.2}", self.ticker, self.total)?;
        let parts: Vec<String> = [
            ("E", self.environment),
            ("S", self.social),
            ("G", self.governance),
        ]
        .iter()
        .filter_map(|(label, v)| v.map(|v| format!("{label} {v:.2}")))
        .collect();
        if !parts.is_empty() {
            write!(f, " ({})", parts.join(", "))?;
        }
        if let Some(peer_group) = &self.peer_group {
            write!(f, ", peer group {peer_group}")?;
        }
        if let Some(year) = self.rating_year {
            write!(f, ", rated {year}")?;
        }
        Ok(())
    }
}

/// Every way a sustainability fetch can fail. The messages are meant to be
/// shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum EsgError {
    #[error("no ESG data available for {ticker}")]
    NoData { ticker: String },
    #[error("ESG provider error for {ticker}: {message}")]
    Provider { ticker: String, message: String },
    #[error("ESG provider returned HTTP {status} for {ticker}")]
    Status { ticker: String, status: u16 },
    #[error("error fetching ESG data for {ticker}: {source}")]
    Http {
        ticker: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unreadable ESG response for {ticker}: {reason}")]
    Decode { ticker: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

// quoteSummary?modules=esgScores response, only the fields we read.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryEnvelope {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    esg_scores: Option<EsgScores>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EsgScores {
    #[serde(default)]
    total_esg: Option<Figure>,
    #[serde(default)]
    environment_score: Option<Figure>,
    #[serde(default)]
    social_score: Option<Figure>,
    #[serde(default)]
    governance_score: Option<Figure>,
    #[serde(default)]
    peer_group: Option<String>,
    #[serde(default)]
    rating_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Figure {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(value: Option<Figure>) -> Option<f64> {
    value.and_then(|v| v.raw).filter(|v| v.is_finite())
}

/// Client for the Yahoo Finance quote summary ESG module.
pub struct EsgClient {
    http: reqwest::Client,
    base_url: String,
}

impl EsgClient {
    pub fn new(config: &EsgConfig) -> Result<Self, EsgError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(EsgError::Client)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch(&self, ticker: &str) -> Result<EsgScore, EsgError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{ticker}?modules=esgScores",
            self.base_url
        );
        debug!(url, "ESG fetch");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| EsgError::Http {
                ticker: ticker.to_string(),
                source,
            })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|source| EsgError::Http {
            ticker: ticker.to_string(),
            source,
        })?;

        // The provider sends a JSON error object along with 4xx statuses.
        let envelope: QuoteSummaryEnvelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(EsgError::Status {
                    ticker: ticker.to_string(),
                    status: status.as_u16(),
                });
            }
            Err(e) => {
                return Err(EsgError::Decode {
                    ticker: ticker.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let summary = envelope.quote_summary;
        if let Some(error) = summary.error {
            let message = error
                .description
                .or(error.code)
                .unwrap_or_else(|| "unspecified error".into());
            return Err(EsgError::Provider {
                ticker: ticker.to_string(),
                message,
            });
        }
        if !status.is_success() {
            return Err(EsgError::Status {
                ticker: ticker.to_string(),
                status: status.as_u16(),
            });
        }

        let scores = summary
            .result
            .and_then(|results| results.into_iter().next())
            .and_then(|r| r.esg_scores);
        let Some(scores) = scores else {
            return Err(EsgError::NoData {
                ticker: ticker.to_string(),
            });
        };
        let Some(total) = raw(scores.total_esg) else {
            return Err(EsgError::NoData {
                ticker: ticker.to_string(),
            });
        };

        Ok(EsgScore {
            ticker: ticker.to_string(),
            total,
            environment: raw(scores.environment_score),
            social: raw(scores.social_score),
            governance: raw(scores.governance_score),
            peer_group: scores.peer_group,
            rating_year: scores.rating_year,
        })
    }
}
