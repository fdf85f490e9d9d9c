use greenscan_lookup::directory::{CompanyMatch, ParentCompanyDirectory};
use greenscan_lookup::esg::{EsgClient, EsgScore};
use greenscan_lookup::product::{Product, ProductClient};
use greenscan_scanner::filter::ConfirmedBarcode;
use std::fmt;
use tracing::{info, warn};

/// How far a confirmed barcode got through lookup and scoring.
#[derive(Debug)]
pub enum Outcome {
    ProductNotFound,
    ProductLookupFailed(String),
    /// The brand is unknown, or its owner is not publicly traded.
    NoTicker { product: Product, company: CompanyMatch },
    EsgUnavailable {
        product: Product,
        company: CompanyMatch,
        message: String,
    },
    Scored {
        product: Product,
        company: CompanyMatch,
        score: EsgScore,
    },
}

#[derive(Debug)]
pub struct Report {
    pub barcode: ConfirmedBarcode,
    pub outcome: Outcome,
}

/// Product lookup, brand mapping and ESG scoring for one barcode.
///
/// Each stage that comes up empty ends processing for this barcode; nothing
/// here is fatal.
pub struct Pipeline<'a> {
    products: &'a ProductClient,
    directory: &'a ParentCompanyDirectory,
    esg: &'a EsgClient,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        products: &'a ProductClient,
        directory: &'a ParentCompanyDirectory,
        esg: &'a EsgClient,
    ) -> Self {
        Self {
            products,
            directory,
            esg,
        }
    }

    pub async fn run(&self, barcode: ConfirmedBarcode) -> Report {
        let outcome = self.evaluate(barcode.as_str()).await;
        Report { barcode, outcome }
    }

    async fn evaluate(&self, barcode: &str) -> Outcome {
        let product = match self.products.lookup(barcode).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                info!(barcode, "product not found");
                return Outcome::ProductNotFound;
            }
            Err(e) => {
                warn!(barcode, error = %e, "product lookup failed");
                return Outcome::ProductLookupFailed(e.to_string());
            }
        };
        info!(barcode, name = product.name, brand = product.brand, "product found");

        let company = self.directory.resolve(&product.brand);
        let Some(ticker) = company.ticker.clone() else {
            info!(brand = product.brand, company = company.company, "no ticker for brand");
            return Outcome::NoTicker { product, company };
        };

        match self.esg.fetch(&ticker).await {
            Ok(score) => {
                info!(ticker, total = score.total, "ESG score fetched");
                Outcome::Scored {
                    product,
                    company,
                    score,
                }
            }
            Err(e) => {
                warn!(ticker, error = %e, "ESG data unavailable");
                Outcome::EsgUnavailable {
                    product,
                    company,
                    message: e.to_string(),
                }
            }
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "BARCODE NUMBER: {}", self.barcode)?;
        if let Some(format) = self.barcode.format() {
            writeln!(f, "BARCODE TYPE: {format}")?;
        }
        writeln!(f, "{}", "=".repeat(40))?;
        match &self.outcome {
            Outcome::ProductNotFound => write!(f, "Product not found in Open Food Facts database"),
            Outcome::ProductLookupFailed(message) => write!(f, "Product lookup failed: {message}"),
            Outcome::NoTicker { product, company } => {
                writeln!(f, "Found product: {} by {}", product.name, product.brand)?;
                if company.matched {
                    write!(f, "Parent company {} is not publicly traded", company.company)
                } else {
                    write!(f, "No parent company found for brand {}", product.brand)
                }
            }
            Outcome::EsgUnavailable {
                product,
                company,
                message,
            } => {
                writeln!(f, "Found product: {} by {}", product.name, product.brand)?;
                writeln!(f, "Parent company: {}{}", company.company, ticker_suffix(company))?;
                write!(f, "{message}")
            }
            Outcome::Scored {
                product,
                company,
                score,
            } => {
                writeln!(f, "Found product: {} by {}", product.name, product.brand)?;
                writeln!(f, "Parent company: {}{}", company.company, ticker_suffix(company))?;
                write!(f, "{score}")
            }
        }
    }
}

fn ticker_suffix(company: &CompanyMatch) -> String {
    company
        .ticker
        .as_ref()
        .map(|t| format!(" ({t})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use greenscan_common::config::{EsgConfig, ProductConfig};

    async fn off(Path(code): Path<String>) -> Response {
        let product = |name: &str, brand: &str| {
            Json(serde_json::json!({
                "status": 1,
                "product": { "product_name": name, "brands": brand }
            }))
            .into_response()
        };
        match code.as_str() {
            "5449000000996" => product("Coca-Cola Original Taste", "Coca-Cola"),
            "8000500037560" => product("Kinder Bueno", "Kinder, Ferrero"),
            "3760091720016" => product("Confiture", "Bonne Maman"),
            "4060800001405" => product("Sparkling", "Pepsi"),
            "8000500310427" => product("Nutella", "Ferrero"),
            _ => Json(serde_json::json!({ "status": 0 })).into_response(),
        }
    }

    async fn yahoo(Path(ticker): Path<String>) -> Response {
        match ticker.as_str() {
            "KO" => Json(serde_json::json!({"quoteSummary": {"result": [{"esgScores": {
                "totalEsg": {"raw": 23.89}
            }}], "error": null}}))
            .into_response(),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        }
    }

    struct Fixture {
        products: ProductClient,
        directory: ParentCompanyDirectory,
        esg: EsgClient,
    }

    async fn fixture() -> Fixture {
        let router = Router::new()
            .route("/api/v0/product/:code", get(off))
            .route("/v10/finance/quoteSummary/:ticker", get(yahoo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Fixture {
            products: ProductClient::new(&ProductConfig {
                base_url: base.clone(),
                ..ProductConfig::default()
            })
            .unwrap(),
            directory: ParentCompanyDirectory::builtin().unwrap(),
            esg: EsgClient::new(&EsgConfig {
                base_url: base,
                ..EsgConfig::default()
            })
            .unwrap(),
        }
    }

    async fn report(code: &str) -> Report {
        run(ConfirmedBarcode::new(code)).await
    }

    async fn run(barcode: ConfirmedBarcode) -> Report {
        let fx = fixture().await;
        Pipeline::new(&fx.products, &fx.directory, &fx.esg)
            .run(barcode)
            .await
    }

    #[tokio::test]
    async fn scored_product() {
        let report = run(ConfirmedBarcode::new("5449000000996").with_format("EAN_13")).await;
        let Outcome::Scored { company, score, .. } = &report.outcome else {
            panic!("unexpected outcome {:?}", report.outcome);
        };
        assert_eq!(company.ticker.as_deref(), Some("KO"));
        assert_eq!(score.total, 23.89);

        let text = report.to_string();
        assert!(text.contains("BARCODE NUMBER: 5449000000996\nBARCODE TYPE: EAN_13\n"));
        assert!(text.contains("Found product: Coca-Cola Original Taste by Coca-Cola"));
        assert!(text.contains("Parent company: The Coca-Cola Company (KO)"));
        assert!(text.ends_with("Total ESG score for KO: 23.89"));
    }

    #[tokio::test]
    async fn unknown_product_stops_early() {
        let report = report("0000000000000").await;
        assert!(matches!(report.outcome, Outcome::ProductNotFound));
        assert!(report.to_string().ends_with("Product not found in Open Food Facts database"));
    }

    #[tokio::test]
    async fn non_numeric_code_is_not_found() {
        let report = run(ConfirmedBarcode::new("https://example.com").with_format("QR_CODE")).await;
        assert!(matches!(report.outcome, Outcome::ProductNotFound));
        let text = report.to_string();
        assert!(text.contains("BARCODE TYPE: QR_CODE"));
        assert!(text.ends_with("Product not found in Open Food Facts database"));
    }

    #[tokio::test]
    async fn unformatted_barcode_has_no_type_line() {
        let report = report("0000000000000").await;
        assert!(!report.to_string().contains("BARCODE TYPE"));
    }

    #[tokio::test]
    async fn unmatched_brand_has_no_ticker() {
        let report = report("3760091720016").await;
        assert!(matches!(report.outcome, Outcome::NoTicker { .. }));
        assert!(report.to_string().ends_with("No parent company found for brand Bonne Maman"));
    }

    #[tokio::test]
    async fn private_parent_has_no_ticker() {
        let report = report("8000500037560").await;
        let Outcome::NoTicker { company, .. } = &report.outcome else {
            panic!("unexpected outcome {:?}", report.outcome);
        };
        assert_eq!(company.company, "Ferrero");
        assert!(report.to_string().ends_with("Parent company Ferrero is not publicly traded"));
    }

    #[tokio::test]
    async fn brand_named_like_private_owner() {
        let report = report("8000500310427").await;
        let Outcome::NoTicker { company, .. } = &report.outcome else {
            panic!("unexpected outcome {:?}", report.outcome);
        };
        assert!(company.matched);
        assert!(report.to_string().ends_with("Parent company Ferrero is not publicly traded"));
    }

    #[tokio::test]
    async fn provider_failure_is_a_message() {
        let report = report("4060800001405").await;
        let Outcome::EsgUnavailable { message, .. } = &report.outcome else {
            panic!("unexpected outcome {:?}", report.outcome);
        };
        assert_eq!(message, "ESG provider returned HTTP 500 for PEP");
    }
}
