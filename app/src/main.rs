mod pipeline;

use greenscan_common::config::Config;
use greenscan_lookup::directory::{DirectoryError, ParentCompanyDirectory};
use greenscan_lookup::esg::{EsgClient, EsgError};
use greenscan_lookup::product::{LookupError, ProductClient};
use greenscan_scanner::decode::RxingDecoder;
use greenscan_scanner::display::{self, DisplayError};
use greenscan_scanner::filter::{self, FilterError};
use greenscan_scanner::session::{ScanOutcome, ScanSession};
use greenscan_scanner::source::{CameraSource, CaptureError};
use pipeline::Pipeline;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("product client: {0}")]
    Product(#[from] LookupError),
    #[error("ESG client: {0}")]
    Esg(#[from] EsgError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = match Config::resolve(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = config.camera.source,
        filter = config.scanner.filter,
        stable_secs = config.scanner.stable_secs,
        display = config.display.mode,
        "starting greenscan"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "aborting");
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), AppError> {
    // Everything that can fail at startup is built before the camera opens.
    let directory = ParentCompanyDirectory::from_config(&config.directory)?;
    let products = ProductClient::new(&config.product)?;
    let esg = EsgClient::new(&config.esg)?;
    let scan_filter = filter::from_config(&config.scanner)?;
    let sink = display::from_config(&config.display)?;

    let source = CameraSource::open(&config.camera).await?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping scan");
            let _ = stop_tx.send(true);
        }
    });

    let mut session = ScanSession::new(source, RxingDecoder::new(), scan_filter, sink)
        .with_frame_limit(config.camera.frame_limit);
    let outcome = session.run(&mut stop_rx).await?;
    // Release the camera before the network round trips.
    drop(session);
    println!("Barcode scanning complete");

    let barcode = match outcome {
        ScanOutcome::Confirmed(barcode) => barcode,
        ScanOutcome::EndOfStream | ScanOutcome::Stopped | ScanOutcome::FrameLimit => {
            println!("No barcode detected");
            return Ok(());
        }
    };

    let report = Pipeline::new(&products, &directory, &esg).run(barcode).await;
    println!("{report}");
    Ok(())
}
